//! Trait seams between the pipeline and its storage backends.

pub mod source;
pub mod store;

pub use source::PageSource;
pub use store::{BotStore, ListingStore};
