//! Core data types for the pipeline.

pub mod bot;
pub mod listing;
pub mod page;

pub use bot::{Bot, BotStatus, RunOutcome};
pub use listing::Listing;
pub use page::PageContent;
