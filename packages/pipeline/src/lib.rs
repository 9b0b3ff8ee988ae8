//! Listing Extraction Pipeline
//!
//! Turns a real-estate listings URL into structured, deduplicated
//! records using a local language model, with live telemetry for every
//! run.
//!
//! # Stages
//!
//! 1. **Acquire** - plain HTTP fetch, escalating to a headless render
//!    on anti-bot challenges or suspiciously sparse content
//! 2. **Reduce** - score candidate containers and linearize the one
//!    that holds the listings into compact text
//! 3. **Embedded** - recover framework hydration payloads, JSON-LD and
//!    intercepted API responses the visible DOM misses
//! 4. **Chunk** - split compact text on paragraph boundaries within a
//!    byte budget
//! 5. **Extract** - prompt the model per chunk, parse (and repair)
//!    its JSON output
//! 6. **Dedup + store** - first occurrence wins, within the run and
//!    against already-stored records
//!
//! # Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use pipeline::{Bot, MemoryStore, PipelineConfig, Runner};
//!
//! let store = Arc::new(MemoryStore::new());
//! let bot = Bot::new("portal", "https://example.com/propiedades");
//! let bot_id = bot.id;
//! store.add_bot(bot);
//!
//! let runner = Runner::new(store.clone(), store.clone(), PipelineConfig::from_env())?;
//! let outcome = runner.run_bot(bot_id).await?;
//! ```
//!
//! # Modules
//!
//! - [`acquire`] - escalating page acquisition
//! - [`reduce`] - HTML reduction and container scoring
//! - [`embedded`] - embedded structured-data recovery
//! - [`chunk`] - text chunking
//! - [`extract`] - model invocation, parsing, repair
//! - [`dedup`] - within-run deduplication
//! - [`bus`] - observability bus (history replay + live fan-out)
//! - [`runner`] - job orchestration
//! - [`stores`] - storage implementations
//! - [`testing`] - fixtures for tests

pub mod acquire;
pub mod bus;
pub mod chunk;
pub mod config;
pub mod dedup;
pub mod embedded;
pub mod error;
pub mod extract;
pub mod reduce;
pub mod runner;
pub mod stores;
pub mod testing;
pub mod traits;
pub mod types;

// Re-export core types at crate root
pub use bus::{BusMessage, EventBus, LogEvent, LogLevel, ProgressEvent};
pub use config::PipelineConfig;
pub use error::{AcquireError, ExtractError, PipelineError, Result};
pub use runner::Runner;
pub use stores::MemoryStore;
pub use traits::{BotStore, ListingStore, PageSource};
pub use types::{Bot, BotStatus, Listing, PageContent, RunOutcome};
