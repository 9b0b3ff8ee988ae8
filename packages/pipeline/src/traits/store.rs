//! Storage traits for bots and extracted listings.
//!
//! The pipeline only talks to storage through these; swapping the
//! backing store (memory, a database) never touches the run logic.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::types::{Bot, Listing};

/// Read and update scraping bots.
#[async_trait]
pub trait BotStore: Send + Sync {
    /// Fetch a bot by id.
    async fn get(&self, id: Uuid) -> Result<Option<Bot>>;

    /// All bots marked active, for batch runs.
    async fn list_active(&self) -> Result<Vec<Bot>>;

    /// Persist a bot's current state (status, counters, timestamps).
    async fn update(&self, bot: &Bot) -> Result<()>;
}

/// Persist extracted listings with key-based dedup.
#[async_trait]
pub trait ListingStore: Send + Sync {
    /// Whether a listing with this dedup key is already stored for the bot.
    async fn exists_by_key(&self, bot_id: Uuid, key: &str) -> Result<bool>;

    /// Store one listing for the bot.
    async fn insert(&self, bot_id: Uuid, listing: &Listing) -> Result<()>;
}
