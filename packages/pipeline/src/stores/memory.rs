//! In-memory storage implementation for testing and development.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

use uuid::Uuid;

use crate::error::Result;
use crate::traits::{BotStore, ListingStore};
use crate::types::{Bot, Listing};

/// In-memory storage for bots and listings.
///
/// Useful for testing and development. Not suitable for production
/// as data is lost on restart.
pub struct MemoryStore {
    bots: RwLock<HashMap<Uuid, Bot>>,
    listings: RwLock<HashMap<Uuid, Vec<Listing>>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Create a new empty memory store.
    pub fn new() -> Self {
        Self {
            bots: RwLock::new(HashMap::new()),
            listings: RwLock::new(HashMap::new()),
        }
    }

    /// Register a bot (test and seed helper).
    pub fn add_bot(&self, bot: Bot) {
        self.bots.write().unwrap().insert(bot.id, bot);
    }

    /// Number of listings stored for a bot.
    pub fn listing_count(&self, bot_id: Uuid) -> usize {
        self.listings
            .read()
            .unwrap()
            .get(&bot_id)
            .map(Vec::len)
            .unwrap_or(0)
    }

    /// Snapshot of a bot's stored listings.
    pub fn listings_for(&self, bot_id: Uuid) -> Vec<Listing> {
        self.listings
            .read()
            .unwrap()
            .get(&bot_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Clear all stored data.
    pub fn clear(&self) {
        self.bots.write().unwrap().clear();
        self.listings.write().unwrap().clear();
    }
}

#[async_trait]
impl BotStore for MemoryStore {
    async fn get(&self, id: Uuid) -> Result<Option<Bot>> {
        Ok(self.bots.read().unwrap().get(&id).cloned())
    }

    async fn list_active(&self) -> Result<Vec<Bot>> {
        Ok(self
            .bots
            .read()
            .unwrap()
            .values()
            .filter(|b| b.active)
            .cloned()
            .collect())
    }

    async fn update(&self, bot: &Bot) -> Result<()> {
        self.bots.write().unwrap().insert(bot.id, bot.clone());
        Ok(())
    }
}

#[async_trait]
impl ListingStore for MemoryStore {
    async fn exists_by_key(&self, bot_id: Uuid, key: &str) -> Result<bool> {
        Ok(self
            .listings
            .read()
            .unwrap()
            .get(&bot_id)
            .map(|ls| ls.iter().any(|l| l.dedup_key() == key))
            .unwrap_or(false))
    }

    async fn insert(&self, bot_id: Uuid, listing: &Listing) -> Result<()> {
        self.listings
            .write()
            .unwrap()
            .entry(bot_id)
            .or_default()
            .push(listing.clone());
        Ok(())
    }
}
