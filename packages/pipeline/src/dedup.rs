//! Cross-chunk deduplication by stable key.

use std::collections::HashSet;

use crate::types::Listing;

/// Within-run deduplicator.
///
/// Tracks keys seen across all chunks of one job; first occurrence wins,
/// later duplicates are dropped. Extraction order is preserved. A second
/// round of dedup against already-stored records happens at the
/// persistence boundary using the same key.
#[derive(Default)]
pub struct Deduper {
    seen: HashSet<String>,
}

impl Deduper {
    /// Create an empty deduper for one run.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` the first time a listing's key is seen.
    pub fn is_novel(&mut self, listing: &Listing) -> bool {
        self.seen.insert(listing.dedup_key().to_string())
    }

    /// Keep only first-seen listings, preserving order.
    pub fn dedup(&mut self, listings: Vec<Listing>) -> Vec<Listing> {
        listings.into_iter().filter(|l| self.is_novel(l)).collect()
    }

    /// Number of distinct keys seen so far.
    pub fn seen_count(&self) -> usize {
        self.seen.len()
    }
}
