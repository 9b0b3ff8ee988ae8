//! Extracted listing records.

use serde::{Deserialize, Serialize};

/// A normalized real-estate listing produced by the structured extractor.
///
/// Every field except the title may be absent - the model is instructed
/// to use `null` rather than invent data. A listing is persisted only if
/// its [`dedup_key`](Listing::dedup_key) is novel relative to the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    /// Listing title or headline
    pub title: String,

    /// Price, digits only (no thousands separators or symbols)
    pub price: Option<i64>,

    /// Currency code or symbol as shown on the page (CLP, UF, USD, ...)
    pub currency: Option<String>,

    /// Street address
    pub address: Option<String>,

    /// City
    pub city: Option<String>,

    /// Region / state / province
    pub region: Option<String>,

    /// Neighborhood or commune
    pub neighborhood: Option<String>,

    /// Bedroom count
    pub bedrooms: Option<u32>,

    /// Bathroom count
    pub bathrooms: Option<u32>,

    /// Usable or built area in square meters
    pub area_m2: Option<f64>,

    /// Property type (house, apartment, land, ...)
    pub property_type: Option<String>,

    /// Free-text description
    pub description: Option<String>,

    /// Link to the listing's own detail page
    pub source_url: Option<String>,
}

impl Listing {
    /// Create a listing with only a title.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            price: None,
            currency: None,
            address: None,
            city: None,
            region: None,
            neighborhood: None,
            bedrooms: None,
            bathrooms: None,
            area_m2: None,
            property_type: None,
            description: None,
            source_url: None,
        }
    }

    /// Stable deduplication key: source URL when present, else title.
    ///
    /// The same key is used for within-run dedup and by the persistence
    /// collaborator for its exists-by-key check.
    pub fn dedup_key(&self) -> &str {
        match self.source_url.as_deref() {
            Some(url) if !url.trim().is_empty() => url,
            _ => &self.title,
        }
    }
}
