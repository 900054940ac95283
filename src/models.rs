//! Product data types flowing through the ingestion pipeline.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A product card pulled from one listing page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingItem {
    /// Product name (never empty; nameless cards are dropped by the extractor).
    pub name: String,
    pub brand: Option<String>,
    /// Price exactly as displayed, e.g. "23,900원".
    pub price_text: Option<String>,
    /// Absolute detail page URL, scraped or synthesized.
    pub link: Option<String>,
    pub image_url: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl ListingItem {
    /// Create an item with only a name set.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            brand: None,
            price_text: None,
            link: None,
            image_url: None,
            tags: Vec::new(),
        }
    }
}

/// Attributes scraped from a product's detail page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetailInfo {
    /// Row header to row value, from the first matching specification table.
    pub fields: Option<BTreeMap<String, String>>,
    /// Raw value of the ingredient row.
    pub ingredient_text: Option<String>,
    /// Ingredient list split out of `ingredient_text`.
    #[serde(default)]
    pub ingredients: Vec<String>,
}

impl DetailInfo {
    /// Detail info for an item that was never enriched or whose page failed.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_none() && self.ingredient_text.is_none() && self.ingredients.is_empty()
    }
}

/// A listing item together with its detail data, as written to preview snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichedItem {
    #[serde(flatten)]
    pub item: ListingItem,
    pub detail: DetailInfo,
    pub price_value: Option<u64>,
}

/// Persistence-ready representation of one product.
///
/// Field names match the columns of the catalog store table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalRecord {
    pub name: String,
    pub brand: Option<String>,
    pub category: String,
    pub effect_tags: Vec<String>,
    pub key_ingredients: Vec<String>,
    pub image_url: Option<String>,
    pub note: String,
}
