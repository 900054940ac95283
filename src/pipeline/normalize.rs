//! Normalization of scraped items into canonical records.
//!
//! Everything here is pure: the same item and detail always produce the same
//! record.

use std::sync::LazyLock;

use regex::Regex;

use crate::models::{CanonicalRecord, DetailInfo, ListingItem};

/// Leading bracketed groups such as `[기획]`, `(1+1)`, or `【단독】`.
static BRACKET_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:\s*(?:\[[^\]]*\]|\([^)]*\)|【[^】]*】))+").expect("valid bracket regex")
});

/// A number directly followed by a unit, e.g. `50ml`, `1.5L`, `30매`, `2개입`.
static QUANTITY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\d+(?:\.\d+)?(?:ml|l|g|kg|mg|oz|매|개|입|ea|p)").expect("valid quantity regex")
});

/// Effect tags and the name keywords that imply them, in insertion order.
const EFFECT_KEYWORDS: &[(&str, &[&str])] = &[
    ("hydration", &["수분", "보습", "히알루론", "moist", "hydra"]),
    ("elasticity", &["탄력", "주름", "콜라겐", "firm"]),
    ("radiance", &["미백", "브라이트닝", "광채", "비타민", "bright"]),
    ("soothing", &["진정", "시카", "병풀", "calm", "cica"]),
    ("pore-care", &["모공", "pore"]),
    ("sebum-control", &["피지", "유분", "sebum"]),
];

/// Run-wide values stamped onto every record.
#[derive(Debug, Clone, Copy)]
pub struct NormalizeContext<'a> {
    pub category: &'a str,
    /// Source name used in the provenance note.
    pub source: &'a str,
}

/// Numeric price from display text: all digits concatenated.
pub fn price_value(price_text: Option<&str>) -> Option<u64> {
    let digits: String = price_text?.chars().filter(char::is_ascii_digit).collect();
    if digits.is_empty() {
        return None;
    }
    digits.parse().ok()
}

/// Guess the brand from a product name when the card had none.
///
/// Strips leading bracketed groups and takes the first word, unless that word
/// is a quantity or has no letters or digits at all.
pub fn derive_brand(name: &str) -> Option<String> {
    let stripped = BRACKET_PREFIX.replace(name, "");
    let token = stripped.split_whitespace().next()?;

    if QUANTITY.is_match(token) {
        return None;
    }
    if !token.chars().any(char::is_alphanumeric) {
        return None;
    }
    Some(token.to_string())
}

/// Effect tags implied by keywords in the product name.
pub fn derive_tags(name: &str) -> Vec<String> {
    let name = name.to_lowercase();
    EFFECT_KEYWORDS
        .iter()
        .filter(|(_, keywords)| keywords.iter().any(|k| name.contains(&k.to_lowercase())))
        .map(|(tag, _)| tag.to_string())
        .collect()
}

/// Provenance line kept on each record for traceability.
pub fn provenance_note(source: &str, item: &ListingItem) -> String {
    format!(
        "{} | price: {} | link: {}",
        source,
        item.price_text.as_deref().unwrap_or("-"),
        item.link.as_deref().unwrap_or("-")
    )
}

/// Assemble the canonical record for one item.
pub fn normalize(item: &ListingItem, detail: &DetailInfo, ctx: &NormalizeContext<'_>) -> CanonicalRecord {
    let brand = item
        .brand
        .as_deref()
        .map(str::trim)
        .filter(|b| !b.is_empty())
        .map(str::to_string)
        .or_else(|| derive_brand(&item.name));

    let effect_tags = if item.tags.is_empty() {
        derive_tags(&item.name)
    } else {
        item.tags.clone()
    };

    CanonicalRecord {
        name: item.name.clone(),
        brand,
        category: ctx.category.to_string(),
        effect_tags,
        key_ingredients: detail.ingredients.clone(),
        image_url: item.image_url.clone(),
        note: provenance_note(ctx.source, item),
    }
}
