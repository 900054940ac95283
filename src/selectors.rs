//! Selector registry: ordered fallback CSS selector chains per extracted field.
//!
//! Catalog markup drifts between deployments, so every field is looked up through
//! a chain of selectors tried in order until one yields a value. Chains come from
//! built-in defaults, optionally replaced per field by the config file or by
//! `CATALOG_SELECTOR_<FIELD>` environment variables (entries separated by `||`).

use std::collections::BTreeMap;
use std::fmt;

use scraper::Selector;
use serde::{Deserialize, Serialize};

use crate::config::{ConfigError, EnvSource};

/// Separator between selectors inside a single environment variable.
pub const ENV_CHAIN_SEPARATOR: &str = "||";

/// Fields that are located through a selector chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Field {
    /// Product card container on a listing page.
    Card,
    Name,
    Brand,
    Price,
    Link,
    Image,
    Tag,
    /// Specification table on a detail page.
    DetailTable,
}

impl Field {
    pub const ALL: [Field; 8] = [
        Field::Card,
        Field::Name,
        Field::Brand,
        Field::Price,
        Field::Link,
        Field::Image,
        Field::Tag,
        Field::DetailTable,
    ];

    /// Key used in config files and log output.
    pub fn key(&self) -> &'static str {
        match self {
            Self::Card => "card",
            Self::Name => "name",
            Self::Brand => "brand",
            Self::Price => "price",
            Self::Link => "link",
            Self::Image => "image",
            Self::Tag => "tag",
            Self::DetailTable => "detail_table",
        }
    }

    /// Environment variable that overrides this field's chain.
    pub fn env_var(&self) -> String {
        format!("CATALOG_SELECTOR_{}", self.key().to_uppercase())
    }

    fn defaults(&self) -> &'static [&'static str] {
        match self {
            Self::Card => &[
                ".prd_info",
                "ul.cate_prd_list > li",
                ".product-item",
                "[data-ref-goodsno]",
            ],
            Self::Name => &[".tx_name", ".prd_name", ".product-name", ".name"],
            Self::Brand => &[".tx_brand", ".prd_brand", ".brand"],
            Self::Price => &[".tx_cur .tx_num", ".prd_price .tx_cur", ".price", ".prd_price"],
            Self::Link => &["a.prd_thumb", ".prd_name a", "a.goodsList", "a[href]"],
            Self::Image => &["a.prd_thumb img", ".prd_img img", "img"],
            Self::Tag => &[".prd_flag .icon_flag", ".flag span", ".badge"],
            Self::DetailTable => &[
                "#artcInfo table",
                ".prd_detail_info table",
                "table.tbl_type",
                "table",
            ],
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Ordered, non-empty list of selector expressions. First match wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorChain(Vec<String>);

impl SelectorChain {
    /// Build a chain from raw entries, dropping blanks.
    ///
    /// Returns `None` when nothing usable remains so the caller can fall back
    /// to the built-in default.
    pub fn new<I, S>(entries: I) -> Option<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let entries: Vec<String> = entries
            .into_iter()
            .map(|s| s.as_ref().trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        if entries.is_empty() {
            None
        } else {
            Some(Self(entries))
        }
    }

    /// Parse the `a||b||c` form used in environment variables.
    pub fn parse_env(raw: &str) -> Option<Self> {
        Self::new(raw.split(ENV_CHAIN_SEPARATOR))
    }

    fn default_for(field: Field) -> Self {
        Self(field.defaults().iter().map(|s| s.to_string()).collect())
    }

    pub fn entries(&self) -> &[String] {
        &self.0
    }

    /// All entries joined into one selector group.
    pub fn joined(&self) -> String {
        self.0.join(", ")
    }

    /// Compile every entry, failing on the first invalid one.
    pub fn compile(&self, field: Field) -> Result<Vec<Selector>, ConfigError> {
        self.0
            .iter()
            .map(|s| {
                Selector::parse(s).map_err(|e| ConfigError::InvalidSelector {
                    field: field.key(),
                    selector: s.clone(),
                    reason: e.to_string(),
                })
            })
            .collect()
    }
}

/// Per-field chains as they appear in the `[selectors]` table of the config file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectorOverrides {
    #[serde(default)]
    pub card: Option<Vec<String>>,
    #[serde(default)]
    pub name: Option<Vec<String>>,
    #[serde(default)]
    pub brand: Option<Vec<String>>,
    #[serde(default)]
    pub price: Option<Vec<String>>,
    #[serde(default)]
    pub link: Option<Vec<String>>,
    #[serde(default)]
    pub image: Option<Vec<String>>,
    #[serde(default)]
    pub tag: Option<Vec<String>>,
    #[serde(default)]
    pub detail_table: Option<Vec<String>>,
}

impl SelectorOverrides {
    fn get(&self, field: Field) -> Option<&Vec<String>> {
        match field {
            Field::Card => self.card.as_ref(),
            Field::Name => self.name.as_ref(),
            Field::Brand => self.brand.as_ref(),
            Field::Price => self.price.as_ref(),
            Field::Link => self.link.as_ref(),
            Field::Image => self.image.as_ref(),
            Field::Tag => self.tag.as_ref(),
            Field::DetailTable => self.detail_table.as_ref(),
        }
    }
}

/// Resolved selector chains for every field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorRegistry {
    chains: BTreeMap<Field, SelectorChain>,
}

impl Default for SelectorRegistry {
    fn default() -> Self {
        Self {
            chains: Field::ALL
                .iter()
                .map(|&f| (f, SelectorChain::default_for(f)))
                .collect(),
        }
    }
}

impl SelectorRegistry {
    /// Resolve chains from file overrides and the environment.
    ///
    /// Environment beats file, file beats built-in defaults. Blank values at any
    /// level fall through to the next one.
    pub fn resolve(file: &SelectorOverrides, env: &impl EnvSource) -> Self {
        let mut registry = Self::default();
        for field in Field::ALL {
            let from_env = env
                .var(&field.env_var())
                .and_then(|raw| SelectorChain::parse_env(&raw));
            let from_file = file.get(field).and_then(|v| SelectorChain::new(v));
            if let Some(chain) = from_env.or(from_file) {
                registry.chains.insert(field, chain);
            }
        }
        registry
    }

    /// Chain for a field. Always non-empty.
    pub fn resolve_field(&self, field: Field) -> &SelectorChain {
        // Every field is populated at construction.
        &self.chains[&field]
    }

    /// Replace one chain, ignoring blank input.
    pub fn with_chain<I, S>(mut self, field: Field, entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        if let Some(chain) = SelectorChain::new(entries) {
            self.chains.insert(field, chain);
        }
        self
    }

    /// Compile every chain so invalid selectors surface at startup.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, chain) in &self.chains {
            chain.compile(*field)?;
            Selector::parse(&chain.joined()).map_err(|e| ConfigError::InvalidSelector {
                field: field.key(),
                selector: chain.joined(),
                reason: e.to_string(),
            })?;
        }
        Ok(())
    }
}
