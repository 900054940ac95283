//! Detail page enrichment: specification table and ingredient list.

use std::collections::BTreeMap;

use scraper::{Html, Selector};
use tracing::{debug, warn};

use super::text::{cell_text, element_text};
use crate::browser::{DriverError, PageDriver};
use crate::config::{ConfigError, DetailSettings, RunConfig, Timing};
use crate::models::{DetailInfo, ListingItem};
use crate::selectors::Field;

/// Separators between ingredient names.
const INGREDIENT_SEPARATORS: &[char] = &[',', '·', '\n'];

/// Split an ingredient list on commas, middle dots, and line breaks.
pub fn split_ingredients(text: &str) -> Vec<String> {
    text.split(INGREDIENT_SEPARATORS)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Visits detail pages and extracts their specification table.
#[derive(Debug)]
pub struct DetailEnricher {
    tables: Vec<Selector>,
    row: Selector,
    header: Selector,
    data: Selector,
    settings: DetailSettings,
    timing: Timing,
}

impl DetailEnricher {
    pub fn new(config: &RunConfig) -> Result<Self, ConfigError> {
        let chain = config.selectors.resolve_field(Field::DetailTable);
        Ok(Self {
            tables: chain.compile(Field::DetailTable)?,
            row: fixed_selector("tr"),
            header: fixed_selector("th"),
            data: fixed_selector("td"),
            settings: config.detail.clone(),
            timing: config.timing,
        })
    }

    /// Enrich one item. Never fails: any error yields an empty [`DetailInfo`].
    pub async fn enrich<D>(&self, driver: &mut D, item: &ListingItem) -> DetailInfo
    where
        D: PageDriver + ?Sized,
    {
        let Some(link) = item.link.as_deref() else {
            debug!("No link for '{}', skipping detail page", item.name);
            return DetailInfo::empty();
        };

        match self.try_enrich(driver, link).await {
            Ok(detail) => detail,
            Err(e) => {
                warn!("Detail page failed for '{}' ({}): {}", item.name, link, e);
                DetailInfo::empty()
            }
        }
    }

    async fn try_enrich<D>(&self, driver: &mut D, link: &str) -> Result<DetailInfo, DriverError>
    where
        D: PageDriver + ?Sized,
    {
        driver.navigate(link, self.timing.navigation_timeout).await?;
        tokio::time::sleep(self.timing.detail_settle).await;

        self.activate_tab(driver).await;
        tokio::time::sleep(self.timing.tab_settle).await;

        let html = driver.content().await?;
        Ok(self.parse(&html))
    }

    /// Best-effort click on the tab that reveals the table. Failures are ignored.
    async fn activate_tab<D>(&self, driver: &mut D)
    where
        D: PageDriver + ?Sized,
    {
        let click = driver.click_text(&self.settings.tab_selector, &self.settings.tab_label);
        match tokio::time::timeout(self.timing.tab_timeout, click).await {
            Ok(Ok(true)) => debug!("Activated '{}' tab", self.settings.tab_label),
            Ok(Ok(false)) => debug!("No '{}' tab on page", self.settings.tab_label),
            Ok(Err(e)) => debug!("Tab activation failed: {}", e),
            Err(_) => debug!("Tab activation timed out"),
        }
    }

    /// Extract detail info from rendered detail page HTML.
    pub fn parse(&self, html: &str) -> DetailInfo {
        let document = Html::parse_document(html);
        let Some(table) = self
            .tables
            .iter()
            .find_map(|sel| document.select(sel).next())
        else {
            return DetailInfo::empty();
        };

        let mut fields = BTreeMap::new();
        let mut ingredient_text = None;

        for row in table.select(&self.row) {
            let (Some(th), Some(td)) = (row.select(&self.header).next(), row.select(&self.data).next())
            else {
                continue;
            };
            let key = element_text(th);
            if key.is_empty() {
                continue;
            }
            let value = cell_text(td);

            if ingredient_text.is_none() && self.is_ingredient_key(&key) {
                ingredient_text = Some(value.clone());
            }
            fields.entry(key).or_insert(value);
        }

        let ingredients = ingredient_text
            .as_deref()
            .map(split_ingredients)
            .unwrap_or_default();

        DetailInfo {
            fields: Some(fields),
            ingredient_text,
            ingredients,
        }
    }

    fn is_ingredient_key(&self, key: &str) -> bool {
        let key = key.to_lowercase();
        self.settings
            .ingredient_markers
            .iter()
            .any(|marker| key.contains(&marker.to_lowercase()))
    }
}

fn fixed_selector(css: &str) -> Selector {
    Selector::parse(css).expect("tag name selectors always parse")
}
