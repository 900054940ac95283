//! Listing traversal across paginated catalog pages.

use tracing::{info, warn};
use url::Url;

use super::listing::{ListingContext, ListingExtractor};
use crate::browser::{DriverError, PageDriver};
use crate::config::RunConfig;
use crate::models::ListingItem;

/// What one listing page produced.
#[derive(Debug)]
pub enum PageOutcome {
    Items(Vec<ListingItem>),
    /// No product cards: the natural end of the catalog.
    EmptyPage,
    /// Navigation or extraction failed.
    Fault(DriverError),
}

/// Why pagination ended. All of these keep what was collected so far.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    MaxPages,
    EmptyPage { page: u32 },
    Fault { page: u32 },
}

/// Aggregate result of walking the listing pages.
#[derive(Debug)]
pub struct PaginationReport {
    pub items: Vec<ListingItem>,
    /// Pages for which a navigation was issued.
    pub pages_visited: u32,
    pub stop: StopReason,
}

/// The listing URL with the pagination parameter set to `page`.
///
/// Any existing value of the parameter is replaced; other parameters keep
/// their order.
pub fn page_url(base: &Url, param: &str, page: u32) -> Url {
    let kept: Vec<(String, String)> = base
        .query_pairs()
        .filter(|(k, _)| k != param)
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    let mut url = base.clone();
    url.query_pairs_mut()
        .clear()
        .extend_pairs(kept)
        .append_pair(param, &page.to_string());
    url
}

/// Load and extract a single listing page.
pub async fn fetch_page<D>(
    driver: &mut D,
    extractor: &ListingExtractor,
    config: &RunConfig,
    page: u32,
) -> PageOutcome
where
    D: PageDriver + ?Sized,
{
    let url = page_url(&config.listing_url, &config.page_param, page);

    if let Err(e) = driver
        .navigate(url.as_str(), config.timing.navigation_timeout)
        .await
    {
        return PageOutcome::Fault(e);
    }
    tokio::time::sleep(config.timing.listing_settle).await;

    let html = match driver.content().await {
        Ok(html) => html,
        Err(e) => return PageOutcome::Fault(e),
    };

    let ctx = ListingContext {
        page_url: &url,
        category_id: config.category_id.as_deref(),
        detail_url_template: config.detail_url_template.as_deref(),
    };
    let items = extractor.extract(&html, &ctx);
    if items.is_empty() {
        PageOutcome::EmptyPage
    } else {
        PageOutcome::Items(items)
    }
}

/// Walk listing pages from 1 until `max_pages`, an empty page, or a fault.
pub async fn paginate<D>(
    driver: &mut D,
    extractor: &ListingExtractor,
    config: &RunConfig,
) -> PaginationReport
where
    D: PageDriver + ?Sized,
{
    let mut items = Vec::new();
    let mut page = 1;
    let mut pages_visited = 0;

    let stop = loop {
        if page > config.max_pages {
            break StopReason::MaxPages;
        }

        info!("Listing page {}/{}", page, config.max_pages);
        pages_visited += 1;

        match fetch_page(driver, extractor, config, page).await {
            PageOutcome::Items(found) => {
                info!("Page {}: {} items", page, found.len());
                items.extend(found);
                page += 1;
            }
            PageOutcome::EmptyPage => {
                info!("Page {} has no products, stopping", page);
                break StopReason::EmptyPage { page };
            }
            PageOutcome::Fault(e) => {
                warn!(
                    "Page {} failed ({}), keeping {} items collected so far",
                    page,
                    e,
                    items.len()
                );
                break StopReason::Fault { page };
            }
        }
    };

    PaginationReport {
        items,
        pages_visited,
        stop,
    }
}
