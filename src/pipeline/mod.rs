//! The ingestion run: listing traversal, detail enrichment, then persistence.
//!
//! Stages run strictly in sequence over two page handles. Page faults and
//! detail failures are absorbed along the way; only configuration errors, a
//! browser that will not start, an empty catalog, or a failed persist end a
//! run with an error.

pub mod detail;
pub mod listing;
pub mod normalize;
pub mod pagination;
mod text;

use tracing::info;

pub use detail::{split_ingredients, DetailEnricher};
pub use listing::{ListingContext, ListingExtractor};
pub use normalize::{normalize, NormalizeContext};
pub use pagination::{page_url, paginate, PageOutcome, PaginationReport, StopReason};

use crate::browser::{DriverLauncher, PageDriver};
use crate::config::{EnvSource, RunArgs, RunConfig};
use crate::error::PipelineError;
use crate::models::EnrichedItem;
use crate::sink::{Sink, SinkOutcome};

/// Summary of a successful run.
#[derive(Debug)]
pub struct RunSummary {
    pub pages_visited: u32,
    pub stop: StopReason,
    pub items: usize,
    pub outcome: SinkOutcome,
}

/// Run the pipeline against already opened page handles.
pub async fn run<L, D>(
    config: &RunConfig,
    listing: &mut L,
    detail: &mut D,
    sink: &Sink,
) -> Result<RunSummary, PipelineError>
where
    L: PageDriver + ?Sized,
    D: PageDriver + ?Sized,
{
    let extractor = ListingExtractor::new(&config.selectors)?;
    let enricher = DetailEnricher::new(config)?;

    info!(
        "Scraping {} (up to {} pages, {} mode)",
        config.listing_url,
        config.max_pages,
        sink.label()
    );
    let report = paginate(listing, &extractor, config).await;
    info!(
        "Collected {} items from {} page(s), stopped: {:?}",
        report.items.len(),
        report.pages_visited,
        report.stop
    );

    if report.items.is_empty() {
        return Err(PipelineError::NoItems {
            pages_visited: report.pages_visited,
        });
    }

    let total = report.items.len();
    let mut enriched = Vec::with_capacity(total);
    for (i, item) in report.items.into_iter().enumerate() {
        let detail_info = enricher.enrich(detail, &item).await;
        let price_value = normalize::price_value(item.price_text.as_deref());
        info!(
            "[{}/{}] {} ({} ingredients)",
            i + 1,
            total,
            item.name,
            detail_info.ingredients.len()
        );
        enriched.push(EnrichedItem {
            item,
            detail: detail_info,
            price_value,
        });
    }
    info!("Enriched {} items", enriched.len());

    let ctx = NormalizeContext {
        category: &config.category,
        source: &config.source_name,
    };
    let outcome = sink.persist(&enriched, &ctx).await?;

    Ok(RunSummary {
        pages_visited: report.pages_visited,
        stop: report.stop,
        items: enriched.len(),
        outcome,
    })
}

/// Resolve configuration, open the browser, and run the pipeline.
///
/// Configuration and sink problems are reported before the browser is launched.
pub async fn ingest<L>(
    args: &RunArgs,
    env: &impl EnvSource,
    launcher: &L,
) -> Result<RunSummary, PipelineError>
where
    L: DriverLauncher,
{
    let config = RunConfig::resolve(args, env)?;
    let sink = Sink::from_output(&config.output)?;

    let mut pages = launcher
        .launch(&config.browser)
        .await
        .map_err(PipelineError::Launch)?;

    run(&config, &mut pages.listing, &mut pages.detail, &sink).await
}
