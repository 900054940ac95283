//! Catalog ingestion: scrape a paginated product listing with a headless
//! browser, enrich each product from its detail page, and either snapshot the
//! raw batch locally or normalize it into a remote catalog store.

pub mod browser;
pub mod cli;
pub mod config;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod selectors;
pub mod sink;

pub use error::PipelineError;
pub use pipeline::{ingest, run, RunSummary};
