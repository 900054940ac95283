//! Run-level error taxonomy and process exit codes.

use std::process::ExitCode;

use thiserror::Error;

use crate::browser::DriverError;
use crate::config::ConfigError;
use crate::sink::SinkError;

/// Exit code when scraping produced nothing or the browser could not start.
pub const EXIT_SCRAPE_FAILED: u8 = 1;
/// Exit code for fatal configuration problems detected before any navigation.
pub const EXIT_CONFIG: u8 = 2;
/// Exit code when scraping succeeded but the batch could not be persisted.
pub const EXIT_PERSIST_FAILED: u8 = 3;

/// Errors that end an ingestion run.
///
/// Page-level and item-level failures never show up here; they are absorbed
/// by the pagination and enrichment stages.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Could not open browser pages: {0}")]
    Launch(#[source] DriverError),

    #[error("No items collected after {pages_visited} page(s)")]
    NoItems { pages_visited: u32 },

    #[error("Persistence failed: {0}")]
    Persist(#[from] SinkError),
}

impl PipelineError {
    pub fn exit_code(&self) -> ExitCode {
        ExitCode::from(self.code())
    }

    /// Raw exit status for this failure.
    pub fn code(&self) -> u8 {
        match self {
            Self::Config(_) => EXIT_CONFIG,
            Self::Launch(_) | Self::NoItems { .. } => EXIT_SCRAPE_FAILED,
            Self::Persist(_) => EXIT_PERSIST_FAILED,
        }
    }
}
