//! Persistence of the finished batch.
//!
//! Preview mode snapshots the raw enriched items to a local JSON file; write
//! mode normalizes them and inserts the canonical records in one call. Either
//! way persistence happens exactly once per run, after scraping is complete.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use thiserror::Error;
use tracing::{error, info};

mod store;

pub use store::{CatalogStore, RestCatalogStore, StoreError};

use crate::config::OutputMode;
use crate::models::{CanonicalRecord, EnrichedItem};
use crate::pipeline::normalize::{normalize, NormalizeContext};

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("Failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Store insert failed: {0}")]
    Store(#[from] StoreError),
}

/// What persistence did with the batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkOutcome {
    Snapshot { path: PathBuf, count: usize },
    Inserted { count: usize },
}

/// Batch destination, chosen once at startup.
pub enum Sink {
    Preview { output_dir: PathBuf },
    Write { store: Box<dyn CatalogStore> },
}

impl Sink {
    /// Build the sink for the configured output mode.
    pub fn from_output(output: &OutputMode) -> Result<Self, SinkError> {
        Ok(match output {
            OutputMode::Preview { output_dir } => Self::Preview {
                output_dir: output_dir.clone(),
            },
            OutputMode::Write { store } => Self::Write {
                store: Box::new(RestCatalogStore::new(store)?),
            },
        })
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Preview { .. } => "preview",
            Self::Write { .. } => "write",
        }
    }

    /// Persist the whole batch.
    pub async fn persist(
        &self,
        items: &[EnrichedItem],
        ctx: &NormalizeContext<'_>,
    ) -> Result<SinkOutcome, SinkError> {
        match self {
            Self::Preview { output_dir } => {
                let path = write_snapshot(output_dir, ctx.category, items, Local::now())?;
                info!("Wrote {} items to {}", items.len(), path.display());
                Ok(SinkOutcome::Snapshot {
                    path,
                    count: items.len(),
                })
            }
            Self::Write { store } => {
                let records: Vec<CanonicalRecord> = items
                    .iter()
                    .map(|e| normalize(&e.item, &e.detail, ctx))
                    .collect();

                match store.insert_batch(&records).await {
                    Ok(count) => Ok(SinkOutcome::Inserted { count }),
                    Err(e) => {
                        error!("Insert of {} records failed: {}", records.len(), e);
                        dump_records(&records);
                        Err(e.into())
                    }
                }
            }
        }
    }
}

/// Snapshot file name: category plus local timestamp down to milliseconds.
pub fn snapshot_file_name(category: &str, at: DateTime<Local>) -> String {
    format!("{}-{}.json", snapshot_stem(category), at.format("%Y%m%d-%H%M%S-%3f"))
}

fn snapshot_stem(category: &str) -> String {
    category
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '-' })
        .collect()
}

/// Write items as indented JSON under `dir`, creating it if needed.
///
/// Never replaces an existing snapshot: a taken name gets a numeric suffix.
pub fn write_snapshot(
    dir: &Path,
    category: &str,
    items: &[EnrichedItem],
    at: DateTime<Local>,
) -> Result<PathBuf, SinkError> {
    fs::create_dir_all(dir).map_err(|source| SinkError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let json = serde_json::to_string_pretty(items)?;
    let base = snapshot_file_name(category, at);
    let stem = base.trim_end_matches(".json");

    let mut attempt = 0u32;
    loop {
        let path = if attempt == 0 {
            dir.join(&base)
        } else {
            dir.join(format!("{}-{}.json", stem, attempt))
        };
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(mut file) => {
                file.write_all(json.as_bytes())
                    .map_err(|source| SinkError::Io {
                        path: path.clone(),
                        source,
                    })?;
                return Ok(path);
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => attempt += 1,
            Err(source) => return Err(SinkError::Io { path, source }),
        }
    }
}

/// Last resort so records are not lost when the store is unreachable.
fn dump_records(records: &[CanonicalRecord]) {
    match serde_json::to_string_pretty(records) {
        Ok(json) => println!("{}", json),
        Err(e) => error!("Could not serialize records for fallback output: {}", e),
    }
}
