//! Remote catalog store.
//!
//! The store is a hosted Postgres behind a PostgREST-style HTTP API; the only
//! operation the pipeline needs is a single batch insert.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

use crate::config::StoreSettings;
use crate::models::CanonicalRecord;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Store rejected batch with status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Invalid store URL '{0}'")]
    InvalidUrl(String),
}

/// Destination for canonical records.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Insert the whole batch at once. Returns the number of records sent.
    async fn insert_batch(&self, records: &[CanonicalRecord]) -> Result<usize, StoreError>;
}

/// Catalog store reached over its REST endpoint.
pub struct RestCatalogStore {
    client: reqwest::Client,
    endpoint: Url,
    key: String,
}

impl RestCatalogStore {
    pub fn new(settings: &StoreSettings) -> Result<Self, StoreError> {
        let endpoint = settings
            .endpoint()
            .map_err(|_| StoreError::InvalidUrl(settings.url.clone()))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()?;

        Ok(Self {
            client,
            endpoint,
            key: settings.key.clone(),
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl CatalogStore for RestCatalogStore {
    async fn insert_batch(&self, records: &[CanonicalRecord]) -> Result<usize, StoreError> {
        if records.is_empty() {
            return Ok(0);
        }

        debug!("POST {} ({} records)", self.endpoint, records.len());
        let response = self
            .client
            .post(self.endpoint.clone())
            .header("apikey", &self.key)
            .bearer_auth(&self.key)
            .header("Prefer", "return=minimal")
            .json(records)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Status {
                status: status.as_u16(),
                body,
            });
        }

        info!("Inserted {} records into {}", records.len(), self.endpoint);
        Ok(records.len())
    }
}
