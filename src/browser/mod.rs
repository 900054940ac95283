//! Headless browser capability used by the listing and detail stages.
//!
//! The pipeline only needs three things from a page: go somewhere, hand back
//! the rendered DOM, and click an element by its visible text. [`PageDriver`]
//! captures exactly that, so stages can be driven by Chromium in production
//! and by in-memory fakes in tests.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

mod chrome;
mod config;

pub use chrome::{ChromeLauncher, ChromePage};
pub use config::{default_headless, BrowserSettings, DEFAULT_USER_AGENT};

/// Errors raised by a page driver.
#[derive(Debug, Error)]
pub enum DriverError {
    #[error("Navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("Navigation to {url} timed out after {timeout:?}")]
    Timeout { url: String, timeout: Duration },

    #[error("Page script failed: {0}")]
    Script(String),

    #[error("Browser launch failed: {0}")]
    Launch(String),

    #[error("Browser support not compiled. Rebuild with: cargo build --features browser")]
    Unavailable,
}

/// One browser tab, reused sequentially for many navigations.
#[async_trait]
pub trait PageDriver: Send {
    /// Navigate to `url`, giving up after `timeout`.
    async fn navigate(&mut self, url: &str, timeout: Duration) -> Result<(), DriverError>;

    /// Rendered HTML of the current document.
    async fn content(&mut self) -> Result<String, DriverError>;

    /// Click the first element matching `selector` whose visible text contains `label`.
    ///
    /// Returns `Ok(false)` when no such element exists.
    async fn click_text(&mut self, selector: &str, label: &str) -> Result<bool, DriverError>;
}

/// The two page handles held for a run: one per traversal.
pub struct DriverPair<D> {
    pub listing: D,
    pub detail: D,
}

/// Opens browser sessions for a run.
#[async_trait]
pub trait DriverLauncher: Send + Sync {
    type Driver: PageDriver;

    async fn launch(&self, settings: &BrowserSettings) -> Result<DriverPair<Self::Driver>, DriverError>;
}
