//! Browser launch settings.
//!
//! These live outside `#[cfg(feature = "browser")]` so config parsing works
//! without the browser feature.

use serde::{Deserialize, Serialize};

use crate::config::EnvSource;

/// Realistic desktop user agent applied to both page handles.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Browser launch configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrowserSettings {
    /// Run in headless mode (default: true).
    /// Set to false for debugging selector problems.
    #[serde(default = "default_headless")]
    pub headless: bool,

    /// Proxy server URL (e.g., "socks5://127.0.0.1:1080").
    #[serde(default)]
    pub proxy: Option<String>,

    /// Additional Chrome arguments.
    #[serde(default)]
    pub chrome_args: Vec<String>,

    /// Remote Chrome DevTools URL (e.g., "ws://localhost:9222").
    /// If set, connects to existing browser instead of launching one.
    #[serde(default)]
    pub remote_url: Option<String>,

    /// User agent override. Defaults to a desktop Chrome string.
    #[serde(default)]
    pub user_agent: Option<String>,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            headless: default_headless(),
            proxy: None,
            chrome_args: Vec::new(),
            remote_url: None,
            user_agent: None,
        }
    }
}

pub fn default_headless() -> bool {
    true
}

impl BrowserSettings {
    /// Apply environment variable overrides.
    ///
    /// - `BROWSER_URL` - Remote Chrome DevTools URL
    /// - `BROWSER_HEADLESS` - `false`/`0` to show the browser window
    /// - `SOCKS_PROXY` - Proxy for browser traffic
    pub fn with_env_overrides(mut self, env: &impl EnvSource) -> Self {
        if let Some(url) = env.var("BROWSER_URL").filter(|v| !v.trim().is_empty()) {
            self.remote_url = Some(url.trim().to_string());
        }
        if let Some(raw) = env.var("BROWSER_HEADLESS") {
            match raw.trim().to_lowercase().as_str() {
                "false" | "0" | "no" => self.headless = false,
                "true" | "1" | "yes" => self.headless = true,
                _ => {}
            }
        }
        if let Some(proxy) = env.var("SOCKS_PROXY").filter(|v| !v.trim().is_empty()) {
            self.proxy = Some(proxy.trim().to_string());
        }
        self
    }

    pub fn user_agent(&self) -> &str {
        self.user_agent.as_deref().unwrap_or(DEFAULT_USER_AGENT)
    }
}
