//! Chromium page driver over the DevTools protocol.
//!
//! Launches a local Chrome/Chromium (or connects to `BROWSER_URL`) and opens
//! two tabs that stay alive for the whole run.

#[cfg(feature = "browser")]
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
#[cfg(feature = "browser")]
use tracing::{debug, info};

#[cfg(feature = "browser")]
use chromiumoxide::cdp::browser_protocol::network::SetUserAgentOverrideParams;
#[cfg(feature = "browser")]
use chromiumoxide::{Browser, BrowserConfig, Page};
#[cfg(feature = "browser")]
use futures::StreamExt;
#[cfg(feature = "browser")]
use tokio::sync::Mutex;

use super::{BrowserSettings, DriverError, DriverLauncher, DriverPair, PageDriver};

/// Launches Chromium and hands out the listing and detail tabs.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChromeLauncher;

/// A Chromium tab. Keeps the owning browser alive while in use.
#[cfg(feature = "browser")]
pub struct ChromePage {
    page: Page,
    _browser: Arc<Mutex<Browser>>,
}

#[cfg(feature = "browser")]
impl ChromeLauncher {
    /// Common Chrome executable paths to check.
    const CHROME_PATHS: &'static [&'static str] = &[
        // Linux
        "/usr/bin/google-chrome",
        "/usr/bin/google-chrome-stable",
        "/usr/bin/chromium",
        "/usr/bin/chromium-browser",
        "/snap/bin/chromium",
        // macOS
        "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
        "/Applications/Chromium.app/Contents/MacOS/Chromium",
        "/opt/google/chrome/google-chrome",
    ];

    fn find_chrome() -> Result<std::path::PathBuf, DriverError> {
        for path in Self::CHROME_PATHS {
            let p = std::path::Path::new(path);
            if p.exists() {
                info!("Found Chrome at: {}", path);
                return Ok(p.to_path_buf());
            }
        }

        for cmd in &[
            "google-chrome",
            "google-chrome-stable",
            "chromium",
            "chromium-browser",
        ] {
            if let Ok(output) = std::process::Command::new("which").arg(cmd).output() {
                if output.status.success() {
                    let path = String::from_utf8_lossy(&output.stdout).trim().to_string();
                    if !path.is_empty() {
                        info!("Found Chrome in PATH: {}", path);
                        return Ok(std::path::PathBuf::from(path));
                    }
                }
            }
        }

        Err(DriverError::Launch(
            "Chrome/Chromium not found. Install it or set BROWSER_URL to a running instance"
                .to_string(),
        ))
    }

    async fn start(settings: &BrowserSettings) -> Result<Browser, DriverError> {
        if let Some(remote_url) = settings.remote_url.as_deref() {
            return Self::connect_remote(remote_url).await;
        }

        info!("Launching browser (headless={})", settings.headless);
        let mut builder = BrowserConfig::builder().chrome_executable(Self::find_chrome()?);

        // with_head means NOT headless
        if !settings.headless {
            builder = builder.with_head();
        }
        if let Some(ref proxy) = settings.proxy {
            builder = builder.arg(format!("--proxy-server={}", proxy));
        }

        builder = builder
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--disable-dev-shm-usage")
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--no-sandbox")
            .arg("--disable-gpu");
        for arg in &settings.chrome_args {
            builder = builder.arg(arg);
        }

        let config = builder.build().map_err(DriverError::Launch)?;
        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| DriverError::Launch(e.to_string()))?;

        tokio::spawn(async move {
            while let Some(h) = handler.next().await {
                if h.is_err() {
                    break;
                }
            }
        });

        Ok(browser)
    }

    async fn connect_remote(url: &str) -> Result<Browser, DriverError> {
        info!("Connecting to remote browser at {}", url);

        let http_url = url
            .replace("ws://", "http://")
            .replace("wss://", "https://");
        let version_url = format!("{}/json/version", http_url.trim_end_matches('/'));

        let resp: serde_json::Value = reqwest::Client::new()
            .get(&version_url)
            .send()
            .await
            .map_err(|e| DriverError::Launch(format!("remote browser unreachable: {}", e)))?
            .json()
            .await
            .map_err(|e| DriverError::Launch(format!("bad version info: {}", e)))?;

        let ws_url = resp
            .get("webSocketDebuggerUrl")
            .and_then(|v| v.as_str())
            .ok_or_else(|| DriverError::Launch("no webSocketDebuggerUrl in response".to_string()))?;

        let (browser, mut handler) = Browser::connect(ws_url)
            .await
            .map_err(|e| DriverError::Launch(e.to_string()))?;

        tokio::spawn(async move {
            while let Some(h) = handler.next().await {
                if h.is_err() {
                    break;
                }
            }
        });

        Ok(browser)
    }

    async fn open_page(
        browser: &Arc<Mutex<Browser>>,
        user_agent: &str,
    ) -> Result<ChromePage, DriverError> {
        let page = browser
            .lock()
            .await
            .new_page("about:blank")
            .await
            .map_err(|e| DriverError::Launch(e.to_string()))?;
        page.execute(SetUserAgentOverrideParams::new(user_agent.to_string()))
            .await
            .map_err(|e| DriverError::Launch(e.to_string()))?;
        Ok(ChromePage {
            page,
            _browser: Arc::clone(browser),
        })
    }
}

#[cfg(feature = "browser")]
#[async_trait]
impl DriverLauncher for ChromeLauncher {
    type Driver = ChromePage;

    async fn launch(&self, settings: &BrowserSettings) -> Result<DriverPair<ChromePage>, DriverError> {
        let browser = Arc::new(Mutex::new(Self::start(settings).await?));
        let listing = Self::open_page(&browser, settings.user_agent()).await?;
        let detail = Self::open_page(&browser, settings.user_agent()).await?;
        Ok(DriverPair { listing, detail })
    }
}

/// Clicks the first candidate whose rendered text contains the label.
#[cfg(feature = "browser")]
fn click_script(selector: &str, label: &str) -> String {
    // JSON string literals are valid JS string literals.
    let selector = serde_json::Value::from(selector).to_string();
    let label = serde_json::Value::from(label).to_string();
    format!(
        r#"
        (() => {{
            const label = {label};
            for (const el of document.querySelectorAll({selector})) {{
                const text = (el.innerText || el.textContent || '').trim();
                if (text.includes(label)) {{
                    el.click();
                    return true;
                }}
            }}
            return false;
        }})()
        "#
    )
}

#[cfg(feature = "browser")]
#[async_trait]
impl PageDriver for ChromePage {
    async fn navigate(&mut self, url: &str, timeout: Duration) -> Result<(), DriverError> {
        debug!("Navigating to {}", url);
        match tokio::time::timeout(timeout, self.page.goto(url)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(DriverError::Navigation {
                url: url.to_string(),
                reason: e.to_string(),
            }),
            Err(_) => Err(DriverError::Timeout {
                url: url.to_string(),
                timeout,
            }),
        }
    }

    async fn content(&mut self) -> Result<String, DriverError> {
        self.page
            .content()
            .await
            .map_err(|e| DriverError::Script(e.to_string()))
    }

    async fn click_text(&mut self, selector: &str, label: &str) -> Result<bool, DriverError> {
        self.page
            .evaluate(click_script(selector, label))
            .await
            .map_err(|e| DriverError::Script(e.to_string()))?
            .into_value::<bool>()
            .map_err(|e| DriverError::Script(e.to_string()))
    }
}

// Stub for when browser feature is disabled
#[cfg(not(feature = "browser"))]
pub struct ChromePage {
    _private: (),
}

#[cfg(not(feature = "browser"))]
#[async_trait]
impl DriverLauncher for ChromeLauncher {
    type Driver = ChromePage;

    async fn launch(&self, _settings: &BrowserSettings) -> Result<DriverPair<ChromePage>, DriverError> {
        Err(DriverError::Unavailable)
    }
}

#[cfg(not(feature = "browser"))]
#[async_trait]
impl PageDriver for ChromePage {
    async fn navigate(&mut self, _url: &str, _timeout: Duration) -> Result<(), DriverError> {
        Err(DriverError::Unavailable)
    }

    async fn content(&mut self) -> Result<String, DriverError> {
        Err(DriverError::Unavailable)
    }

    async fn click_text(&mut self, _selector: &str, _label: &str) -> Result<bool, DriverError> {
        Err(DriverError::Unavailable)
    }
}
