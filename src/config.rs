//! Run configuration, resolved once at startup.
//!
//! Values come from (highest priority first) command-line arguments, the
//! process environment (including `.env`), an optional TOML file, and built-in
//! defaults. The resulting [`RunConfig`] is immutable and passed explicitly to
//! every stage.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::browser::BrowserSettings;
use crate::selectors::{SelectorOverrides, SelectorRegistry};

pub const DEFAULT_PAGE_PARAM: &str = "pageIdx";
pub const DEFAULT_CATEGORY_PARAM: &str = "dispCatNo";
pub const DEFAULT_CATEGORY: &str = "skincare";
pub const DEFAULT_MAX_PAGES: u32 = 5;
pub const DEFAULT_OUTPUT_DIR: &str = "output";
pub const DEFAULT_STORE_TABLE: &str = "products";
pub const DEFAULT_TAB_LABEL: &str = "구매정보";
pub const DEFAULT_TAB_SELECTOR: &str = "a, button, [role=tab], li.tab";
pub const DEFAULT_INGREDIENT_MARKERS: &[&str] = &["성분", "ingredient"];

const DEFAULT_LISTING_WAIT_MS: u64 = 2500;
const DEFAULT_DETAIL_WAIT_MS: u64 = 2000;
const DEFAULT_TAB_WAIT_MS: u64 = 800;
const DEFAULT_TAB_TIMEOUT_MS: u64 = 1500;
const DEFAULT_NAV_TIMEOUT_MS: u64 = 30_000;

/// Startup configuration errors. All of these are fatal.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("No listing URL: pass a category URL, set CATALOG_LISTING_URL, or set CATALOG_LISTING_URL_TEMPLATE for category ids")]
    MissingListingUrl,

    #[error("Write mode requires CATALOG_STORE_URL and CATALOG_STORE_KEY")]
    MissingStore,

    #[error("Invalid URL '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("Invalid {field} selector '{selector}': {reason}")]
    InvalidSelector {
        field: &'static str,
        selector: String,
        reason: String,
    },

    #[error("Invalid value for {key}: '{value}'")]
    InvalidValue { key: String, value: String },

    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Read access to environment variables.
///
/// Abstracted so configuration can be resolved against an injected map in tests.
pub trait EnvSource {
    fn var(&self, key: &str) -> Option<String>;
}

/// The real process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

impl EnvSource for HashMap<String, String> {
    fn var(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

/// Non-empty, trimmed environment value.
fn env_value(env: &impl EnvSource, key: &str) -> Option<String> {
    env.var(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_number<T: std::str::FromStr>(env: &impl EnvSource, key: &str) -> Result<Option<T>, ConfigError> {
    match env_value(env, key) {
        Some(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue {
                key: key.to_string(),
                value: raw,
            }),
        None => Ok(None),
    }
}

/// Contents of the optional TOML config file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub listing_url: Option<String>,
    pub listing_url_template: Option<String>,
    pub page_param: Option<String>,
    pub max_pages: Option<u32>,
    pub category: Option<String>,
    pub category_param: Option<String>,
    pub source_name: Option<String>,
    pub detail_url_template: Option<String>,
    pub detail_tab_label: Option<String>,
    pub detail_tab_selector: Option<String>,
    pub ingredient_markers: Option<Vec<String>>,
    pub output_dir: Option<PathBuf>,
    pub listing_wait_ms: Option<u64>,
    pub detail_wait_ms: Option<u64>,
    pub tab_wait_ms: Option<u64>,
    pub tab_timeout_ms: Option<u64>,
    pub navigation_timeout_ms: Option<u64>,
    pub selectors: SelectorOverrides,
    pub browser: BrowserSettings,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Invocation arguments relevant to configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunArgs {
    /// Category URL or bare category id.
    pub target: Option<String>,
    pub pages: Option<u32>,
    pub write: bool,
    pub config_file: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
}

/// Connection parameters for the remote catalog store.
#[derive(Clone, PartialEq, Eq)]
pub struct StoreSettings {
    pub url: String,
    pub key: String,
    pub table: String,
}

impl std::fmt::Debug for StoreSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreSettings")
            .field("url", &self.url)
            .field("key", &"<redacted>")
            .field("table", &self.table)
            .finish()
    }
}

impl StoreSettings {
    /// Read store settings from the environment. `None` if URL or key is missing.
    pub fn from_env(env: &impl EnvSource) -> Option<Self> {
        Some(Self {
            url: env_value(env, "CATALOG_STORE_URL")?,
            key: env_value(env, "CATALOG_STORE_KEY")?,
            table: env_value(env, "CATALOG_STORE_TABLE")
                .unwrap_or_else(|| DEFAULT_STORE_TABLE.to_string()),
        })
    }

    /// Table endpoint: `{url}/rest/v1/{table}`.
    pub fn endpoint(&self) -> Result<Url, ConfigError> {
        let raw = format!("{}/rest/v1/{}", self.url.trim_end_matches('/'), self.table);
        Url::parse(&raw).map_err(|source| ConfigError::InvalidUrl { url: raw, source })
    }
}

/// Where the finished batch goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputMode {
    /// Snapshot of the raw enriched items written to a local JSON file.
    Preview { output_dir: PathBuf },
    /// One batch insert of canonical records into the remote store.
    Write { store: StoreSettings },
}

impl OutputMode {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Preview { .. } => "preview",
            Self::Write { .. } => "write",
        }
    }
}

/// Fixed waits and timeouts applied around browser navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    /// Settle time after each listing page navigation.
    pub listing_settle: Duration,
    /// Settle time after each detail page navigation.
    pub detail_settle: Duration,
    /// Shorter settle time after activating the detail tab.
    pub tab_settle: Duration,
    /// Upper bound on the tab activation attempt.
    pub tab_timeout: Duration,
    pub navigation_timeout: Duration,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            listing_settle: Duration::from_millis(DEFAULT_LISTING_WAIT_MS),
            detail_settle: Duration::from_millis(DEFAULT_DETAIL_WAIT_MS),
            tab_settle: Duration::from_millis(DEFAULT_TAB_WAIT_MS),
            tab_timeout: Duration::from_millis(DEFAULT_TAB_TIMEOUT_MS),
            navigation_timeout: Duration::from_millis(DEFAULT_NAV_TIMEOUT_MS),
        }
    }
}

impl Timing {
    /// No waiting at all; navigation still bounded.
    pub fn immediate() -> Self {
        Self {
            listing_settle: Duration::ZERO,
            detail_settle: Duration::ZERO,
            tab_settle: Duration::ZERO,
            tab_timeout: Duration::from_millis(100),
            navigation_timeout: Duration::from_secs(5),
        }
    }
}

/// Detail page settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetailSettings {
    /// Visible text of the tab that reveals the specification table.
    pub tab_label: String,
    /// Elements considered when searching for the tab.
    pub tab_selector: String,
    /// Tokens identifying the ingredient row, matched case-insensitively.
    pub ingredient_markers: Vec<String>,
}

impl Default for DetailSettings {
    fn default() -> Self {
        Self {
            tab_label: DEFAULT_TAB_LABEL.to_string(),
            tab_selector: DEFAULT_TAB_SELECTOR.to_string(),
            ingredient_markers: DEFAULT_INGREDIENT_MARKERS
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

/// Immutable configuration for one ingestion run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub listing_url: Url,
    pub page_param: String,
    pub max_pages: u32,
    /// Catalog-wide category stamped on every record.
    pub category: String,
    /// Category identifier read from the listing URL, used for link synthesis.
    pub category_id: Option<String>,
    pub source_name: String,
    /// Template with `{goods_no}` and `{category_id}` placeholders.
    pub detail_url_template: Option<String>,
    pub detail: DetailSettings,
    pub timing: Timing,
    pub output: OutputMode,
    pub selectors: SelectorRegistry,
    pub browser: BrowserSettings,
}

impl RunConfig {
    /// Build a config with defaults for everything but the listing URL and output.
    pub fn new(listing_url: Url, output: OutputMode) -> Self {
        let category_id = query_value(&listing_url, DEFAULT_CATEGORY_PARAM);
        let source_name = listing_url.host_str().unwrap_or("catalog").to_string();
        Self {
            listing_url,
            page_param: DEFAULT_PAGE_PARAM.to_string(),
            max_pages: DEFAULT_MAX_PAGES,
            category: DEFAULT_CATEGORY.to_string(),
            category_id,
            source_name,
            detail_url_template: None,
            detail: DetailSettings::default(),
            timing: Timing::default(),
            output,
            selectors: SelectorRegistry::default(),
            browser: BrowserSettings::default(),
        }
    }

    /// Resolve the full configuration from arguments, environment, and config file.
    ///
    /// Every fatal condition (missing listing URL, missing store settings in
    /// write mode, invalid selectors) is reported here, before any browser work.
    pub fn resolve(args: &RunArgs, env: &impl EnvSource) -> Result<Self, ConfigError> {
        let file = match &args.config_file {
            Some(path) => FileConfig::load(path)?,
            None => FileConfig::default(),
        };

        let output = if args.write {
            let store = StoreSettings::from_env(env).ok_or(ConfigError::MissingStore)?;
            store.endpoint()?;
            OutputMode::Write { store }
        } else {
            let output_dir = args
                .output_dir
                .clone()
                .or_else(|| env_value(env, "CATALOG_OUTPUT_DIR").map(PathBuf::from))
                .or_else(|| file.output_dir.clone())
                .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR));
            OutputMode::Preview { output_dir }
        };

        let listing_url = resolve_listing_url(args.target.as_deref(), env, &file)?;

        let category_param = env_value(env, "CATALOG_CATEGORY_PARAM")
            .or(file.category_param)
            .unwrap_or_else(|| DEFAULT_CATEGORY_PARAM.to_string());
        let category_id = query_value(&listing_url, &category_param);

        let source_name = env_value(env, "CATALOG_SOURCE_NAME")
            .or(file.source_name)
            .or_else(|| listing_url.host_str().map(str::to_string))
            .unwrap_or_else(|| "catalog".to_string());

        let max_pages = match args.pages {
            Some(pages) => pages,
            None => env_number(env, "CATALOG_MAX_PAGES")?
                .or(file.max_pages)
                .unwrap_or(DEFAULT_MAX_PAGES),
        };

        let ms = |key: &str, from_file: Option<u64>, default: u64| -> Result<Duration, ConfigError> {
            Ok(Duration::from_millis(
                env_number(env, key)?.or(from_file).unwrap_or(default),
            ))
        };
        let timing = Timing {
            listing_settle: ms("CATALOG_LISTING_WAIT_MS", file.listing_wait_ms, DEFAULT_LISTING_WAIT_MS)?,
            detail_settle: ms("CATALOG_DETAIL_WAIT_MS", file.detail_wait_ms, DEFAULT_DETAIL_WAIT_MS)?,
            tab_settle: ms("CATALOG_TAB_WAIT_MS", file.tab_wait_ms, DEFAULT_TAB_WAIT_MS)?,
            tab_timeout: ms("CATALOG_TAB_TIMEOUT_MS", file.tab_timeout_ms, DEFAULT_TAB_TIMEOUT_MS)?,
            navigation_timeout: ms(
                "CATALOG_NAV_TIMEOUT_MS",
                file.navigation_timeout_ms,
                DEFAULT_NAV_TIMEOUT_MS,
            )?,
        };

        let defaults = DetailSettings::default();
        let ingredient_markers = env_value(env, "CATALOG_INGREDIENT_MARKERS")
            .map(|raw| {
                raw.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect::<Vec<_>>()
            })
            .or(file.ingredient_markers)
            .filter(|markers| !markers.is_empty())
            .unwrap_or(defaults.ingredient_markers);
        let detail = DetailSettings {
            tab_label: env_value(env, "CATALOG_DETAIL_TAB_LABEL")
                .or(file.detail_tab_label)
                .unwrap_or(defaults.tab_label),
            tab_selector: env_value(env, "CATALOG_DETAIL_TAB_SELECTOR")
                .or(file.detail_tab_selector)
                .unwrap_or(defaults.tab_selector),
            ingredient_markers,
        };

        let selectors = SelectorRegistry::resolve(&file.selectors, env);
        selectors.validate()?;

        Ok(Self {
            listing_url,
            page_param: env_value(env, "CATALOG_PAGE_PARAM")
                .or(file.page_param)
                .unwrap_or_else(|| DEFAULT_PAGE_PARAM.to_string()),
            max_pages,
            category: env_value(env, "CATALOG_CATEGORY")
                .or(file.category)
                .unwrap_or_else(|| DEFAULT_CATEGORY.to_string()),
            category_id,
            source_name,
            detail_url_template: env_value(env, "CATALOG_DETAIL_URL_TEMPLATE")
                .or(file.detail_url_template),
            detail,
            timing,
            output,
            selectors,
            browser: file.browser.with_env_overrides(env),
        })
    }
}

/// Work out the first listing page URL from the invocation target.
///
/// A target that looks like a URL is used as-is; anything else is treated as a
/// category id and substituted into the listing URL template.
fn resolve_listing_url(
    target: Option<&str>,
    env: &impl EnvSource,
    file: &FileConfig,
) -> Result<Url, ConfigError> {
    let target = target.map(str::trim).filter(|t| !t.is_empty());
    let raw = match target {
        Some(t) if t.starts_with("http://") || t.starts_with("https://") => t.to_string(),
        Some(category_id) => {
            let template = env_value(env, "CATALOG_LISTING_URL_TEMPLATE")
                .or_else(|| file.listing_url_template.clone())
                .ok_or(ConfigError::MissingListingUrl)?;
            template.replace("{category_id}", category_id)
        }
        None => env_value(env, "CATALOG_LISTING_URL")
            .or_else(|| file.listing_url.clone())
            .ok_or(ConfigError::MissingListingUrl)?,
    };
    Url::parse(&raw).map_err(|source| ConfigError::InvalidUrl { url: raw, source })
}

/// First value of a query parameter, if present and non-empty.
pub fn query_value(url: &Url, param: &str) -> Option<String> {
    url.query_pairs()
        .find(|(k, _)| k == param)
        .map(|(_, v)| v.into_owned())
        .filter(|v| !v.is_empty())
}
