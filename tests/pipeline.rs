//! End-to-end runs of the ingestion pipeline against in-memory pages.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use url::Url;

use catalog_ingest::browser::{BrowserSettings, DriverError, DriverLauncher, DriverPair, PageDriver};
use catalog_ingest::config::{OutputMode, RunArgs, RunConfig, Timing};
use catalog_ingest::error::{EXIT_CONFIG, EXIT_PERSIST_FAILED, EXIT_SCRAPE_FAILED};
use catalog_ingest::models::{CanonicalRecord, DetailInfo, EnrichedItem, ListingItem};
use catalog_ingest::pipeline::{ingest, run, DetailEnricher, StopReason};
use catalog_ingest::sink::{CatalogStore, Sink, SinkOutcome, StoreError};
use catalog_ingest::PipelineError;

const LISTING: &str = "https://shop.example.com/list?dispCatNo=100";

/// How the fake page reacts to a tab click.
#[derive(Clone, Copy, Default)]
enum TabClick {
    #[default]
    Clicked,
    Fails,
    Hangs,
}

/// Serves canned HTML by URL and records what it was asked to do.
#[derive(Clone, Default)]
struct FakeDriver {
    pages: Arc<HashMap<String, String>>,
    visited: Arc<Mutex<Vec<String>>>,
    clicks: Arc<AtomicUsize>,
    current: Option<String>,
    tab: TabClick,
}

impl FakeDriver {
    fn new(pages: HashMap<String, String>) -> Self {
        Self {
            pages: Arc::new(pages),
            ..Default::default()
        }
    }

    fn with_tab(mut self, tab: TabClick) -> Self {
        self.tab = tab;
        self
    }

    fn visited(&self) -> Vec<String> {
        self.visited.lock().unwrap().clone()
    }
}

#[async_trait]
impl PageDriver for FakeDriver {
    async fn navigate(&mut self, url: &str, _timeout: Duration) -> Result<(), DriverError> {
        self.visited.lock().unwrap().push(url.to_string());
        if self.pages.contains_key(url) {
            self.current = Some(url.to_string());
            Ok(())
        } else {
            self.current = None;
            Err(DriverError::Navigation {
                url: url.to_string(),
                reason: "net::ERR_NAME_NOT_RESOLVED".to_string(),
            })
        }
    }

    async fn content(&mut self) -> Result<String, DriverError> {
        self.current
            .as_ref()
            .and_then(|url| self.pages.get(url).cloned())
            .ok_or_else(|| DriverError::Script("no document".to_string()))
    }

    async fn click_text(&mut self, _selector: &str, _label: &str) -> Result<bool, DriverError> {
        self.clicks.fetch_add(1, Ordering::SeqCst);
        match self.tab {
            TabClick::Clicked => Ok(true),
            TabClick::Fails => Err(DriverError::Script("element detached".to_string())),
            TabClick::Hangs => {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(true)
            }
        }
    }
}

struct FakeLauncher {
    listing: FakeDriver,
    detail: FakeDriver,
    launches: AtomicUsize,
}

impl FakeLauncher {
    fn new(listing: FakeDriver, detail: FakeDriver) -> Self {
        Self {
            listing,
            detail,
            launches: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl DriverLauncher for FakeLauncher {
    type Driver = FakeDriver;

    async fn launch(&self, _settings: &BrowserSettings) -> Result<DriverPair<FakeDriver>, DriverError> {
        self.launches.fetch_add(1, Ordering::SeqCst);
        Ok(DriverPair {
            listing: self.listing.clone(),
            detail: self.detail.clone(),
        })
    }
}

/// Records inserted batches, or fails every insert.
#[derive(Clone, Default)]
struct FakeStore {
    batches: Arc<Mutex<Vec<Vec<CanonicalRecord>>>>,
    fail: bool,
}

#[async_trait]
impl CatalogStore for FakeStore {
    async fn insert_batch(&self, records: &[CanonicalRecord]) -> Result<usize, StoreError> {
        if self.fail {
            return Err(StoreError::Status {
                status: 503,
                body: "unavailable".to_string(),
            });
        }
        self.batches.lock().unwrap().push(records.to_vec());
        Ok(records.len())
    }
}

fn page(n: u32) -> String {
    format!("{}&pageIdx={}", LISTING, n)
}

fn detail_url(id: &str) -> String {
    format!("https://shop.example.com/goods/{}", id)
}

/// A listing page with `count` cards whose ids start at `first`.
fn listing_html(first: usize, count: usize) -> String {
    let cards: String = (first..first + count)
        .map(|i| {
            format!(
                r#"<li>
                  <div class="prd_info">
                    <a class="prd_thumb" href="/goods/{i}"><img data-original="/img/{i}.jpg"></a>
                    <span class="tx_brand">브랜드{i}</span>
                    <p class="tx_name">수분 크림 {i}</p>
                    <span class="tx_cur"><span class="tx_num">1{i},000</span>원</span>
                  </div>
                </li>"#
            )
        })
        .collect();
    format!(r#"<html><body><ul class="cate_prd_list">{cards}</ul></body></html>"#)
}

fn detail_html() -> String {
    r#"<div id="artcInfo"><table>
         <tr><th>용량</th><td>50ml</td></tr>
         <tr><th>전성분</th><td>정제수, 글리세린·판테놀</td></tr>
       </table></div>"#
        .to_string()
}

fn details(ids: impl IntoIterator<Item = usize>) -> HashMap<String, String> {
    ids.into_iter()
        .map(|i| (detail_url(&i.to_string()), detail_html()))
        .collect()
}

fn preview_config(dir: &std::path::Path) -> RunConfig {
    let mut config = RunConfig::new(
        Url::parse(LISTING).unwrap(),
        OutputMode::Preview {
            output_dir: dir.to_path_buf(),
        },
    );
    config.timing = Timing::immediate();
    config
}

fn quiet_env(extra: &[(&str, &str)]) -> HashMap<String, String> {
    let mut env: HashMap<String, String> = [
        ("CATALOG_LISTING_WAIT_MS", "0"),
        ("CATALOG_DETAIL_WAIT_MS", "0"),
        ("CATALOG_TAB_WAIT_MS", "0"),
        ("CATALOG_TAB_TIMEOUT_MS", "50"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();
    env.extend(extra.iter().map(|(k, v)| (k.to_string(), v.to_string())));
    env
}

#[tokio::test]
async fn two_page_catalog_end_to_end() {
    let tmp = tempfile::tempdir().unwrap();
    let config = preview_config(tmp.path());

    let mut listing = FakeDriver::new(HashMap::from([
        (page(1), listing_html(0, 10)),
        (page(2), listing_html(10, 0)),
    ]));
    let mut detail = FakeDriver::new(details(0..10));
    let sink = Sink::from_output(&config.output).unwrap();

    let summary = run(&config, &mut listing, &mut detail, &sink).await.unwrap();

    assert_eq!(summary.pages_visited, 2);
    assert_eq!(summary.stop, StopReason::EmptyPage { page: 2 });
    assert_eq!(summary.items, 10);
    assert_eq!(listing.visited(), vec![page(1), page(2)]);
    assert_eq!(detail.visited().len(), 10);
    assert_eq!(detail.clicks.load(Ordering::SeqCst), 10);

    let SinkOutcome::Snapshot { path, count } = summary.outcome else {
        panic!("expected a snapshot");
    };
    assert_eq!(count, 10);
    let written: Vec<EnrichedItem> =
        serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
    assert_eq!(written[3].item.name, "수분 크림 3");
    assert_eq!(written[3].item.brand.as_deref(), Some("브랜드3"));
    assert_eq!(
        written[3].item.link.as_deref(),
        Some("https://shop.example.com/goods/3")
    );
    assert_eq!(written[3].price_value, Some(13000));
    assert_eq!(written[3].detail.ingredients, vec!["정제수", "글리세린", "판테놀"]);
}

#[tokio::test]
async fn stops_at_max_pages() {
    let tmp = tempfile::tempdir().unwrap();
    let mut config = preview_config(tmp.path());
    config.max_pages = 2;

    let mut listing = FakeDriver::new(HashMap::from([
        (page(1), listing_html(0, 2)),
        (page(2), listing_html(2, 2)),
        (page(3), listing_html(4, 2)),
    ]));
    let mut detail = FakeDriver::new(details(0..6));
    let sink = Sink::from_output(&config.output).unwrap();

    let summary = run(&config, &mut listing, &mut detail, &sink).await.unwrap();
    assert_eq!(summary.stop, StopReason::MaxPages);
    assert_eq!(summary.items, 4);
    assert_eq!(listing.visited(), vec![page(1), page(2)]);
}

#[tokio::test]
async fn page_fault_keeps_partial_results() {
    let tmp = tempfile::tempdir().unwrap();
    let config = preview_config(tmp.path());

    // Page 2 is not served, so navigation to it fails.
    let mut listing = FakeDriver::new(HashMap::from([(page(1), listing_html(0, 3))]));
    let mut detail = FakeDriver::new(details(0..3));
    let sink = Sink::from_output(&config.output).unwrap();

    let summary = run(&config, &mut listing, &mut detail, &sink).await.unwrap();
    assert_eq!(summary.stop, StopReason::Fault { page: 2 });
    assert_eq!(summary.items, 3);
}

#[tokio::test]
async fn empty_catalog_fails_without_persisting() {
    let tmp = tempfile::tempdir().unwrap();
    let out = tmp.path().join("out");
    let config = preview_config(&out);

    let mut listing = FakeDriver::new(HashMap::from([(page(1), listing_html(0, 0))]));
    let mut detail = FakeDriver::default();
    let sink = Sink::from_output(&config.output).unwrap();

    let err = run(&config, &mut listing, &mut detail, &sink)
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::NoItems { pages_visited: 1 }));
    assert_eq!(err.code(), EXIT_SCRAPE_FAILED);
    assert!(detail.visited().is_empty());
    assert!(!out.exists());
}

#[tokio::test]
async fn detail_failures_yield_empty_detail() {
    let tmp = tempfile::tempdir().unwrap();
    let config = preview_config(tmp.path());

    let mut listing = FakeDriver::new(HashMap::from([
        (page(1), listing_html(0, 3)),
        (page(2), listing_html(0, 0)),
    ]));
    // Only item 1 has a reachable detail page.
    let mut detail = FakeDriver::new(details([1]));
    let sink = Sink::from_output(&config.output).unwrap();

    let summary = run(&config, &mut listing, &mut detail, &sink).await.unwrap();
    let SinkOutcome::Snapshot { path, .. } = summary.outcome else {
        panic!("expected a snapshot");
    };
    let written: Vec<EnrichedItem> =
        serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();

    assert_eq!(written.len(), 3);
    assert!(written[0].detail.is_empty());
    assert!(!written[1].detail.is_empty());
    assert!(written[2].detail.is_empty());
}

async fn enrich_with_tab(tab: TabClick) -> (DetailInfo, FakeDriver) {
    let config = preview_config(std::path::Path::new("unused"));
    let enricher = DetailEnricher::new(&config).unwrap();
    let mut driver = FakeDriver::new(details([7])).with_tab(tab);
    let mut item = ListingItem::named("시카 크림");
    item.link = Some(detail_url("7"));

    let detail = enricher.enrich(&mut driver, &item).await;
    (detail, driver)
}

#[tokio::test]
async fn failed_tab_click_still_reads_table() {
    let (detail, driver) = enrich_with_tab(TabClick::Fails).await;
    assert_eq!(driver.clicks.load(Ordering::SeqCst), 1);
    assert_eq!(detail.fields.as_ref().unwrap()["용량"], "50ml");
    assert_eq!(detail.ingredients, vec!["정제수", "글리세린", "판테놀"]);
}

#[tokio::test]
async fn hung_tab_click_times_out_and_reads_table() {
    let started = std::time::Instant::now();
    let (detail, driver) = enrich_with_tab(TabClick::Hangs).await;
    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(driver.clicks.load(Ordering::SeqCst), 1);
    assert_eq!(detail.ingredients, vec!["정제수", "글리세린", "판테놀"]);
}

#[tokio::test]
async fn items_without_link_skip_detail_navigation() {
    let tmp = tempfile::tempdir().unwrap();
    let config = preview_config(tmp.path());

    let html = r#"<ul class="cate_prd_list">
        <li><div class="prd_info"><p class="tx_name">링크 없는 상품</p></div></li>
      </ul>"#;
    let mut listing = FakeDriver::new(HashMap::from([
        (page(1), html.to_string()),
        (page(2), String::new()),
    ]));
    let mut detail = FakeDriver::default();
    let sink = Sink::from_output(&config.output).unwrap();

    let summary = run(&config, &mut listing, &mut detail, &sink).await.unwrap();
    assert_eq!(summary.items, 1);
    assert!(detail.visited().is_empty());
}

#[tokio::test]
async fn write_mode_inserts_normalized_batch_once() {
    let config = {
        let mut config = preview_config(std::path::Path::new("unused"));
        config.category = "skincare".to_string();
        config
    };
    let store = FakeStore::default();
    let sink = Sink::Write {
        store: Box::new(store.clone()),
    };

    let mut listing = FakeDriver::new(HashMap::from([
        (page(1), listing_html(0, 2)),
        (page(2), listing_html(0, 0)),
    ]));
    let mut detail = FakeDriver::new(details(0..2));

    let summary = run(&config, &mut listing, &mut detail, &sink).await.unwrap();
    assert_eq!(summary.outcome, SinkOutcome::Inserted { count: 2 });

    let batches = store.batches.lock().unwrap();
    assert_eq!(batches.len(), 1);
    let record = &batches[0][0];
    assert_eq!(record.name, "수분 크림 0");
    assert_eq!(record.brand.as_deref(), Some("브랜드0"));
    assert_eq!(record.category, "skincare");
    assert_eq!(record.effect_tags, vec!["hydration"]);
    assert_eq!(record.key_ingredients, vec!["정제수", "글리세린", "판테놀"]);
    assert_eq!(
        record.note,
        "shop.example.com | price: 10,000 | link: https://shop.example.com/goods/0"
    );
}

#[tokio::test]
async fn store_failure_exits_with_persist_code() {
    let config = preview_config(std::path::Path::new("unused"));
    let sink = Sink::Write {
        store: Box::new(FakeStore {
            fail: true,
            ..Default::default()
        }),
    };

    let mut listing = FakeDriver::new(HashMap::from([
        (page(1), listing_html(0, 1)),
        (page(2), listing_html(0, 0)),
    ]));
    let mut detail = FakeDriver::new(details(0..1));

    let err = run(&config, &mut listing, &mut detail, &sink)
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::Persist(_)));
    assert_eq!(err.code(), EXIT_PERSIST_FAILED);
}

#[tokio::test]
async fn write_without_store_never_launches_browser() {
    let launcher = FakeLauncher::new(FakeDriver::default(), FakeDriver::default());
    let args = RunArgs {
        target: Some(LISTING.to_string()),
        write: true,
        ..Default::default()
    };

    let err = ingest(&args, &quiet_env(&[]), &launcher).await.unwrap_err();
    assert_eq!(err.code(), EXIT_CONFIG);
    assert_eq!(launcher.launches.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn malformed_store_url_fails_before_launch() {
    let launcher = FakeLauncher::new(FakeDriver::default(), FakeDriver::default());
    let args = RunArgs {
        target: Some(LISTING.to_string()),
        write: true,
        ..Default::default()
    };
    let env = quiet_env(&[
        ("CATALOG_STORE_URL", "db.example.com"),
        ("CATALOG_STORE_KEY", "secret"),
    ]);

    let err = ingest(&args, &env, &launcher).await.unwrap_err();
    assert!(matches!(err, PipelineError::Config(_)));
    assert_eq!(err.code(), EXIT_CONFIG);
    assert_eq!(launcher.launches.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn missing_listing_url_is_a_config_error() {
    let launcher = FakeLauncher::new(FakeDriver::default(), FakeDriver::default());
    let err = ingest(&RunArgs::default(), &quiet_env(&[]), &launcher)
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::Config(_)));
    assert_eq!(launcher.launches.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn ingest_by_category_id_writes_preview() {
    let tmp = tempfile::tempdir().unwrap();
    let listing = FakeDriver::new(HashMap::from([
        (page(1), listing_html(0, 1)),
        (page(2), listing_html(0, 0)),
    ]));
    let detail = FakeDriver::new(details(0..1));
    let launcher = FakeLauncher::new(listing.clone(), detail);

    let env = quiet_env(&[(
        "CATALOG_LISTING_URL_TEMPLATE",
        "https://shop.example.com/list?dispCatNo={category_id}",
    )]);
    let args = RunArgs {
        target: Some("100".to_string()),
        pages: Some(3),
        output_dir: Some(tmp.path().to_path_buf()),
        ..Default::default()
    };

    let summary = ingest(&args, &env, &launcher).await.unwrap();
    assert_eq!(launcher.launches.load(Ordering::SeqCst), 1);
    assert_eq!(summary.items, 1);
    assert_eq!(listing.visited(), vec![page(1), page(2)]);
    assert!(matches!(summary.outcome, SinkOutcome::Snapshot { .. }));
}
