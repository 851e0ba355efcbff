use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveTime;
use parking_lot::Mutex;
use sqlx::any::AnyPoolOptions;
use uuid::Uuid;

use mandimonitor::bot::outbound::{ChatOutbound, DealCard};
use mandimonitor::db::schema;
use mandimonitor::enrich::EnrichmentService;
use mandimonitor::error::ErrorReporter;
use mandimonitor::evaluator::Evaluator;
use mandimonitor::matcher::GamingMonitorMatcher;
use mandimonitor::metrics::counters::Counters;
use mandimonitor::money::Paise;
use mandimonitor::oracle::PriceOracle;
use mandimonitor::paapi::ProductSource;
use mandimonitor::paapi::errors::PaapiError;
use mandimonitor::paapi::types::{ItemDetail, ResourceBundle, SearchRequest};
use mandimonitor::scheduler::digest::DigestCollector;
use mandimonitor::scheduler::{JobId, JobRegistry, JobState, SchedulerContext};
use mandimonitor::scrape::{PriceScraper, ScrapeError};
use mandimonitor::search::SearchPipeline;
use mandimonitor::selector::Selector;
use mandimonitor::store::model::{Asin, Watch, WatchMode};
use mandimonitor::store::repository_sqlx::SqlxStore;
use mandimonitor::time::now_ms;

// -----------------------
// Mocks + helpers
// -----------------------

struct MockSource {
    items: Mutex<HashMap<String, ItemDetail>>,
    search_calls: AtomicU64,
}

impl MockSource {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            items: Mutex::new(HashMap::new()),
            search_calls: AtomicU64::new(0),
        })
    }

    fn search_calls(&self) -> u64 {
        self.search_calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl ProductSource for MockSource {
    async fn get_item(
        &self,
        asin: &Asin,
        _bundle: ResourceBundle,
    ) -> Result<ItemDetail, PaapiError> {
        self.items
            .lock()
            .get(asin.as_str())
            .cloned()
            .ok_or_else(|| PaapiError::ItemNotAccessible(asin.to_string()))
    }

    async fn search(&self, _req: &SearchRequest) -> Result<Vec<ItemDetail>, PaapiError> {
        self.search_calls.fetch_add(1, Ordering::Relaxed);
        Ok(Vec::new())
    }
}

struct NoScraper;

#[async_trait]
impl PriceScraper for NoScraper {
    async fn scrape_price(&self, asin: &Asin) -> Result<Paise, ScrapeError> {
        Err(ScrapeError::PriceNotFound(asin.to_string()))
    }
}

struct RecordingOutbound {
    carousels: Mutex<Vec<(i64, Vec<DealCard>)>>,
}

#[async_trait]
impl ChatOutbound for RecordingOutbound {
    async fn send_carousel(&self, user_id: i64, cards: Vec<DealCard>) -> anyhow::Result<()> {
        self.carousels.lock().push((user_id, cards));
        Ok(())
    }

    async fn send_notice(&self, _user_id: i64, _text: String) -> anyhow::Result<()> {
        Ok(())
    }
}

struct Harness {
    registry: JobRegistry,
    source: Arc<MockSource>,
    counters: Counters,
}

/// Full scheduler context on in-memory sqlite and mock remote tiers.
/// `wake` controls the real-time window; `(start, start)` is an always-quiet
/// window, useful to prove ticks are skipped.
async fn setup(wake: (NaiveTime, NaiveTime)) -> Harness {
    sqlx::any::install_default_drivers();

    let conn = format!("sqlite:file:{}?mode=memory&cache=shared", Uuid::new_v4());
    let pool = AnyPoolOptions::new()
        .max_connections(5)
        .connect(&conn)
        .await
        .expect("connect sqlite memory db");
    schema::migrate(&pool).await.expect("migrate");
    let store = Arc::new(SqlxStore::new(pool));

    let source = MockSource::new();
    let counters = Counters::default();

    let search = Arc::new(SearchPipeline::new(source.clone(), counters.clone()));
    let oracle = Arc::new(PriceOracle::new(
        store.clone(),
        source.clone(),
        Arc::new(NoScraper),
        counters.clone(),
    ));
    let evaluator = Arc::new(Evaluator::new(
        search,
        EnrichmentService::new(source.clone()),
        Selector::new(Arc::new(GamingMonitorMatcher::new())),
        oracle,
        store.clone(),
        counters.clone(),
        "www.amazon.in".to_string(),
        "mandi-21".to_string(),
        Duration::from_secs(120),
        8,
    ));

    let outbound = Arc::new(RecordingOutbound {
        carousels: Mutex::new(Vec::new()),
    });
    let digests = Arc::new(DigestCollector::new(
        outbound.clone(),
        Duration::from_secs(600),
    ));

    let registry = JobRegistry::new(Arc::new(SchedulerContext {
        evaluator,
        watches: store,
        outbound,
        digests,
        reporter: ErrorReporter::disabled(),
        counters: counters.clone(),
        tz: chrono_tz::UTC,
        daily_fire: NaiveTime::from_hms_opt(9, 0, 0).expect("time"),
        wake_start: wake.0,
        wake_end: wake.1,
        realtime_every: Duration::from_secs(600),
    }));

    Harness {
        registry,
        source,
        counters,
    }
}

fn mk_watch(mode: WatchMode) -> Watch {
    Watch {
        watch_id: Uuid::new_v4(),
        user_id: 42,
        keywords: "gaming monitor".to_string(),
        brand: None,
        max_price: None,
        min_discount: None,
        asin: None,
        mode,
        created_ms: now_ms(),
    }
}

fn all_day() -> (NaiveTime, NaiveTime) {
    (
        NaiveTime::from_hms_opt(0, 0, 0).expect("time"),
        NaiveTime::from_hms_opt(23, 59, 59).expect("time"),
    )
}

fn never() -> (NaiveTime, NaiveTime) {
    let t = NaiveTime::from_hms_opt(0, 0, 0).expect("time");
    (t, t)
}

// -----------------------
// INTEGRATION TESTS
// -----------------------

#[tokio::test(start_paused = true)]
async fn registration_creates_the_job_for_the_watch_mode() {
    let harness = setup(all_day()).await;
    let watch = mk_watch(WatchMode::Daily);

    harness.registry.register(&watch);

    let daily = JobId::daily(&watch.watch_id);
    assert!(harness.registry.contains(&daily));
    assert!(!harness.registry.contains(&JobId::realtime(&watch.watch_id)));
    assert_eq!(harness.registry.job_state(&daily), Some(JobState::Scheduled));
    assert_eq!(harness.registry.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn mode_change_swaps_families_atomically() {
    let harness = setup(all_day()).await;
    let mut watch = mk_watch(WatchMode::Daily);

    harness.registry.register(&watch);
    assert!(harness.registry.contains(&JobId::daily(&watch.watch_id)));

    watch.mode = WatchMode::Realtime;
    harness.registry.register(&watch);

    assert!(!harness.registry.contains(&JobId::daily(&watch.watch_id)));
    assert!(harness.registry.contains(&JobId::realtime(&watch.watch_id)));
    assert_eq!(harness.registry.len(), 1, "exactly one job per watch");
}

#[tokio::test(start_paused = true)]
async fn deregistration_empties_the_registry() {
    let harness = setup(all_day()).await;
    let watch = mk_watch(WatchMode::Realtime);

    harness.registry.register(&watch);
    assert_eq!(harness.registry.len(), 1);

    harness.registry.deregister(&watch.watch_id);
    assert!(harness.registry.is_empty());
}

#[tokio::test(start_paused = true)]
async fn quiet_hours_skip_ticks_without_touching_the_vendor() {
    let harness = setup(never()).await;
    let watch = mk_watch(WatchMode::Realtime);
    harness.registry.register(&watch);

    tokio::time::advance(Duration::from_secs(601)).await;
    for _ in 0..50 {
        tokio::task::yield_now().await;
    }

    assert_eq!(
        harness.source.search_calls(),
        0,
        "quiet-hours tick must not evaluate"
    );
    assert!(Counters::read(&harness.counters.ticks_skipped_quiet) >= 1);
}

#[tokio::test(start_paused = true)]
async fn awake_ticks_run_the_evaluation() {
    let harness = setup(all_day()).await;
    let watch = mk_watch(WatchMode::Realtime);
    harness.registry.register(&watch);

    tokio::time::advance(Duration::from_secs(601)).await;
    for _ in 0..1000 {
        tokio::task::yield_now().await;
        if harness.source.search_calls() >= 1 {
            break;
        }
    }

    assert!(
        harness.source.search_calls() >= 1,
        "in-window tick must evaluate"
    );
    assert_eq!(Counters::read(&harness.counters.ticks_skipped_quiet), 0);
}

#[tokio::test(start_paused = true)]
async fn no_tick_fires_before_the_first_interval() {
    let harness = setup(all_day()).await;
    let watch = mk_watch(WatchMode::Realtime);
    harness.registry.register(&watch);

    tokio::time::advance(Duration::from_secs(300)).await;
    for _ in 0..50 {
        tokio::task::yield_now().await;
    }

    assert_eq!(harness.source.search_calls(), 0);
}
