use std::sync::Arc;

use tokio::sync::mpsc;

use mandimonitor::{
    admin::AdminReader,
    bot::{WatchRequest, WatchService, outbound::TracingOutbound},
    config::AppConfig,
    db::Db,
    enrich::EnrichmentService,
    error::ErrorReporter,
    evaluator::Evaluator,
    governor::RateGovernor,
    logger::init_tracing,
    matcher::GamingMonitorMatcher,
    metrics::counters::Counters,
    oracle::PriceOracle,
    paapi::client::PaapiClient,
    scheduler::{JobRegistry, SchedulerContext, digest::DigestCollector},
    scrape::PageScraper,
    search::SearchPipeline,
    selector::Selector,
    store::repository::WatchStore,
    store::repository_sqlx::SqlxStore,
};

/// Connects the database, runs migrations and returns the shared store.
async fn init_store(cfg: &AppConfig) -> anyhow::Result<Arc<SqlxStore>> {
    let db = Db::connect(&cfg.database_url).await?;
    db.migrate().await?;
    Ok(Arc::new(SqlxStore::new(db.pool.as_ref().clone())))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    sqlx::any::install_default_drivers();

    let is_production = std::env::var("APP_ENV").unwrap_or_default() == "production";
    init_tracing(is_production);

    tracing::info!("Starting MandiMonitor core...");

    let cfg = AppConfig::from_env()?;
    let counters = Counters::default();
    let reporter = ErrorReporter::new(cfg.error_reporter_dsn.clone());

    let store = init_store(&cfg).await?;

    let admin = AdminReader::new(store.clone());
    match admin.metrics().await {
        Ok(m) => tracing::info!(
            users = m.users,
            watches = m.live_watches,
            clicks = m.clicks,
            "store metrics at startup"
        ),
        Err(e) => tracing::warn!(error = %e, "startup metrics unavailable"),
    }

    // Price acquisition stack: governor -> API client -> scrape fallback.
    let governor = Arc::new(RateGovernor::new());
    let paapi = Arc::new(PaapiClient::new(
        Arc::clone(&governor),
        counters.clone(),
        &cfg,
    )?);
    let scraper = Arc::new(PageScraper::new(&cfg.marketplace_host)?);

    let oracle = Arc::new(PriceOracle::new(
        store.clone(),
        paapi.clone(),
        scraper,
        counters.clone(),
    ));
    let search = Arc::new(SearchPipeline::new(paapi.clone(), counters.clone()));
    let enrich = EnrichmentService::new(paapi);
    let selector = Selector::new(Arc::new(GamingMonitorMatcher::new()));

    let evaluator = Arc::new(Evaluator::new(
        search,
        enrich,
        selector,
        oracle,
        store.clone(),
        counters.clone(),
        cfg.marketplace_host.clone(),
        cfg.affiliate_tag.clone(),
        cfg.job_budget,
        cfg.worker_pool,
    ));

    // Delivery: the chat transport plugs in behind ChatOutbound; the
    // stand-in logs carousels and notices.
    let outbound = Arc::new(TracingOutbound);
    let digests = Arc::new(DigestCollector::new(
        outbound.clone(),
        mandimonitor::scheduler::digest::DEFAULT_FLUSH_GRACE,
    ));

    let registry = Arc::new(JobRegistry::new(Arc::new(SchedulerContext {
        evaluator: evaluator.clone(),
        watches: store.clone(),
        outbound: outbound.clone(),
        digests,
        reporter: reporter.clone(),
        counters: counters.clone(),
        tz: cfg.timezone,
        daily_fire: cfg.daily_fire,
        wake_start: cfg.wake_start,
        wake_end: cfg.wake_end,
        realtime_every: cfg.realtime_every,
    })));

    // Rebuild jobs for persisted watches; fires missed while the process
    // was down are not replayed.
    let watches = store.list_watches().await?;
    registry.register_all(&watches);

    // Inbound watch-creation events; the chat transport feeds this channel.
    let (inbound_tx, inbound_rx) = mpsc::channel::<WatchRequest>(256);
    let service = Arc::new(WatchService::new(
        store,
        registry,
        evaluator,
        outbound,
        reporter,
    ));
    tokio::spawn(Arc::clone(&service).run(inbound_rx));

    // Keep the sender alive for the transport adapter.
    let _inbound = inbound_tx;

    tracing::info!(
        watches = watches.len(),
        tz = %cfg.timezone,
        "core started; waiting for shutdown signal"
    );

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received");

    Ok(())
}
