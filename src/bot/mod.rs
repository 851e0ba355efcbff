//! Chat-facing adapters: inbound watch creation and outbound delivery.

pub mod outbound;
pub mod parser;

use std::sync::Arc;

use anyhow::Context;
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::bot::outbound::{ChatOutbound, render_clarify, render_no_match};
use crate::bot::parser::{WatchDraft, WatchParser};
use crate::error::ErrorReporter;
use crate::evaluator::{EvalOutcome, Evaluator, Trigger};
use crate::scheduler::JobRegistry;
use crate::store::model::{Asin, Watch, WatchMode};
use crate::store::repository::WatchStore;
use crate::time::now_ms;

/// Inbound watch-creation event from the chat transport.
#[derive(Clone, Debug)]
pub struct WatchRequest {
    pub user_id: i64,
    pub raw_text: String,
    /// Pre-parsed fields from UI buttons; bypasses the text parser.
    pub prefilled: Option<WatchDraft>,
    pub mode: Option<WatchMode>,
}

/// Handles the watch lifecycle driven by chat events: parse, persist,
/// schedule, and answer with the first evaluation's result.
pub struct WatchService {
    store: Arc<dyn WatchStore>,
    parser: WatchParser,
    registry: Arc<JobRegistry>,
    evaluator: Arc<Evaluator>,
    outbound: Arc<dyn ChatOutbound>,
    reporter: ErrorReporter,
}

impl WatchService {
    pub fn new(
        store: Arc<dyn WatchStore>,
        registry: Arc<JobRegistry>,
        evaluator: Arc<Evaluator>,
        outbound: Arc<dyn ChatOutbound>,
        reporter: ErrorReporter,
    ) -> Self {
        Self {
            store,
            parser: WatchParser::new(),
            registry,
            evaluator,
            outbound,
            reporter,
        }
    }

    /// Drain the inbound event stream; each request is handled on its own
    /// task so one slow evaluation cannot block the queue.
    pub async fn run(self: Arc<Self>, mut rx: mpsc::Receiver<WatchRequest>) {
        info!("watch service started");
        while let Some(req) = rx.recv().await {
            let svc = Arc::clone(&self);
            tokio::spawn(async move {
                if let Err(e) = svc.handle_request(req).await {
                    tracing::error!(error = ?e, "watch request failed");
                    svc.reporter.notify("watch_service", &e);
                }
            });
        }
        warn!("inbound channel closed; watch service stopped");
    }

    #[instrument(skip(self, req), target = "bot", fields(user_id = req.user_id))]
    pub async fn handle_request(&self, req: WatchRequest) -> anyhow::Result<()> {
        let draft = match req.prefilled {
            Some(draft) => draft,
            None => match self.parser.parse(&req.raw_text) {
                Ok(draft) => draft,
                Err(e) => {
                    // no watch is created from unusable text
                    debug!(error = %e, "watch text did not parse");
                    self.outbound
                        .send_notice(req.user_id, render_clarify())
                        .await?;
                    return Ok(());
                }
            },
        };

        let now = now_ms();
        self.store.ensure_user(req.user_id, now).await?;

        let watch = Watch {
            watch_id: Uuid::new_v4(),
            user_id: req.user_id,
            keywords: draft.keywords,
            brand: draft.brand,
            max_price: draft.max_price,
            min_discount: draft.min_discount,
            asin: draft.asin,
            mode: req.mode.unwrap_or(WatchMode::Daily),
            created_ms: now,
        };
        self.store.insert_watch(&watch).await?;
        self.registry.register(&watch);
        info!(watch_id = %watch.watch_id, mode = watch.mode.as_str(), "watch created");

        // First evaluation answers the user right away.
        match self
            .evaluator
            .evaluate_bounded(&watch, Trigger::Creation)
            .await?
        {
            Some(EvalOutcome::Card(card)) => {
                self.outbound
                    .send_carousel(watch.user_id, vec![card])
                    .await?;
            }
            Some(EvalOutcome::NoMatch(stage)) => {
                self.outbound
                    .send_notice(watch.user_id, render_no_match(&stage))
                    .await?;
            }
            Some(EvalOutcome::PriceUnavailable) => {
                self.outbound
                    .send_notice(
                        watch.user_id,
                        "No live price for that right now. The watch is saved and will \
                         report as soon as one shows up."
                            .to_string(),
                    )
                    .await?;
            }
            None => {
                self.outbound
                    .send_notice(
                        watch.user_id,
                        "That took too long to evaluate. The watch is saved and will run \
                         on its schedule."
                            .to_string(),
                    )
                    .await?;
            }
        }

        Ok(())
    }

    /// Move a watch between scheduler families. The store is updated first;
    /// the registry swap itself is atomic.
    pub async fn change_mode(&self, watch_id: &Uuid, mode: WatchMode) -> anyhow::Result<()> {
        self.store.set_watch_mode(watch_id, mode).await?;
        let watch = self
            .store
            .fetch_watch(watch_id)
            .await?
            .context("watch vanished during mode change")?;
        self.registry.register(&watch);
        info!(watch_id = %watch_id, mode = mode.as_str(), "watch mode changed");
        Ok(())
    }

    /// Card callback: the user followed an outbound link.
    pub async fn handle_click(&self, watch_id: &Uuid, asin: &Asin) -> anyhow::Result<()> {
        self.store
            .record_click(watch_id, asin.as_str(), now_ms())
            .await
    }
}
