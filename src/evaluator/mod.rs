//! One watch evaluation run.
//!
//! Flow: gather candidates (keyword search, or the pinned ASIN directly),
//! enrich missing prices, run the filter cascade, refresh the winner's price
//! through the oracle, and hand back a deliverable outcome. Delivery itself
//! belongs to the caller: the chat path answers the user, the realtime
//! family sends carousels, the daily family feeds the digest collector.
//!
//! Concurrency: runs for the same watch are strictly serialised via a
//! per-watch async lock; cross-watch parallelism is bounded by the worker
//! semaphore. The wall-clock budget is enforced in `evaluate_bounded`;
//! cancellation propagates through every await and no observation row is
//! written for a cancelled run.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use parking_lot::Mutex;
use tokio::sync::Semaphore;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::bot::outbound::{DealCard, build_card};
use crate::enrich::EnrichmentService;
use crate::logger::warn_if_slow;
use crate::metrics::counters::Counters;
use crate::money::discount_percent;
use crate::oracle::{PriceOracle, StalePolicy};
use crate::paapi::types::ItemDetail;
use crate::search::SearchPipeline;
use crate::selector::{FilterStage, Selection, Selector};
use crate::store::model::Watch;
use crate::store::repository::PriceStore;
use crate::time::now_ms;

/// What started an evaluation; decides stale-price tolerance.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Trigger {
    /// Interactive first run right after watch creation.
    Creation,
    Realtime,
    Daily,
}

impl Trigger {
    pub fn as_str(self) -> &'static str {
        match self {
            Trigger::Creation => "creation",
            Trigger::Realtime => "realtime",
            Trigger::Daily => "daily",
        }
    }

    /// Only the exploratory creation path tolerates a stale quote; ranked
    /// deliveries must not fabricate discounts from old prices.
    fn stale_policy(self) -> StalePolicy {
        match self {
            Trigger::Creation => StalePolicy::Accept,
            Trigger::Realtime | Trigger::Daily => StalePolicy::Reject,
        }
    }
}

#[derive(Clone, Debug)]
pub enum EvalOutcome {
    Card(DealCard),
    NoMatch(FilterStage),
    /// A candidate was selected but no price tier could serve it.
    PriceUnavailable,
}

pub struct Evaluator {
    search: Arc<SearchPipeline>,
    enrich: EnrichmentService,
    selector: Selector,
    oracle: Arc<PriceOracle>,
    prices: Arc<dyn PriceStore>,
    counters: Counters,
    marketplace_host: String,
    affiliate_tag: String,
    job_budget: Duration,
    pool: Semaphore,
    watch_locks: Mutex<HashMap<Uuid, Arc<tokio::sync::Mutex<()>>>>,
}

impl Evaluator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        search: Arc<SearchPipeline>,
        enrich: EnrichmentService,
        selector: Selector,
        oracle: Arc<PriceOracle>,
        prices: Arc<dyn PriceStore>,
        counters: Counters,
        marketplace_host: String,
        affiliate_tag: String,
        job_budget: Duration,
        worker_pool: usize,
    ) -> Self {
        Self {
            search,
            enrich,
            selector,
            oracle,
            prices,
            counters,
            marketplace_host,
            affiliate_tag,
            job_budget,
            pool: Semaphore::new(worker_pool.max(1)),
            watch_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Budget-bounded run; `Ok(None)` means the budget expired and the run
    /// was cancelled at its current suspension point.
    pub async fn evaluate_bounded(
        &self,
        watch: &Watch,
        trigger: Trigger,
    ) -> anyhow::Result<Option<EvalOutcome>> {
        match tokio::time::timeout(self.job_budget, self.evaluate(watch, trigger)).await {
            Ok(outcome) => outcome.map(Some),
            Err(_) => {
                Counters::bump(&self.counters.evals_cancelled);
                warn!(
                    watch_id = %watch.watch_id,
                    budget_secs = self.job_budget.as_secs(),
                    "evaluation exceeded budget; cancelled"
                );
                Ok(None)
            }
        }
    }

    #[instrument(
        skip(self, watch),
        target = "evaluator",
        fields(watch_id = %watch.watch_id, trigger = trigger.as_str())
    )]
    pub async fn evaluate(&self, watch: &Watch, trigger: Trigger) -> anyhow::Result<EvalOutcome> {
        let _slot = self.pool.acquire().await.context("worker pool closed")?;

        let lock = self.watch_lock(watch.watch_id);
        let _serial = lock.lock().await;

        Counters::bump(&self.counters.evals_started);
        let outcome = warn_if_slow(
            "evaluation",
            Duration::from_secs(30),
            self.run(watch, trigger),
        )
        .await;
        match &outcome {
            Ok(_) => Counters::bump(&self.counters.evals_completed),
            Err(_) => Counters::bump(&self.counters.evals_failed),
        }
        outcome
    }

    async fn run(&self, watch: &Watch, trigger: Trigger) -> anyhow::Result<EvalOutcome> {
        let candidates = self.gather(watch).await;
        let enriched = self.enrich.enrich(candidates).await;

        match self.selector.select(watch, enriched) {
            Selection::NoMatch { stage } => {
                Counters::bump(&self.counters.evals_no_match);
                info!(stage = stage.name(), "evaluation ended with no match");
                Ok(EvalOutcome::NoMatch(stage))
            }
            Selection::Match(pick) => self.deliverable(watch, trigger, pick.item).await,
        }
    }

    async fn gather(&self, watch: &Watch) -> Vec<ItemDetail> {
        // A pinned ASIN tracks that product directly; enrichment fetches its
        // detail the same way it fills search gaps.
        if let Some(asin) = &watch.asin {
            return vec![ItemDetail::pinned(asin.clone())];
        }

        let outcome = self
            .search
            .search(&watch.keywords, None, None, None)
            .await;
        if outcome.partial {
            debug!("search degraded; evaluating partial results");
        }
        outcome.items
    }

    async fn deliverable(
        &self,
        watch: &Watch,
        trigger: Trigger,
        item: ItemDetail,
    ) -> anyhow::Result<EvalOutcome> {
        let Some(quote) = self
            .oracle
            .price(&item.asin, trigger.stale_policy())
            .await?
        else {
            debug!(asin = %item.asin, "price unavailable; nothing to deliver");
            return Ok(EvalOutcome::PriceUnavailable);
        };

        // The cascade ran on enrichment-time prices; the refreshed quote may
        // have moved, and a card must never violate the watch constraints.
        if let Some(max_price) = watch.max_price {
            if quote.price > max_price {
                info!(asin = %item.asin, %max_price, live = %quote.price, "live price over budget");
                Counters::bump(&self.counters.evals_no_match);
                return Ok(EvalOutcome::NoMatch(FilterStage::Budget { max_price }));
            }
        }
        if let Some(min_discount) = watch.min_discount {
            let holds = item
                .list_price
                .and_then(|list| discount_percent(list, quote.price))
                .is_some_and(|d| d >= min_discount);
            if !holds {
                Counters::bump(&self.counters.evals_no_match);
                return Ok(EvalOutcome::NoMatch(FilterStage::Discount { min_discount }));
            }
        }

        if let Some(source) = quote.source.observation() {
            self.prices
                .record_observation(&watch.watch_id, item.asin.as_str(), quote.price, source, now_ms())
                .await?;
        }

        let card = build_card(
            &item,
            quote.price,
            watch,
            &self.marketplace_host,
            &self.affiliate_tag,
        );
        info!(asin = %item.asin, price = %quote.price, stale = quote.stale, "candidate deliverable");
        Ok(EvalOutcome::Card(card))
    }

    fn watch_lock(&self, watch_id: Uuid) -> Arc<tokio::sync::Mutex<()>> {
        self.watch_locks
            .lock()
            .entry(watch_id)
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }
}
