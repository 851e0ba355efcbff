//! Job registry and the two job families.
//!
//! One job per watch, identity `daily:<watch-id>` / `realtime:<watch-id>`.
//! The registry map sits behind a single lock; job bodies execute outside
//! it. Registering a watch removes any previous job for that watch in the
//! same lock acquisition, so a mode change is one atomic swap.
//!
//! State machine per job: scheduled -> running -> {completed, failed,
//! cancelled} -> scheduled. Runs of the same job are serialised twice over:
//! the job loop awaits its own fire, and the evaluator holds a per-watch
//! lock.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveTime, Utc};
use chrono_tz::Tz;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::bot::outbound::ChatOutbound;
use crate::error::ErrorReporter;
use crate::evaluator::{EvalOutcome, Evaluator, Trigger};
use crate::metrics::counters::Counters;
use crate::scheduler::digest::DigestCollector;
use crate::scheduler::{next_daily_fire, within_wake_hours};
use crate::store::model::{Watch, WatchMode};
use crate::store::repository::WatchStore;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct JobId(String);

impl JobId {
    pub fn daily(watch_id: &Uuid) -> Self {
        JobId(format!("daily:{watch_id}"))
    }

    pub fn realtime(watch_id: &Uuid) -> Self {
        JobId(format!("realtime:{watch_id}"))
    }

    pub fn for_watch(mode: WatchMode, watch_id: &Uuid) -> Self {
        match mode {
            WatchMode::Daily => Self::daily(watch_id),
            WatchMode::Realtime => Self::realtime(watch_id),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JobState {
    Scheduled,
    Running,
    Completed,
    Failed,
    Cancelled,
}

struct JobHandle {
    task: JoinHandle<()>,
    state: Arc<Mutex<JobState>>,
}

/// Everything a job task needs at fire time.
pub struct SchedulerContext {
    pub evaluator: Arc<Evaluator>,
    pub watches: Arc<dyn WatchStore>,
    pub outbound: Arc<dyn ChatOutbound>,
    pub digests: Arc<DigestCollector>,
    pub reporter: ErrorReporter,
    pub counters: Counters,
    pub tz: Tz,
    pub daily_fire: NaiveTime,
    pub wake_start: NaiveTime,
    pub wake_end: NaiveTime,
    pub realtime_every: Duration,
}

pub struct JobRegistry {
    ctx: Arc<SchedulerContext>,
    jobs: Mutex<HashMap<JobId, JobHandle>>,
}

impl JobRegistry {
    pub fn new(ctx: Arc<SchedulerContext>) -> Self {
        Self {
            ctx,
            jobs: Mutex::new(HashMap::new()),
        }
    }

    /// Register (or re-register) the job for `watch`'s current mode. Any
    /// previous job for the watch, in either family, is removed under the
    /// same lock.
    pub fn register(&self, watch: &Watch) {
        let state = Arc::new(Mutex::new(JobState::Scheduled));
        let task = match watch.mode {
            WatchMode::Daily => spawn_daily(Arc::clone(&self.ctx), watch.clone(), state.clone()),
            WatchMode::Realtime => {
                spawn_realtime(Arc::clone(&self.ctx), watch.clone(), state.clone())
            }
        };

        let id = JobId::for_watch(watch.mode, &watch.watch_id);
        let mut jobs = self.jobs.lock();
        remove_watch_locked(&mut jobs, &watch.watch_id);
        jobs.insert(id.clone(), JobHandle { task, state });
        info!(job = %id, "job registered");
    }

    pub fn deregister(&self, watch_id: &Uuid) {
        let mut jobs = self.jobs.lock();
        remove_watch_locked(&mut jobs, watch_id);
    }

    /// Rebuild the registry from persisted watches at startup. Fires missed
    /// while the process was down are not replayed.
    pub fn register_all(&self, watches: &[Watch]) {
        for watch in watches {
            self.register(watch);
        }
        info!(count = watches.len(), "scheduler registry rebuilt");
    }

    pub fn contains(&self, id: &JobId) -> bool {
        self.jobs.lock().contains_key(id)
    }

    pub fn job_state(&self, id: &JobId) -> Option<JobState> {
        self.jobs.lock().get(id).map(|h| *h.state.lock())
    }

    pub fn len(&self) -> usize {
        self.jobs.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.lock().is_empty()
    }
}

impl Drop for JobRegistry {
    fn drop(&mut self) {
        for (_, handle) in self.jobs.lock().drain() {
            handle.task.abort();
        }
    }
}

fn remove_watch_locked(jobs: &mut HashMap<JobId, JobHandle>, watch_id: &Uuid) {
    for id in [JobId::daily(watch_id), JobId::realtime(watch_id)] {
        if let Some(handle) = jobs.remove(&id) {
            handle.task.abort();
            debug!(job = %id, "job deregistered");
        }
    }
}

fn spawn_daily(
    ctx: Arc<SchedulerContext>,
    watch: Watch,
    state: Arc<Mutex<JobState>>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            *state.lock() = JobState::Scheduled;

            let now = Utc::now().with_timezone(&ctx.tz);
            let next = next_daily_fire(now, ctx.daily_fire);
            let wait = (next - now).to_std().unwrap_or_default();
            debug!(watch_id = %watch.watch_id, wait_secs = wait.as_secs(), "daily job sleeping");
            tokio::time::sleep(wait).await;

            run_daily_fire(&ctx, &watch, &state).await;
        }
    })
}

async fn run_daily_fire(ctx: &SchedulerContext, watch: &Watch, state: &Mutex<JobState>) {
    *state.lock() = JobState::Running;

    let date_key = Utc::now().with_timezone(&ctx.tz).date_naive().to_string();

    // Digest sizing: every daily watch of this user reports into the same
    // digest, so the expected count is read at fire time.
    let expected = match ctx.watches.list_daily_watches_for_user(watch.user_id).await {
        Ok(list) => list.len().max(1),
        Err(e) => {
            warn!(error = %e, "could not size digest; assuming single watch");
            1
        }
    };

    let outcome = ctx.evaluator.evaluate_bounded(watch, Trigger::Daily).await;
    let (card, end_state) = match outcome {
        Ok(Some(EvalOutcome::Card(card))) => (Some(card), JobState::Completed),
        Ok(Some(_)) => (None, JobState::Completed),
        Ok(None) => (None, JobState::Cancelled),
        Err(e) => {
            error!(watch_id = %watch.watch_id, error = ?e, "daily evaluation failed");
            ctx.reporter.notify("scheduler_daily", &e);
            (None, JobState::Failed)
        }
    };

    ctx.digests
        .submit(watch.user_id, date_key, expected, card)
        .await;

    *state.lock() = end_state;
}

fn spawn_realtime(
    ctx: Arc<SchedulerContext>,
    watch: Watch,
    state: Arc<Mutex<JobState>>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let period = ctx.realtime_every;
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        // missed fires are dropped, not queued for catch-up
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            *state.lock() = JobState::Scheduled;
            ticker.tick().await;

            let local = Utc::now().with_timezone(&ctx.tz).time();
            if !within_wake_hours(local, ctx.wake_start, ctx.wake_end) {
                Counters::bump(&ctx.counters.ticks_skipped_quiet);
                debug!(watch_id = %watch.watch_id, "tick inside quiet hours; skipped");
                continue;
            }

            run_realtime_fire(&ctx, &watch, &state).await;
        }
    })
}

async fn run_realtime_fire(ctx: &SchedulerContext, watch: &Watch, state: &Mutex<JobState>) {
    *state.lock() = JobState::Running;

    let end_state = match ctx.evaluator.evaluate_bounded(watch, Trigger::Realtime).await {
        Ok(Some(EvalOutcome::Card(card))) => {
            if let Err(e) = ctx.outbound.send_carousel(watch.user_id, vec![card]).await {
                warn!(watch_id = %watch.watch_id, error = ?e, "carousel delivery failed");
            }
            JobState::Completed
        }
        Ok(Some(_)) => {
            // no deal this tick; scheduled runs stay quiet about it
            JobState::Completed
        }
        Ok(None) => JobState::Cancelled,
        Err(e) => {
            error!(watch_id = %watch.watch_id, error = ?e, "realtime evaluation failed");
            ctx.reporter.notify("scheduler_realtime", &e);
            JobState::Failed
        }
    };

    *state.lock() = end_state;
}
