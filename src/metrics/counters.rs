use std::sync::Arc;
use std::sync::atomic::AtomicU64;

/// Minimal counters for operational visibility.
#[derive(Clone, Default)]
pub struct Counters {
    pub evals_started: Arc<AtomicU64>,
    pub evals_completed: Arc<AtomicU64>,
    pub evals_failed: Arc<AtomicU64>,
    pub evals_cancelled: Arc<AtomicU64>,
    pub evals_no_match: Arc<AtomicU64>,

    pub cache_hits: Arc<AtomicU64>,
    pub cache_misses: Arc<AtomicU64>,
    pub api_calls: Arc<AtomicU64>,
    pub scrape_fallbacks: Arc<AtomicU64>,
    pub throttle_events: Arc<AtomicU64>,

    pub searches_partial: Arc<AtomicU64>,
    pub ticks_skipped_quiet: Arc<AtomicU64>,
}

impl Counters {
    pub fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
    }

    pub fn read(counter: &AtomicU64) -> u64 {
        counter.load(std::sync::atomic::Ordering::Relaxed)
    }
}
