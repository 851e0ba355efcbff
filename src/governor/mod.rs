//! Remote-API request governor.
//!
//! Responsibilities:
//! - admit at most one request per second, steady state
//! - admit at most ten requests in any rolling ten-second window
//! - hold callers until both windows have room
//! - refuse admission outright for a fixed 60 s after a vendor throttle
//!
//! Non-responsibilities:
//! - retrying (the API client owns retry policy)
//! - quota accounting (surfaced by the client as a typed error)
//!
//! The bucket state sits behind a short `parking_lot` lock that is never
//! held across an await; waiters sleep on `tokio::time` so paused-clock
//! tests drive admission deterministically.

use std::collections::VecDeque;

use parking_lot::Mutex;
use thiserror::Error;
use tokio::time::{Duration, Instant, sleep_until};

/// Minimum spacing between admissions.
pub const STEADY_INTERVAL: Duration = Duration::from_secs(1);

/// Rolling burst window.
pub const BURST_WINDOW: Duration = Duration::from_secs(10);

/// Admissions allowed inside one burst window.
pub const BURST_LIMIT: usize = 10;

/// Fixed recovery window after a vendor throttle signal.
pub const THROTTLE_BACKOFF: Duration = Duration::from_secs(60);

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum GovernorError {
    #[error("vendor throttle back-off active for {remaining_secs}s")]
    Backoff { remaining_secs: u64 },
}

/// Point-in-time view of the governor, for logs and the admin surface.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GovernorSnapshot {
    pub requests_last_second: usize,
    pub burst_window_used: usize,
    pub throttle_active: bool,
    pub throttle_remaining_secs: u64,
}

struct Bucket {
    /// Admission times within the last `BURST_WINDOW`, oldest first.
    issued: VecDeque<Instant>,
    backoff_until: Option<Instant>,
}

impl Bucket {
    fn prune(&mut self, now: Instant) {
        while let Some(front) = self.issued.front() {
            if *front + BURST_WINDOW <= now {
                self.issued.pop_front();
            } else {
                break;
            }
        }
    }

    /// Earliest instant at which both windows admit one more request, or
    /// `None` while a back-off is active.
    fn next_slot(&mut self, now: Instant) -> Result<Instant, GovernorError> {
        if let Some(until) = self.backoff_until {
            if now < until {
                return Err(GovernorError::Backoff {
                    remaining_secs: remaining_secs(until - now),
                });
            }
            self.backoff_until = None;
        }

        let steady_at = match self.issued.back() {
            Some(last) => *last + STEADY_INTERVAL,
            None => now,
        };

        let burst_at = if self.issued.len() >= BURST_LIMIT {
            match self.issued.front() {
                Some(oldest) => *oldest + BURST_WINDOW,
                None => now,
            }
        } else {
            now
        };

        Ok(steady_at.max(burst_at))
    }
}

/// Process-wide token bucket guarding every remote API call.
pub struct RateGovernor {
    bucket: Mutex<Bucket>,
}

impl Default for RateGovernor {
    fn default() -> Self {
        Self::new()
    }
}

impl RateGovernor {
    pub fn new() -> Self {
        Self {
            bucket: Mutex::new(Bucket {
                issued: VecDeque::new(),
                backoff_until: None,
            }),
        }
    }

    /// Blocks until both the steady and the burst window admit a request.
    ///
    /// Returns `Err(Backoff)` immediately while a throttle back-off is
    /// active; callers decide whether to fail over or give up. Wakeups are
    /// not FIFO but every waiter re-contends on each pass, so no caller can
    /// be starved indefinitely.
    pub async fn acquire(&self) -> Result<(), GovernorError> {
        loop {
            let wake_at = {
                let mut bucket = self.bucket.lock();
                let now = Instant::now();
                bucket.prune(now);

                let slot = bucket.next_slot(now)?;
                if slot <= now {
                    bucket.issued.push_back(now);
                    return Ok(());
                }
                slot
            };

            // Lock released before sleeping; contenders re-check on wake.
            sleep_until(wake_at).await;
        }
    }

    /// Vendor signalled a throttle (HTTP 429). Admission is refused for the
    /// fixed back-off window; growth is deliberately not exponential, the
    /// vendor recovers within one window.
    pub fn note_throttled(&self) {
        let mut bucket = self.bucket.lock();
        bucket.backoff_until = Some(Instant::now() + THROTTLE_BACKOFF);
    }

    pub fn snapshot(&self) -> GovernorSnapshot {
        let mut bucket = self.bucket.lock();
        let now = Instant::now();
        bucket.prune(now);

        let requests_last_second = bucket
            .issued
            .iter()
            .filter(|t| **t + STEADY_INTERVAL > now)
            .count();

        let (throttle_active, throttle_remaining_secs) = match bucket.backoff_until {
            Some(until) if until > now => (true, remaining_secs(until - now)),
            _ => (false, 0),
        };

        GovernorSnapshot {
            requests_last_second,
            burst_window_used: bucket.issued.len(),
            throttle_active,
            throttle_remaining_secs,
        }
    }
}

fn remaining_secs(d: Duration) -> u64 {
    let secs = d.as_secs();
    if d.subsec_nanos() > 0 { secs + 1 } else { secs }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio::task::JoinSet;

    #[tokio::test(start_paused = true)]
    async fn first_acquire_is_immediate() {
        let gov = RateGovernor::new();
        let before = Instant::now();
        gov.acquire().await.expect("admit");
        assert_eq!(Instant::now(), before);
    }

    #[tokio::test(start_paused = true)]
    async fn steady_window_spaces_admissions_one_second_apart() {
        let gov = RateGovernor::new();
        let start = Instant::now();

        for i in 0..4u32 {
            gov.acquire().await.expect("admit");
            let elapsed = Instant::now() - start;
            assert!(
                elapsed >= Duration::from_secs(i as u64).saturating_sub(Duration::from_millis(1)),
                "admission {i} came too early: {elapsed:?}"
            );
        }
    }

    #[tokio::test(start_paused = true)]
    async fn burst_window_never_exceeds_ten_in_ten_seconds() {
        let gov = Arc::new(RateGovernor::new());
        let start = Instant::now();

        let mut times = Vec::new();
        for _ in 0..12 {
            gov.acquire().await.expect("admit");
            times.push(Instant::now() - start);
        }

        for window_start in 0..times.len() {
            let w = times[window_start];
            let in_window = times
                .iter()
                .filter(|t| **t >= w && **t < w + Duration::from_secs(10))
                .count();
            assert!(in_window <= 10, "{in_window} admissions in a 10s window");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn backoff_rejects_then_recovers() {
        let gov = RateGovernor::new();
        gov.note_throttled();

        let err = gov.acquire().await.expect_err("backoff rejects");
        let GovernorError::Backoff { remaining_secs } = err;
        assert!(remaining_secs > 0 && remaining_secs <= 60);

        let snap = gov.snapshot();
        assert!(snap.throttle_active);

        tokio::time::advance(THROTTLE_BACKOFF).await;
        gov.acquire().await.expect("admits after backoff window");
        assert!(!gov.snapshot().throttle_active);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_waiters_all_get_served() {
        let gov = Arc::new(RateGovernor::new());
        let mut set = JoinSet::new();

        for _ in 0..5 {
            let g = Arc::clone(&gov);
            set.spawn(async move { g.acquire().await });
        }

        let mut served = 0;
        while let Some(res) = set.join_next().await {
            res.expect("task").expect("admitted");
            served += 1;
        }
        assert_eq!(served, 5);
    }

    #[tokio::test(start_paused = true)]
    async fn snapshot_tracks_recent_admissions() {
        let gov = RateGovernor::new();
        gov.acquire().await.expect("admit");

        let snap = gov.snapshot();
        assert_eq!(snap.requests_last_second, 1);
        assert_eq!(snap.burst_window_used, 1);

        tokio::time::advance(Duration::from_secs(2)).await;
        let snap = gov.snapshot();
        assert_eq!(snap.requests_last_second, 0);
        assert_eq!(snap.burst_window_used, 1);

        tokio::time::advance(Duration::from_secs(9)).await;
        assert_eq!(gov.snapshot().burst_window_used, 0);
    }
}
