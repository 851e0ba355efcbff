//! Daily digest assembly.
//!
//! Daily jobs stay per-watch, but delivery is one carousel per user: each
//! fire reports its outcome into a slot keyed (user, local date), and when
//! every expected watch has reported (or the grace deadline passes) the
//! top cards by discount go out as a single digest.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::bot::outbound::{ChatOutbound, DealCard};

/// Most cards a digest carries.
pub const DIGEST_CAP: usize = 5;

/// How long a partially-filled digest waits for stragglers before flushing
/// whatever it has.
pub const DEFAULT_FLUSH_GRACE: Duration = Duration::from_secs(10 * 60);

struct DigestSlot {
    expected: usize,
    reported: usize,
    cards: Vec<DealCard>,
    flush_armed: bool,
}

pub struct DigestCollector {
    outbound: Arc<dyn ChatOutbound>,
    flush_grace: Duration,
    pending: Mutex<HashMap<(i64, String), DigestSlot>>,
}

impl DigestCollector {
    pub fn new(outbound: Arc<dyn ChatOutbound>, flush_grace: Duration) -> Self {
        Self {
            outbound,
            flush_grace,
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Report one daily watch's outcome into the user's digest for the day.
    /// `expected` is the number of daily watches the user had at fire time;
    /// the largest reported value wins.
    pub async fn submit(
        self: &Arc<Self>,
        user_id: i64,
        date_key: String,
        expected: usize,
        card: Option<DealCard>,
    ) {
        let ready = {
            let mut pending = self.pending.lock();
            let slot = pending
                .entry((user_id, date_key.clone()))
                .or_insert_with(|| DigestSlot {
                    expected: expected.max(1),
                    reported: 0,
                    cards: Vec::new(),
                    flush_armed: false,
                });

            slot.expected = slot.expected.max(expected);
            slot.reported += 1;
            if let Some(card) = card {
                slot.cards.push(card);
            }

            if !slot.flush_armed {
                slot.flush_armed = true;
                let collector = Arc::clone(self);
                let grace = self.flush_grace;
                let key_user = user_id;
                let key_date = date_key.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(grace).await;
                    collector.flush(key_user, &key_date).await;
                });
            }

            slot.reported >= slot.expected
        };

        if ready {
            self.flush(user_id, &date_key).await;
        }
    }

    /// Deliver the top cards by discount and drop the slot. Idempotent: a
    /// second call finds nothing.
    pub async fn flush(&self, user_id: i64, date_key: &str) {
        let cards = {
            let mut pending = self.pending.lock();
            let Some(mut slot) = pending.remove(&(user_id, date_key.to_string())) else {
                return;
            };
            slot.cards.sort_by(|a, b| {
                b.discount()
                    .cmp(&a.discount())
                    .then_with(|| a.price.cmp(&b.price))
                    .then_with(|| a.click_token.cmp(&b.click_token))
            });
            slot.cards.truncate(DIGEST_CAP);
            slot.cards
        };

        if cards.is_empty() {
            debug!(user_id, date_key, "empty digest; nothing delivered");
            return;
        }

        if let Err(e) = self.outbound.send_carousel(user_id, cards).await {
            warn!(user_id, error = ?e, "digest delivery failed");
        }
    }

    pub fn pending_len(&self) -> usize {
        self.pending.lock().len()
    }
}
