//! Paginated keyword search with a session-scoped result cache.
//!
//! Responsibilities:
//! - fetch up to three pages of ten items with cooperative pacing
//! - stop early when the vendor runs out of results
//! - on throttle/quota mid-sequence, return what was collected with a
//!   partial flag instead of failing the run
//! - deduplicate by ASIN keeping the first occurrence, preserving vendor
//!   relevance order
//!
//! Two concurrent identical searches share one underlying fetch via the same
//! install-a-shared-future pattern the oracle uses; completed results stay
//! usable for five minutes.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::metrics::counters::Counters;
use crate::money::Paise;
use crate::paapi::ProductSource;
use crate::paapi::client::MAX_PAGE_SIZE;
use crate::paapi::types::{ItemDetail, ResourceBundle, SearchRequest};

/// Wall-clock pacing between pages. The governor already enforces the 1 s
/// steady rate; the extra 100 ms absorbs clock skew between us and the
/// vendor's limiter.
pub const PAGE_DELAY: Duration = Duration::from_millis(1100);

pub const MAX_PAGES: u8 = 3;

pub const DEFAULT_ITEM_CAP: usize = 30;

/// Lifetime of a completed search in the session cache.
pub const SESSION_TTL: Duration = Duration::from_secs(5 * 60);

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SearchKey {
    pub keywords: String,
    pub search_index: Option<String>,
    pub item_cap: usize,
}

#[derive(Clone, Debug, Default)]
pub struct SearchOutcome {
    pub items: Vec<ItemDetail>,
    /// True when a page failed and later pages were skipped.
    pub partial: bool,
}

type InFlight = Shared<BoxFuture<'static, SearchOutcome>>;

enum Slot {
    InFlight(InFlight),
    Ready {
        outcome: SearchOutcome,
        fetched_at: Instant,
    },
}

/// Owned view of a session slot, so the map lock borrow ends before the
/// caller awaits.
enum Joined {
    Ready(SearchOutcome),
    Flight(InFlight),
}

pub struct SearchPipeline {
    source: Arc<dyn ProductSource>,
    counters: Counters,
    sessions: Mutex<HashMap<SearchKey, Slot>>,
}

impl SearchPipeline {
    pub fn new(source: Arc<dyn ProductSource>, counters: Counters) -> Self {
        Self {
            source,
            counters,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Run (or join) a search for `keywords`.
    ///
    /// The session cache is keyed by (keywords, index, cap) only; a joined
    /// caller inherits the first caller's `min_price`.
    pub async fn search(
        self: &Arc<Self>,
        keywords: &str,
        search_index: Option<String>,
        min_price: Option<Paise>,
        item_cap: Option<usize>,
    ) -> SearchOutcome {
        let key = SearchKey {
            keywords: keywords.to_string(),
            search_index,
            item_cap: item_cap.unwrap_or(DEFAULT_ITEM_CAP).max(1),
        };

        let fut = {
            let mut sessions = self.sessions.lock();

            let expired = matches!(
                sessions.get(&key),
                Some(Slot::Ready { fetched_at, .. }) if fetched_at.elapsed() >= SESSION_TTL
            );
            if expired {
                sessions.remove(&key);
            }

            let joined = sessions.get(&key).map(|slot| match slot {
                Slot::Ready { outcome, .. } => Joined::Ready(outcome.clone()),
                Slot::InFlight(f) => Joined::Flight(f.clone()),
            });

            match joined {
                Some(Joined::Ready(outcome)) => {
                    debug!(keywords = %key.keywords, "search served from session cache");
                    return outcome;
                }
                Some(Joined::Flight(f)) => f,
                None => {
                    let pipeline = Arc::clone(self);
                    let k = key.clone();
                    let fut = async move {
                        let outcome = pipeline.fetch_pages(&k, min_price).await;
                        pipeline.sessions.lock().insert(
                            k,
                            Slot::Ready {
                                outcome: outcome.clone(),
                                fetched_at: Instant::now(),
                            },
                        );
                        outcome
                    }
                    .boxed()
                    .shared();
                    sessions.insert(key, Slot::InFlight(fut.clone()));
                    fut
                }
            }
        };

        fut.await
    }

    async fn fetch_pages(&self, key: &SearchKey, min_price: Option<Paise>) -> SearchOutcome {
        let mut collected: Vec<ItemDetail> = Vec::new();
        let mut partial = false;

        for page in 1..=MAX_PAGES {
            let req = SearchRequest {
                keywords: key.keywords.clone(),
                search_index: key.search_index.clone(),
                page,
                item_count: MAX_PAGE_SIZE,
                bundle: ResourceBundle::Detailed,
                min_price,
            };

            match self.source.search(&req).await {
                Ok(items) => {
                    let exhausted = items.len() < MAX_PAGE_SIZE as usize;
                    collected.extend(items);
                    if exhausted {
                        break;
                    }
                }
                Err(e) => {
                    partial = true;
                    Counters::bump(&self.counters.searches_partial);
                    warn!(
                        keywords = %key.keywords,
                        page,
                        error = %e,
                        "search page failed; returning collected results as partial"
                    );
                    break;
                }
            }

            if page < MAX_PAGES {
                tokio::time::sleep(PAGE_DELAY).await;
            }
        }

        let items = dedup_by_asin(collected, key.item_cap);
        debug!(
            keywords = %key.keywords,
            count = items.len(),
            partial,
            "search complete"
        );

        SearchOutcome { items, partial }
    }
}

/// First occurrence wins; vendor relevance order is preserved.
fn dedup_by_asin(items: Vec<ItemDetail>, cap: usize) -> Vec<ItemDetail> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for item in items {
        if seen.insert(item.asin.clone()) {
            out.push(item);
            if out.len() >= cap {
                break;
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::model::Asin;

    fn mk_item(asin: &str) -> ItemDetail {
        ItemDetail::pinned(Asin::parse(asin).expect("asin"))
    }

    #[test]
    fn dedup_keeps_first_occurrence_in_order() {
        let items = vec![
            mk_item("B000000001"),
            mk_item("B000000002"),
            mk_item("B000000001"),
            mk_item("B000000003"),
        ];
        let out = dedup_by_asin(items, 30);
        let asins: Vec<&str> = out.iter().map(|i| i.asin.as_str()).collect();
        assert_eq!(asins, ["B000000001", "B000000002", "B000000003"]);
    }

    #[test]
    fn dedup_respects_item_cap() {
        let items: Vec<ItemDetail> = (1..=9)
            .map(|i| mk_item(&format!("B00000000{i}")))
            .collect();
        assert_eq!(dedup_by_asin(items, 4).len(), 4);
    }
}
