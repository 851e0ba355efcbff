//! Two-tier price oracle.
//!
//! Resolution order for `price(asin)`:
//!   1. fresh cache entry (24 h window)
//!   2. remote API `get_item` with the minimal resource bundle
//!   3. HTML scrape fallback
//!   4. stale cache entry, if the caller's policy accepts one
//!   5. unavailable
//!
//! Concurrent misses for the same ASIN share one in-flight fetch: the first
//! caller installs a shared future keyed by ASIN, later callers await the
//! same future. The map lock is only held to install or look up, never
//! across an await.

use std::collections::HashMap;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::metrics::counters::Counters;
use crate::money::Paise;
use crate::paapi::ProductSource;
use crate::paapi::types::ResourceBundle;
use crate::scrape::PriceScraper;
use crate::store::model::{Asin, ObservationSource};
use crate::store::repository::PriceStore;
use crate::time::now_ms;

/// Whether the caller tolerates a stale (older than 24 h) cache entry.
/// Digest ranking rejects stale; the interactive creation path accepts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StalePolicy {
    Accept,
    Reject,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QuoteSource {
    Cache,
    Api,
    Scrape,
}

impl QuoteSource {
    /// Observations are only recorded for remote fetches.
    pub fn observation(self) -> Option<ObservationSource> {
        match self {
            QuoteSource::Cache => None,
            QuoteSource::Api => Some(ObservationSource::Api),
            QuoteSource::Scrape => Some(ObservationSource::Scrape),
        }
    }
}

impl From<ObservationSource> for QuoteSource {
    fn from(s: ObservationSource) -> Self {
        match s {
            ObservationSource::Api => QuoteSource::Api,
            ObservationSource::Scrape => QuoteSource::Scrape,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PriceQuote {
    pub price: Paise,
    pub source: QuoteSource,
    pub stale: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct FetchedPrice {
    price: Paise,
    source: ObservationSource,
}

type InFlight = Shared<BoxFuture<'static, Option<FetchedPrice>>>;

pub struct PriceOracle {
    prices: Arc<dyn PriceStore>,
    source: Arc<dyn ProductSource>,
    scraper: Arc<dyn PriceScraper>,
    counters: Counters,
    in_flight: Mutex<HashMap<Asin, InFlight>>,
}

impl PriceOracle {
    pub fn new(
        prices: Arc<dyn PriceStore>,
        source: Arc<dyn ProductSource>,
        scraper: Arc<dyn PriceScraper>,
        counters: Counters,
    ) -> Self {
        Self {
            prices,
            source,
            scraper,
            counters,
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// Resolve a price for `asin`. `Ok(None)` means unavailable; callers
    /// must not substitute a guess.
    pub async fn price(
        self: &Arc<Self>,
        asin: &Asin,
        policy: StalePolicy,
    ) -> anyhow::Result<Option<PriceQuote>> {
        let cached = self.prices.cached_price(asin.as_str()).await?;

        if let Some(entry) = &cached {
            if entry.is_fresh(now_ms()) {
                Counters::bump(&self.counters.cache_hits);
                return Ok(Some(PriceQuote {
                    price: entry.price,
                    source: QuoteSource::Cache,
                    stale: false,
                }));
            }
        }
        Counters::bump(&self.counters.cache_misses);

        if let Some(fetched) = self.coalesced_fetch(asin).await {
            return Ok(Some(PriceQuote {
                price: fetched.price,
                source: fetched.source.into(),
                stale: false,
            }));
        }

        // Both remote tiers failed; a stale entry is better than nothing for
        // callers that said so.
        match (cached, policy) {
            (Some(entry), StalePolicy::Accept) => Ok(Some(PriceQuote {
                price: entry.price,
                source: QuoteSource::Cache,
                stale: true,
            })),
            _ => Ok(None),
        }
    }

    pub fn in_flight_len(&self) -> usize {
        self.in_flight.lock().len()
    }

    fn coalesced_fetch(self: &Arc<Self>, asin: &Asin) -> InFlight {
        let mut map = self.in_flight.lock();
        if let Some(existing) = map.get(asin) {
            return existing.clone();
        }

        let oracle = Arc::clone(self);
        let key = asin.clone();
        let fut = async move {
            let out = oracle.fetch_remote(&key).await;
            oracle.in_flight.lock().remove(&key);
            out
        }
        .boxed()
        .shared();

        map.insert(asin.clone(), fut.clone());
        fut
    }

    async fn fetch_remote(&self, asin: &Asin) -> Option<FetchedPrice> {
        match self.source.get_item(asin, ResourceBundle::Minimal).await {
            Ok(detail) => {
                if let Some(price) = detail.price.filter(|p| p.is_positive()) {
                    self.write_back(asin, price).await;
                    return Some(FetchedPrice {
                        price,
                        source: ObservationSource::Api,
                    });
                }
                // search/get responses can omit offer data entirely
                debug!(%asin, "API response carried no usable offer; trying scrape");
            }
            Err(e) if e.is_fail_over() => {
                debug!(%asin, error = %e, "API tier unavailable; trying scrape");
            }
            Err(e) => {
                warn!(%asin, error = %e, "API tier failed hard; not scraping");
                return None;
            }
        }

        Counters::bump(&self.counters.scrape_fallbacks);
        match self.scraper.scrape_price(asin).await {
            Ok(price) if price.is_positive() => {
                self.write_back(asin, price).await;
                Some(FetchedPrice {
                    price,
                    source: ObservationSource::Scrape,
                })
            }
            Ok(price) => {
                warn!(%asin, %price, "scrape produced non-positive price; discarding");
                None
            }
            Err(e) => {
                debug!(%asin, error = %e, "scrape tier failed");
                None
            }
        }
    }

    async fn write_back(&self, asin: &Asin, price: Paise) {
        if let Err(e) = self
            .prices
            .upsert_cached_price(asin.as_str(), price, now_ms())
            .await
        {
            warn!(%asin, error = %e, "price cache write-back failed");
        }
    }
}
