use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::money::Paise;
use crate::time::DAY_MS;

/// 10-character uppercase alphanumeric marketplace product id.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Asin(String);

impl Asin {
    /// Validates the marketplace format: exactly 10 uppercase alphanumerics.
    pub fn parse(raw: &str) -> Option<Asin> {
        let ok = raw.len() == 10
            && raw
                .chars()
                .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit());
        ok.then(|| Asin(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Asin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which scheduler family owns a watch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WatchMode {
    Daily,
    Realtime,
}

impl WatchMode {
    pub fn as_str(self) -> &'static str {
        match self {
            WatchMode::Daily => "daily",
            WatchMode::Realtime => "realtime",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "daily" => Some(WatchMode::Daily),
            "realtime" => Some(WatchMode::Realtime),
            _ => None,
        }
    }
}

/// A user's standing product query.
///
/// Invariants (enforced at creation and again at the store boundary):
/// at least one of {keywords, asin} is set; `max_price`, when present, is
/// positive; `min_discount`, when present, is in 1..=99.
#[derive(Clone, Debug)]
pub struct Watch {
    pub watch_id: Uuid,
    pub user_id: i64,
    pub keywords: String,
    pub brand: Option<String>,
    pub max_price: Option<Paise>,
    pub min_discount: Option<i64>,
    pub asin: Option<Asin>,
    pub mode: WatchMode,
    pub created_ms: i64,
}

impl Watch {
    /// Structural validity independent of persistence.
    pub fn is_valid(&self) -> bool {
        let has_subject = !self.keywords.trim().is_empty() || self.asin.is_some();
        let price_ok = self.max_price.is_none_or(|p| p.is_positive());
        let discount_ok = self.min_discount.is_none_or(|d| (1..=99).contains(&d));
        has_subject && price_ok && discount_ok
    }
}

/// Where a persisted price observation came from. Cache reads never produce
/// observations, so `cache` is deliberately not representable here.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ObservationSource {
    Api,
    Scrape,
}

impl ObservationSource {
    pub fn as_str(self) -> &'static str {
        match self {
            ObservationSource::Api => "api",
            ObservationSource::Scrape => "scrape",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "api" => Some(ObservationSource::Api),
            "scrape" => Some(ObservationSource::Scrape),
            _ => None,
        }
    }
}

/// Append-only record of one successful remote price fetch for a watch.
#[derive(Clone, Debug)]
pub struct PriceObservation {
    pub id: i64,
    pub watch_id: Uuid,
    pub asin: Asin,
    pub price: Paise,
    pub source: ObservationSource,
    pub observed_ms: i64,
}

/// Append-only record of a followed outbound link.
#[derive(Clone, Debug)]
pub struct Click {
    pub id: i64,
    pub watch_id: Uuid,
    pub asin: Asin,
    pub clicked_ms: i64,
}

/// Global price-cache entry.
#[derive(Clone, Debug, PartialEq)]
pub struct CachedPrice {
    pub asin: Asin,
    pub price: Paise,
    pub fetched_ms: i64,
}

impl CachedPrice {
    /// Fresh iff fetched within the last 24 hours.
    pub fn is_fresh(&self, now_ms: i64) -> bool {
        now_ms - self.fetched_ms < DAY_MS
    }
}
