use async_trait::async_trait;
use uuid::Uuid;

use crate::money::Paise;
use crate::store::model::{CachedPrice, ObservationSource, PriceObservation, Watch, WatchMode};

/// Persistence for users, watches and clicks.
#[async_trait]
pub trait WatchStore: Send + Sync {
    /// Creates the user row if it does not exist yet. Idempotent.
    async fn ensure_user(&self, user_id: i64, now_ms: i64) -> anyhow::Result<()>;

    async fn insert_watch(&self, watch: &Watch) -> anyhow::Result<()>;

    async fn fetch_watch(&self, watch_id: &Uuid) -> anyhow::Result<Option<Watch>>;

    /// All watches, used to rebuild the scheduler registry on startup.
    async fn list_watches(&self) -> anyhow::Result<Vec<Watch>>;

    /// A user's daily watches; drives digest sizing at fire time.
    async fn list_daily_watches_for_user(&self, user_id: i64) -> anyhow::Result<Vec<Watch>>;

    async fn set_watch_mode(&self, watch_id: &Uuid, mode: WatchMode) -> anyhow::Result<()>;

    async fn record_click(&self, watch_id: &Uuid, asin: &str, now_ms: i64) -> anyhow::Result<()>;
}

/// Persistence for the global price cache and the observation history.
#[async_trait]
pub trait PriceStore: Send + Sync {
    async fn cached_price(&self, asin: &str) -> anyhow::Result<Option<CachedPrice>>;

    /// Upsert a cache entry. Rejects non-positive and absurd prices so a
    /// partial extraction can never poison the cache.
    async fn upsert_cached_price(
        &self,
        asin: &str,
        price: Paise,
        now_ms: i64,
    ) -> anyhow::Result<()>;

    async fn record_observation(
        &self,
        watch_id: &Uuid,
        asin: &str,
        price: Paise,
        source: ObservationSource,
        now_ms: i64,
    ) -> anyhow::Result<()>;
}

/// Counts surfaced on the admin metrics endpoint.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StoreMetrics {
    pub users: i64,
    pub watch_creators: i64,
    pub live_watches: i64,
    pub clicks: i64,
    pub scrape_observations: i64,
}

/// Read-only queries backing the admin surface.
#[async_trait]
pub trait AdminStore: Send + Sync {
    async fn metrics(&self) -> anyhow::Result<StoreMetrics>;

    /// One page of observations with `id > after_id`, in insertion order.
    async fn observations_page(
        &self,
        after_id: i64,
        limit: i64,
    ) -> anyhow::Result<Vec<PriceObservation>>;
}
