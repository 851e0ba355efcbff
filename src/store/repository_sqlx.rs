use anyhow::{Context, anyhow};
use async_trait::async_trait;
use sqlx::{AnyPool, Row};
use uuid::Uuid;

use crate::money::Paise;
use crate::store::model::{
    Asin, CachedPrice, ObservationSource, PriceObservation, Watch, WatchMode,
};
use crate::store::repository::{AdminStore, PriceStore, StoreMetrics, WatchStore};

/// SQLx-backed implementation of the store traits.
/// Responsible only for persistence and row mapping.
pub struct SqlxStore {
    pool: AnyPool,
}

impl SqlxStore {
    pub fn new(pool: AnyPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &AnyPool {
        &self.pool
    }
}

#[async_trait]
impl WatchStore for SqlxStore {
    async fn ensure_user(&self, user_id: i64, now_ms: i64) -> anyhow::Result<()> {
        sqlx::query(
            r#"
INSERT INTO users(user_id, created_ms) VALUES (?, ?)
ON CONFLICT(user_id) DO NOTHING;
"#,
        )
        .bind(user_id)
        .bind(now_ms)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn insert_watch(&self, watch: &Watch) -> anyhow::Result<()> {
        if !watch.is_valid() {
            return Err(anyhow!("refusing to persist invalid watch"));
        }

        sqlx::query(
            r#"
INSERT INTO watches
  (watch_id, user_id, keywords, brand, max_price_paise, min_discount, asin, mode, created_ms)
VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?);
"#,
        )
        .bind(watch.watch_id.to_string())
        .bind(watch.user_id)
        .bind(&watch.keywords)
        .bind(watch.brand.as_deref())
        .bind(watch.max_price.map(Paise::as_i64))
        .bind(watch.min_discount)
        .bind(watch.asin.as_ref().map(Asin::as_str))
        .bind(watch.mode.as_str())
        .bind(watch.created_ms)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn fetch_watch(&self, watch_id: &Uuid) -> anyhow::Result<Option<Watch>> {
        let row = sqlx::query(
            r#"
SELECT watch_id, user_id, keywords, brand, max_price_paise, min_discount, asin, mode, created_ms
FROM watches
WHERE watch_id = ?;
"#,
        )
        .bind(watch_id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(r) => Ok(Some(row_to_watch(&r)?)),
            None => Ok(None),
        }
    }

    async fn list_watches(&self) -> anyhow::Result<Vec<Watch>> {
        let rows = sqlx::query(
            r#"
SELECT watch_id, user_id, keywords, brand, max_price_paise, min_discount, asin, mode, created_ms
FROM watches
ORDER BY created_ms;
"#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut out = Vec::new();
        for r in rows {
            match row_to_watch(&r) {
                Ok(w) => out.push(w),
                Err(e) => {
                    // poison-row resilience: skip but don't fail the listing
                    tracing::warn!(error = %e, "skipping malformed watch row");
                }
            }
        }

        Ok(out)
    }

    async fn list_daily_watches_for_user(&self, user_id: i64) -> anyhow::Result<Vec<Watch>> {
        let rows = sqlx::query(
            r#"
SELECT watch_id, user_id, keywords, brand, max_price_paise, min_discount, asin, mode, created_ms
FROM watches
WHERE user_id = ? AND mode = 'daily'
ORDER BY created_ms;
"#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        let mut out = Vec::new();
        for r in rows {
            match row_to_watch(&r) {
                Ok(w) => out.push(w),
                Err(e) => {
                    tracing::warn!(error = %e, "skipping malformed watch row");
                }
            }
        }

        Ok(out)
    }

    async fn set_watch_mode(&self, watch_id: &Uuid, mode: WatchMode) -> anyhow::Result<()> {
        let res = sqlx::query(r#"UPDATE watches SET mode = ? WHERE watch_id = ?;"#)
            .bind(mode.as_str())
            .bind(watch_id.to_string())
            .execute(&self.pool)
            .await?;

        if res.rows_affected() != 1 {
            return Err(anyhow!("watch not found: {watch_id}"));
        }

        Ok(())
    }

    async fn record_click(&self, watch_id: &Uuid, asin: &str, now_ms: i64) -> anyhow::Result<()> {
        sqlx::query(r#"INSERT INTO clicks(watch_id, asin, clicked_ms) VALUES (?, ?, ?);"#)
            .bind(watch_id.to_string())
            .bind(asin)
            .bind(now_ms)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

#[async_trait]
impl PriceStore for SqlxStore {
    async fn cached_price(&self, asin: &str) -> anyhow::Result<Option<CachedPrice>> {
        let row = sqlx::query(
            r#"SELECT asin, price_paise, fetched_ms FROM price_cache WHERE asin = ?;"#,
        )
        .bind(asin)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(r) => Ok(Some(row_to_cached(&r)?)),
            None => Ok(None),
        }
    }

    async fn upsert_cached_price(
        &self,
        asin: &str,
        price: Paise,
        now_ms: i64,
    ) -> anyhow::Result<()> {
        if !price.is_positive() || price >= Paise::CACHE_LIMIT {
            return Err(anyhow!("cache rejects out-of-range price: {price}"));
        }

        sqlx::query(
            r#"
INSERT INTO price_cache(asin, price_paise, fetched_ms) VALUES (?, ?, ?)
ON CONFLICT(asin) DO UPDATE SET
  price_paise = excluded.price_paise,
  fetched_ms = excluded.fetched_ms;
"#,
        )
        .bind(asin)
        .bind(price.as_i64())
        .bind(now_ms)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn record_observation(
        &self,
        watch_id: &Uuid,
        asin: &str,
        price: Paise,
        source: ObservationSource,
        now_ms: i64,
    ) -> anyhow::Result<()> {
        if !price.is_positive() {
            return Err(anyhow!("observation rejects non-positive price: {price}"));
        }

        sqlx::query(
            r#"
INSERT INTO price_observations(watch_id, asin, price, source, observed_ms)
VALUES (?, ?, ?, ?, ?);
"#,
        )
        .bind(watch_id.to_string())
        .bind(asin)
        .bind(price.as_i64())
        .bind(source.as_str())
        .bind(now_ms)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl AdminStore for SqlxStore {
    async fn metrics(&self) -> anyhow::Result<StoreMetrics> {
        let users: i64 = sqlx::query_scalar(r#"SELECT COUNT(*) FROM users;"#)
            .fetch_one(&self.pool)
            .await?;
        let watch_creators: i64 =
            sqlx::query_scalar(r#"SELECT COUNT(DISTINCT user_id) FROM watches;"#)
                .fetch_one(&self.pool)
                .await?;
        let live_watches: i64 = sqlx::query_scalar(r#"SELECT COUNT(*) FROM watches;"#)
            .fetch_one(&self.pool)
            .await?;
        let clicks: i64 = sqlx::query_scalar(r#"SELECT COUNT(*) FROM clicks;"#)
            .fetch_one(&self.pool)
            .await?;
        let scrape_observations: i64 = sqlx::query_scalar(
            r#"SELECT COUNT(*) FROM price_observations WHERE source = 'scrape';"#,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(StoreMetrics {
            users,
            watch_creators,
            live_watches,
            clicks,
            scrape_observations,
        })
    }

    async fn observations_page(
        &self,
        after_id: i64,
        limit: i64,
    ) -> anyhow::Result<Vec<PriceObservation>> {
        let rows = sqlx::query(
            r#"
SELECT id, watch_id, asin, price, source, observed_ms
FROM price_observations
WHERE id > ?
ORDER BY id
LIMIT ?;
"#,
        )
        .bind(after_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_observation).collect()
    }
}

/* =========================
Row mapping
========================= */

fn row_to_watch(r: &sqlx::any::AnyRow) -> anyhow::Result<Watch> {
    let id_str: String = r.get("watch_id");
    let watch_id = Uuid::parse_str(&id_str).context("invalid watch_id")?;

    let mode_str: String = r.get("mode");
    let mode = WatchMode::parse(&mode_str).ok_or_else(|| anyhow!("invalid mode: {mode_str}"))?;

    let asin = match r.get::<Option<String>, _>("asin") {
        Some(raw) => Some(Asin::parse(&raw).ok_or_else(|| anyhow!("invalid asin: {raw}"))?),
        None => None,
    };

    Ok(Watch {
        watch_id,
        user_id: r.get::<i64, _>("user_id"),
        keywords: r.get::<String, _>("keywords"),
        brand: r.get::<Option<String>, _>("brand"),
        max_price: r
            .get::<Option<i64>, _>("max_price_paise")
            .map(Paise::from_paise),
        min_discount: r.get::<Option<i64>, _>("min_discount"),
        asin,
        mode,
        created_ms: r.get::<i64, _>("created_ms"),
    })
}

fn row_to_cached(r: &sqlx::any::AnyRow) -> anyhow::Result<CachedPrice> {
    let raw: String = r.get("asin");
    let asin = Asin::parse(&raw).ok_or_else(|| anyhow!("invalid cached asin: {raw}"))?;

    Ok(CachedPrice {
        asin,
        price: Paise::from_paise(r.get::<i64, _>("price_paise")),
        fetched_ms: r.get::<i64, _>("fetched_ms"),
    })
}

fn row_to_observation(r: &sqlx::any::AnyRow) -> anyhow::Result<PriceObservation> {
    let watch_str: String = r.get("watch_id");
    let watch_id = Uuid::parse_str(&watch_str).context("invalid watch_id")?;

    let asin_str: String = r.get("asin");
    let asin = Asin::parse(&asin_str).ok_or_else(|| anyhow!("invalid asin: {asin_str}"))?;

    let source_str: String = r.get("source");
    let source = ObservationSource::parse(&source_str)
        .ok_or_else(|| anyhow!("invalid source: {source_str}"))?;

    Ok(PriceObservation {
        id: r.get::<i64, _>("id"),
        watch_id,
        asin,
        price: Paise::from_paise(r.get::<i64, _>("price")),
        source,
        observed_ms: r.get::<i64, _>("observed_ms"),
    })
}
