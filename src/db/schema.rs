use sqlx::AnyPool;

/// Creates the five core tables. All timestamps are unix milliseconds; the
/// `Any` driver has no datetime codec, so integer columns keep row mapping
/// portable between sqlite and postgres.
pub async fn migrate(pool: &AnyPool) -> anyhow::Result<()> {
    // Users: one row per chat user, created on first interaction.
    sqlx::query(
        r#"
CREATE TABLE IF NOT EXISTS users (
  user_id BIGINT PRIMARY KEY,
  created_ms BIGINT NOT NULL
);
"#,
    )
    .execute(pool)
    .await?;

    // Watches: a user's standing query.
    sqlx::query(
        r#"
CREATE TABLE IF NOT EXISTS watches (
  watch_id TEXT PRIMARY KEY,
  user_id BIGINT NOT NULL,
  keywords TEXT NOT NULL,
  brand TEXT,
  max_price_paise BIGINT,
  min_discount BIGINT,
  asin TEXT,
  mode TEXT NOT NULL,
  created_ms BIGINT NOT NULL
);
"#,
    )
    .execute(pool)
    .await?;

    // Price observations: append-only fetch history, exported as CSV.
    sqlx::query(
        r#"
CREATE TABLE IF NOT EXISTS price_observations (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  watch_id TEXT NOT NULL,
  asin TEXT NOT NULL,
  price BIGINT NOT NULL,
  source TEXT NOT NULL,
  observed_ms BIGINT NOT NULL
);
"#,
    )
    .execute(pool)
    .await?;

    // Clicks: append-only outbound-link follows.
    sqlx::query(
        r#"
CREATE TABLE IF NOT EXISTS clicks (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  watch_id TEXT NOT NULL,
  asin TEXT NOT NULL,
  clicked_ms BIGINT NOT NULL
);
"#,
    )
    .execute(pool)
    .await?;

    // Price cache: global, keyed by ASIN only. No foreign keys by design;
    // stale rows stay behind for disaster recovery.
    sqlx::query(
        r#"
CREATE TABLE IF NOT EXISTS price_cache (
  asin TEXT PRIMARY KEY,
  price_paise BIGINT NOT NULL,
  fetched_ms BIGINT NOT NULL
);
"#,
    )
    .execute(pool)
    .await?;

    sqlx::query(r#"CREATE INDEX IF NOT EXISTS idx_watches_user ON watches(user_id);"#)
        .execute(pool)
        .await?;

    sqlx::query(
        r#"CREATE INDEX IF NOT EXISTS idx_observations_watch ON price_observations(watch_id);"#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
