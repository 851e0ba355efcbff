//! Read-only backing for the admin HTTP surface.
//!
//! Three contracts: aggregate metrics, a streaming CSV export of the price
//! observations in insertion order, and a health probe that deliberately
//! touches nothing.

use std::io::Write;
use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use tracing::debug;

use crate::store::repository::{AdminStore, StoreMetrics};

/// Rows fetched per export page.
pub const EXPORT_PAGE: i64 = 500;

pub struct AdminReader {
    store: Arc<dyn AdminStore>,
}

impl AdminReader {
    pub fn new(store: Arc<dyn AdminStore>) -> Self {
        Self { store }
    }

    pub async fn metrics(&self) -> anyhow::Result<StoreMetrics> {
        self.store.metrics().await
    }

    /// Stream the observations table as CSV, paging by id so the export
    /// never loads the whole table. Returns the row count written.
    pub async fn write_prices_csv<W: Write>(&self, out: W) -> anyhow::Result<u64> {
        let mut writer = csv::Writer::from_writer(out);
        writer.write_record(["id", "watch_id", "asin", "price", "source", "fetched_at"])?;

        let mut after_id = 0i64;
        let mut total = 0u64;
        loop {
            let page = self.store.observations_page(after_id, EXPORT_PAGE).await?;
            let Some(last) = page.last() else {
                break;
            };
            after_id = last.id;

            for obs in &page {
                writer.write_record([
                    obs.id.to_string(),
                    obs.watch_id.to_string(),
                    obs.asin.to_string(),
                    obs.price.as_i64().to_string(),
                    obs.source.as_str().to_string(),
                    iso8601(obs.observed_ms),
                ])?;
                total += 1;
            }
        }

        writer.flush()?;
        debug!(rows = total, "price CSV export complete");
        Ok(total)
    }

    /// Liveness only; must not touch the database.
    pub fn health(&self) -> &'static str {
        "ok"
    }
}

fn iso8601(ms: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(ms)
        .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Secs, true))
        .unwrap_or_default()
}
