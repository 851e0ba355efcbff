use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use rand::Rng;
use tracing::{debug, instrument, warn};

use crate::config::AppConfig;
use crate::governor::RateGovernor;
use crate::metrics::counters::Counters;
use crate::paapi::ProductSource;
use crate::paapi::errors::PaapiError;
use crate::paapi::sign;
use crate::paapi::types::{
    GetItemsEnvelope, GetItemsPayload, ItemDetail, ResourceBundle, SearchEnvelope,
    SearchItemsPayload, SearchRequest, WireError,
};
use crate::store::model::Asin;

/// Vendor hard limit on items per search page.
pub const MAX_PAGE_SIZE: u8 = 10;

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_RETRIES: u32 = 3;

/// Typed client for the product-advertising API.
///
/// Every call acquires the governor first; throttle responses feed back into
/// it. Network trouble and 5xx are retried with jittered exponential
/// back-off; throttle and quota are surfaced untouched so the caller can
/// fail over.
pub struct PaapiClient {
    http: reqwest::Client,
    governor: Arc<RateGovernor>,
    counters: Counters,
    endpoint: String,
    host: String,
    region: String,
    access_key: String,
    secret_key: String,
    partner_tag: String,
    marketplace: String,
}

impl PaapiClient {
    pub fn new(
        governor: Arc<RateGovernor>,
        counters: Counters,
        cfg: &AppConfig,
    ) -> Result<Self, PaapiError> {
        let http = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .pool_idle_timeout(Duration::from_secs(30))
            .tcp_keepalive(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            http,
            governor,
            counters,
            endpoint: format!("https://{}", cfg.api_host),
            host: cfg.api_host.clone(),
            region: cfg.api_region.clone(),
            access_key: cfg.api_access_key.clone(),
            secret_key: cfg.api_secret_key.clone(),
            partner_tag: cfg.affiliate_tag.clone(),
            marketplace: cfg.marketplace_host.clone(),
        })
    }

    /// Point the client at a different endpoint (local mock servers).
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        let endpoint = endpoint.into();
        self.host = endpoint
            .trim_start_matches("https://")
            .trim_start_matches("http://")
            .trim_end_matches('/')
            .to_string();
        self.endpoint = endpoint.trim_end_matches('/').to_string();
        self
    }

    async fn post_operation(
        &self,
        operation: &'static str,
        path: &'static str,
        payload: String,
    ) -> Result<String, PaapiError> {
        let mut delay = Duration::from_secs(1);
        let mut attempt: u32 = 0;

        loop {
            self.governor.acquire().await?;
            Counters::bump(&self.counters.api_calls);

            match self.post_once(operation, path, &payload).await {
                Ok(body) => return Ok(body),
                Err(err) if err.is_transient() && attempt < MAX_RETRIES => {
                    attempt += 1;
                    let jitter = Duration::from_millis(rand::rng().random_range(0..=500));
                    let wait = delay.saturating_sub(Duration::from_millis(250)) + jitter;
                    warn!(
                        operation,
                        attempt,
                        wait_ms = wait.as_millis() as u64,
                        error = %err,
                        "transient API failure; retrying"
                    );
                    tokio::time::sleep(wait).await;
                    delay *= 2;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn post_once(
        &self,
        operation: &'static str,
        path: &'static str,
        payload: &str,
    ) -> Result<String, PaapiError> {
        let amz_target = format!("com.amazon.paapi5.v1.ProductAdvertisingAPIv1.{operation}");
        let signed = sign::sign(
            &self.access_key,
            &self.secret_key,
            &self.region,
            &self.host,
            path,
            &amz_target,
            payload,
            Utc::now(),
        );

        let resp = self
            .http
            .post(format!("{}{}", self.endpoint, path))
            .header("content-encoding", "amz-1.0")
            .header("content-type", "application/json; charset=utf-8")
            .header("x-amz-date", &signed.amz_date)
            .header("x-amz-target", &amz_target)
            .header("authorization", &signed.authorization)
            .body(payload.to_string())
            .send()
            .await?;

        let status = resp.status().as_u16();

        if status == 429 {
            self.governor.note_throttled();
            Counters::bump(&self.counters.throttle_events);
            return Err(PaapiError::Throttled);
        }

        let body = resp.text().await?;

        if status == 503 && body.to_ascii_lowercase().contains("quota") {
            return Err(PaapiError::QuotaExhausted);
        }
        if status >= 500 {
            return Err(PaapiError::Status(status));
        }
        if !(200..300).contains(&status) {
            debug!(operation, status, "vendor rejected request");
            return Err(PaapiError::Status(status));
        }

        Ok(body)
    }
}

#[async_trait]
impl ProductSource for PaapiClient {
    #[instrument(skip(self), fields(asin = %asin), level = "debug")]
    async fn get_item(
        &self,
        asin: &Asin,
        bundle: ResourceBundle,
    ) -> Result<ItemDetail, PaapiError> {
        let payload = serde_json::to_string(&GetItemsPayload {
            item_ids: vec![asin.as_str()],
            resources: bundle.resources(),
            partner_tag: &self.partner_tag,
            partner_type: "Associates",
            marketplace: &self.marketplace,
        })?;

        let body = self
            .post_operation("GetItems", "/paapi5/getitems", payload)
            .await?;
        let envelope: GetItemsEnvelope = serde_json::from_str(&body)?;

        if let Some(item) = envelope
            .items_result
            .and_then(|r| r.items.into_iter().next())
        {
            if let Some(detail) = item.normalize() {
                debug!(price = ?detail.price, "item fetched");
                return Ok(detail);
            }
        }

        Err(classify_errors(envelope.errors, asin.as_str()))
    }

    #[instrument(
        skip(self, req),
        fields(keywords = %req.keywords, page = req.page),
        level = "debug"
    )]
    async fn search(&self, req: &SearchRequest) -> Result<Vec<ItemDetail>, PaapiError> {
        // Only the lower price bound goes to the vendor: when MinPrice and
        // MaxPrice are combined the vendor silently ignores MaxPrice, so the
        // user's cap is enforced client-side by the budget filter instead.
        let payload = serde_json::to_string(&SearchItemsPayload {
            keywords: &req.keywords,
            search_index: req.search_index.as_deref().unwrap_or("All"),
            item_page: req.page.max(1),
            item_count: req.item_count.clamp(1, MAX_PAGE_SIZE),
            resources: req.bundle.resources(),
            min_price: req.min_price.map(|p| p.as_i64()),
            partner_tag: &self.partner_tag,
            partner_type: "Associates",
            marketplace: &self.marketplace,
        })?;

        let body = self
            .post_operation("SearchItems", "/paapi5/searchitems", payload)
            .await?;
        let envelope: SearchEnvelope = serde_json::from_str(&body)?;

        match envelope.search_result {
            Some(result) => {
                let items: Vec<ItemDetail> = result
                    .items
                    .into_iter()
                    .filter_map(|i| i.normalize())
                    .collect();
                debug!(count = items.len(), "search page fetched");
                Ok(items)
            }
            None => {
                let errors = envelope.errors.unwrap_or_default();
                if errors.iter().any(|e| e.code == "NoResults") {
                    return Ok(Vec::new());
                }
                Err(classify_errors(Some(errors), &req.keywords))
            }
        }
    }
}

fn classify_errors(errors: Option<Vec<WireError>>, subject: &str) -> PaapiError {
    let errors = errors.unwrap_or_default();
    if errors.iter().any(|e| e.code.contains("ItemNotAccessible")) {
        return PaapiError::ItemNotAccessible(subject.to_string());
    }
    match errors.into_iter().next() {
        Some(e) => PaapiError::Vendor(e.code),
        None => PaapiError::Vendor("EmptyResponse".to_string()),
    }
}
