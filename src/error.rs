use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("required configuration missing: {0}")]
    ConfigMissing(&'static str),
}

/// Optional forwarding of unhandled failures to an external collector.
///
/// When no DSN is configured every call is a no-op; delivery is
/// fire-and-forget and never blocks the failing path.
#[derive(Clone)]
pub struct ErrorReporter {
    dsn: Option<Arc<str>>,
    http: reqwest::Client,
}

impl ErrorReporter {
    pub fn new(dsn: Option<String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap_or_default();

        Self {
            dsn: dsn.map(Arc::from),
            http,
        }
    }

    pub fn disabled() -> Self {
        Self::new(None)
    }

    /// Forward an unhandled error, tagged with the component it escaped from.
    pub fn notify(&self, component: &'static str, err: &anyhow::Error) {
        let Some(dsn) = self.dsn.clone() else {
            return;
        };

        let body = serde_json::json!({
            "component": component,
            "error": format!("{err:#}"),
            "ts_ms": crate::time::now_ms(),
        });

        let http = self.http.clone();
        tokio::spawn(async move {
            if let Err(e) = http.post(dsn.as_ref()).json(&body).send().await {
                tracing::debug!(error = %e, "error report delivery failed");
            }
        });
    }
}
