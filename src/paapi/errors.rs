use thiserror::Error;

use crate::governor::GovernorError;

#[derive(Error, Debug)]
pub enum PaapiError {
    #[error("throttled by vendor")]
    Throttled,

    #[error("request quota exhausted")]
    QuotaExhausted,

    #[error("item not accessible: {0}")]
    ItemNotAccessible(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("vendor returned status {0}")]
    Status(u16),

    #[error("vendor error: {0}")]
    Vendor(String),

    #[error("payload encode/decode error: {0}")]
    Codec(#[from] serde_json::Error),

    #[error(transparent)]
    Governor(#[from] GovernorError),
}

impl PaapiError {
    /// Worth another attempt after a back-off: network trouble and 5xx.
    /// Throttle and quota are never retried in-client; the caller decides
    /// whether to fail over.
    pub fn is_transient(&self) -> bool {
        match self {
            PaapiError::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            PaapiError::Status(code) => *code >= 500,
            _ => false,
        }
    }

    /// Failures on which the price oracle moves on to the scrape tier.
    pub fn is_fail_over(&self) -> bool {
        matches!(
            self,
            PaapiError::Throttled
                | PaapiError::QuotaExhausted
                | PaapiError::Http(_)
                | PaapiError::Status(_)
                | PaapiError::Governor(_)
                | PaapiError::ItemNotAccessible(_)
        )
    }
}
