use std::time::Duration;

use chrono::NaiveTime;
use chrono_tz::Tz;

use crate::error::AppError;

#[derive(Clone, Debug)]
pub struct AppConfig {
    /// Database connection string.
    pub database_url: String,

    // =========================
    // External credentials
    // =========================
    /// Token for the chat transport adapter.
    pub chat_bot_token: String,

    /// Product-advertising API key pair.
    pub api_access_key: String,
    pub api_secret_key: String,

    /// Associate tag appended to every outbound product URL.
    pub affiliate_tag: String,

    /// Basic-auth gate for the admin surface.
    pub admin_user: String,
    pub admin_pass: String,

    /// Optional error-forwarding endpoint. Unset disables reporting.
    pub error_reporter_dsn: Option<String>,

    // =========================
    // Vendor endpoints
    // =========================
    /// Storefront host used for detail-page and outbound URLs.
    pub marketplace_host: String,

    /// API host and signing region for the product-advertising API.
    pub api_host: String,
    pub api_region: String,

    // =========================
    // Scheduler configuration
    // =========================
    /// Local zone all firing times are computed in.
    pub timezone: Tz,

    /// Daily-digest firing time (local).
    pub daily_fire: NaiveTime,

    /// Real-time jobs only run inside [wake_start, wake_end); outside the
    /// window ticks are skipped, never queued.
    pub wake_start: NaiveTime,
    pub wake_end: NaiveTime,

    /// Cadence of the real-time job family.
    pub realtime_every: Duration,

    /// Wall-clock budget for a single evaluation run. A run exceeding this
    /// is cancelled and the job returns to its schedule.
    pub job_budget: Duration,

    /// Upper bound on concurrently running evaluations across all watches.
    pub worker_pool: usize,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, AppError> {
        Ok(Self {
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite://mandimonitor_dev.db".to_string()),

            chat_bot_token: require("CHAT_BOT_TOKEN")?,
            api_access_key: require("API_ACCESS_KEY")?,
            api_secret_key: require("API_SECRET_KEY")?,
            affiliate_tag: require("AFFILIATE_TAG")?,
            admin_user: require("ADMIN_USER")?,
            admin_pass: require("ADMIN_PASS")?,
            error_reporter_dsn: std::env::var("ERROR_REPORTER_DSN").ok(),

            marketplace_host: std::env::var("MARKETPLACE_HOST")
                .unwrap_or_else(|_| "www.amazon.in".to_string()),
            api_host: std::env::var("API_HOST")
                .unwrap_or_else(|_| "webservices.amazon.in".to_string()),
            api_region: std::env::var("API_REGION").unwrap_or_else(|_| "eu-west-1".to_string()),

            timezone: std::env::var("TIMEZONE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(chrono_tz::Asia::Kolkata),

            daily_fire: NaiveTime::from_hms_opt(9, 0, 0).expect("valid fire time"),
            wake_start: NaiveTime::from_hms_opt(8, 0, 0).expect("valid wake start"),
            wake_end: NaiveTime::from_hms_opt(23, 0, 0).expect("valid wake end"),
            realtime_every: Duration::from_secs(10 * 60),
            job_budget: Duration::from_secs(120),
            worker_pool: 8,
        })
    }
}

fn require(key: &'static str) -> Result<String, AppError> {
    std::env::var(key).map_err(|_| AppError::ConfigMissing(key))
}
