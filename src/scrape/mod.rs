//! HTML price-scrape fallback.
//!
//! Last tier of the price oracle: fetch the product detail page and pull the
//! price out with an ordered table of selector rules. One rule per page
//! layout keeps extraction auditable; the first rule yielding a positive
//! amount wins.
//!
//! Never the primary source when a fresh cache entry exists, and never
//! called on a chat-callback path.

use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use thiserror::Error;
use tracing::{debug, instrument};

use crate::money::Paise;
use crate::store::model::Asin;

/// Whole-page budget; the detail pages are heavy.
pub const SCRAPE_TIMEOUT: Duration = Duration::from_secs(20);

const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64; rv:128.0) Gecko/20100101 Firefox/128.0";

#[derive(Error, Debug)]
pub enum ScrapeError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("no price found in page for {0}")]
    PriceNotFound(String),

    #[error("selector rules failed to compile: {0}")]
    BadRule(#[from] regex::Error),
}

/// Seam between the oracle and the page scraper; mocked in tests.
#[async_trait]
pub trait PriceScraper: Send + Sync {
    async fn scrape_price(&self, asin: &Asin) -> Result<Paise, ScrapeError>;
}

struct SelectorRule {
    name: &'static str,
    pattern: Regex,
    /// Captured amount unit: whole rupees or rupees with decimals.
    decimal: bool,
}

pub struct PageScraper {
    http: reqwest::Client,
    base_url: String,
    rules: Vec<SelectorRule>,
}

impl PageScraper {
    pub fn new(marketplace_host: &str) -> Result<Self, ScrapeError> {
        let http = reqwest::Client::builder()
            .timeout(SCRAPE_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            http,
            base_url: format!("https://{marketplace_host}"),
            rules: selector_rules()?,
        })
    }

    /// Point the scraper at a different host (local mock servers).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn extract(&self, html: &str) -> Option<(&'static str, Paise)> {
        for rule in &self.rules {
            let Some(caps) = rule.pattern.captures(html) else {
                continue;
            };
            let raw = caps.get(1)?.as_str().replace(',', "");
            let paise = if rule.decimal {
                raw.parse::<f64>().ok().map(|r| (r * 100.0).round() as i64)
            } else {
                raw.parse::<i64>().ok().map(|r| r * 100)
            };
            match paise.map(Paise::from_paise) {
                Some(p) if p.is_positive() => return Some((rule.name, p)),
                // zero/garbage extraction: keep trying the next rule
                _ => continue,
            }
        }
        None
    }
}

fn selector_rules() -> Result<Vec<SelectorRule>, regex::Error> {
    Ok(vec![
        SelectorRule {
            name: "price-whole",
            pattern: Regex::new(r#"a-price-whole[^>]*>\s*([\d,]+)"#)?,
            decimal: false,
        },
        SelectorRule {
            name: "priceblock",
            pattern: Regex::new(r#"priceblock_(?:ourprice|dealprice)[^>]*>\s*₹?\s*([\d,]+)"#)?,
            decimal: false,
        },
        SelectorRule {
            name: "display-price",
            pattern: Regex::new(r#""displayPrice"\s*:\s*"₹\s*([\d,]+)"#)?,
            decimal: false,
        },
        SelectorRule {
            name: "price-amount-json",
            pattern: Regex::new(r#""priceAmount"\s*:\s*([\d.]+)"#)?,
            decimal: true,
        },
    ])
}

#[async_trait]
impl PriceScraper for PageScraper {
    #[instrument(skip(self), fields(asin = %asin), level = "debug")]
    async fn scrape_price(&self, asin: &Asin) -> Result<Paise, ScrapeError> {
        let url = format!("{}/dp/{}", self.base_url, asin);

        let html = self
            .http
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        match self.extract(&html) {
            Some((rule, price)) => {
                debug!(rule, %price, "price scraped");
                Ok(price)
            }
            None => Err(ScrapeError::PriceNotFound(asin.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scraper() -> PageScraper {
        PageScraper::new("www.amazon.in").expect("rules compile")
    }

    #[test]
    fn extracts_whole_rupees_from_price_span() {
        let html = r#"<span class="a-price-whole">31,000</span>"#;
        let (rule, price) = scraper().extract(html).expect("match");
        assert_eq!(rule, "price-whole");
        assert_eq!(price, Paise::from_paise(3_100_000));
    }

    #[test]
    fn extracts_from_priceblock_markup() {
        let html = r#"<span id="priceblock_ourprice" class="x">₹ 24,999</span>"#;
        let (rule, price) = scraper().extract(html).expect("match");
        assert_eq!(rule, "priceblock");
        assert_eq!(price, Paise::from_paise(2_499_900));
    }

    #[test]
    fn extracts_decimal_rupees_from_embedded_json() {
        let html = r#"{"priceAmount":24999.50,"currency":"INR"}"#;
        let (rule, price) = scraper().extract(html).expect("match");
        assert_eq!(rule, "price-amount-json");
        assert_eq!(price, Paise::from_paise(2_499_950));
    }

    #[test]
    fn zero_extraction_falls_through_to_next_rule() {
        let html = r#"
            <span class="a-price-whole">0</span>
            <span id="priceblock_dealprice">₹ 1,499</span>
        "#;
        let (rule, price) = scraper().extract(html).expect("match");
        assert_eq!(rule, "priceblock");
        assert_eq!(price, Paise::from_paise(149_900));
    }

    #[test]
    fn pages_without_price_markup_yield_nothing() {
        assert!(scraper().extract("<html><body>out of stock</body></html>").is_none());
    }
}
