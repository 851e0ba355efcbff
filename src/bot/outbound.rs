//! Carousel cards and outbound delivery.
//!
//! The core produces card records; the chat transport renders them. The
//! contract guarantees an image URL is either absent or non-empty, and every
//! outbound URL carries the affiliate tag.

use async_trait::async_trait;
use tracing::info;

use crate::money::{Paise, discount_percent};
use crate::paapi::types::ItemDetail;
use crate::selector::FilterStage;
use crate::store::model::{Asin, Watch};

#[derive(Clone, Debug, PartialEq)]
pub struct DealCard {
    pub title: String,
    /// Never `Some("")`; transports degrade a `None` to a text-only card.
    pub image_url: Option<String>,
    pub price: Paise,
    pub list_price: Option<Paise>,
    pub url: String,
    pub click_token: String,
}

impl DealCard {
    /// Discount in whole percent; zero when there is no list price.
    pub fn discount(&self) -> i64 {
        self.list_price
            .and_then(|list| discount_percent(list, self.price))
            .unwrap_or(0)
    }
}

pub fn affiliate_url(marketplace_host: &str, asin: &Asin, tag: &str) -> String {
    format!("https://{marketplace_host}/dp/{asin}?tag={tag}&linkCode=ogi&th=1&psc=1")
}

pub fn build_card(
    item: &ItemDetail,
    price: Paise,
    watch: &Watch,
    marketplace_host: &str,
    affiliate_tag: &str,
) -> DealCard {
    DealCard {
        title: item
            .title
            .clone()
            .unwrap_or_else(|| item.asin.to_string()),
        image_url: item.image_url.clone().filter(|u| !u.is_empty()),
        price,
        list_price: item.list_price,
        url: affiliate_url(marketplace_host, &item.asin, affiliate_tag),
        click_token: format!("clk:{}:{}", watch.watch_id, item.asin),
    }
}

/// Templated no-match message: what was tried, what to adjust.
pub fn render_no_match(stage: &FilterStage) -> String {
    match stage {
        FilterStage::Search => {
            "No products found for those keywords. Try simpler or broader terms.".to_string()
        }
        FilterStage::Budget { max_price } => format!(
            "No products under ₹{} right now. Raise the budget or broaden the keywords to see more.",
            max_price.to_rupees()
        ),
        FilterStage::Brand { brand } => {
            format!("No {brand} products matched. Drop the brand or widen the keywords.")
        }
        FilterStage::Discount { min_discount } => format!(
            "No deals at {min_discount}% off or better today. Lower the discount bar or check back tomorrow."
        ),
    }
}

/// Templated clarification for unusable watch text.
pub fn render_clarify() -> String {
    "I couldn't find a product, budget, discount or ASIN in that. \
     Try something like \"samsung monitor under 30k\" or paste a product ASIN."
        .to_string()
}

/// Delivery seam to the chat transport; mocked in tests.
#[async_trait]
pub trait ChatOutbound: Send + Sync {
    /// One-or-many-card carousel for a user.
    async fn send_carousel(&self, user_id: i64, cards: Vec<DealCard>) -> anyhow::Result<()>;

    /// Plain templated message (no-match, clarification).
    async fn send_notice(&self, user_id: i64, text: String) -> anyhow::Result<()>;
}

/// Stand-in transport that logs deliveries; the real chat adapter plugs in
/// behind the same trait.
pub struct TracingOutbound;

#[async_trait]
impl ChatOutbound for TracingOutbound {
    async fn send_carousel(&self, user_id: i64, cards: Vec<DealCard>) -> anyhow::Result<()> {
        info!(
            user_id,
            cards = cards.len(),
            first = cards.first().map(|c| c.title.as_str()).unwrap_or(""),
            "carousel delivered"
        );
        Ok(())
    }

    async fn send_notice(&self, user_id: i64, text: String) -> anyhow::Result<()> {
        info!(user_id, %text, "notice delivered");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::model::WatchMode;
    use uuid::Uuid;

    fn mk_watch() -> Watch {
        Watch {
            watch_id: Uuid::new_v4(),
            user_id: 7,
            keywords: "monitor".to_string(),
            brand: None,
            max_price: None,
            min_discount: None,
            asin: None,
            mode: WatchMode::Daily,
            created_ms: 0,
        }
    }

    fn mk_item(image: Option<&str>) -> ItemDetail {
        let mut item = ItemDetail::pinned(Asin::parse("B0DGXYZ123").expect("asin"));
        item.title = Some("LG Ultragear 27GP850".to_string());
        item.image_url = image.map(str::to_string);
        item.list_price = Some(Paise::from_paise(4_000_000));
        item
    }

    #[test]
    fn affiliate_url_has_the_expected_shape() {
        let asin = Asin::parse("B0DGXYZ123").expect("asin");
        assert_eq!(
            affiliate_url("www.amazon.in", &asin, "mandi-21"),
            "https://www.amazon.in/dp/B0DGXYZ123?tag=mandi-21&linkCode=ogi&th=1&psc=1"
        );
    }

    #[test]
    fn empty_image_url_becomes_none() {
        let card = build_card(
            &mk_item(Some("")),
            Paise::from_paise(3_200_000),
            &mk_watch(),
            "www.amazon.in",
            "mandi-21",
        );
        assert_eq!(card.image_url, None);
    }

    #[test]
    fn card_discount_derives_from_list_price() {
        let card = build_card(
            &mk_item(Some("https://img.example/x.jpg")),
            Paise::from_paise(3_200_000),
            &mk_watch(),
            "www.amazon.in",
            "mandi-21",
        );
        assert_eq!(card.discount(), 20);
        assert_eq!(card.image_url.as_deref(), Some("https://img.example/x.jpg"));
    }

    #[test]
    fn no_match_messages_name_the_constraint() {
        let budget = render_no_match(&FilterStage::Budget {
            max_price: Paise::from_rupees(25_000),
        });
        assert!(budget.contains("₹25000"));

        let discount = render_no_match(&FilterStage::Discount { min_discount: 30 });
        assert!(discount.contains("30%"));

        let brand = render_no_match(&FilterStage::Brand {
            brand: "samsung".to_string(),
        });
        assert!(brand.contains("samsung"));
    }
}
