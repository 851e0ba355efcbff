use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::money::Paise;
use crate::store::model::Asin;

/// Preset resource selections, smallest payload first.
///
/// The cache-refresh path only needs an offer and a title; watch creation
/// wants the text used for feature extraction as well.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResourceBundle {
    Minimal,
    Detailed,
    Full,
}

impl ResourceBundle {
    pub fn resources(self) -> &'static [&'static str] {
        match self {
            ResourceBundle::Minimal => &["Offers.Listings.Price", "ItemInfo.Title"],
            ResourceBundle::Detailed => &[
                "Offers.Listings.Price",
                "Offers.Listings.SavingBasis",
                "ItemInfo.Title",
                "ItemInfo.ByLineInfo",
                "ItemInfo.Features",
                "Images.Primary.Medium",
            ],
            ResourceBundle::Full => &[
                "Offers.Listings.Price",
                "Offers.Listings.SavingBasis",
                "ItemInfo.Title",
                "ItemInfo.ByLineInfo",
                "ItemInfo.Features",
                "ItemInfo.TechnicalInfo",
                "Images.Primary.Medium",
                "CustomerReviews.Count",
            ],
        }
    }
}

/// One page of a keyword search.
#[derive(Clone, Debug)]
pub struct SearchRequest {
    pub keywords: String,
    pub search_index: Option<String>,
    /// 1-based page number.
    pub page: u8,
    /// Clamped to the vendor's 10-per-page hard limit by the client.
    pub item_count: u8,
    pub bundle: ResourceBundle,
    /// Lower price bound, forwarded to the vendor. There is intentionally no
    /// upper bound here; see the client for why.
    pub min_price: Option<Paise>,
}

/// Normalized per-item detail used by the whole pipeline.
#[derive(Clone, Debug, PartialEq)]
pub struct ItemDetail {
    pub asin: Asin,
    pub title: Option<String>,
    pub brand: Option<String>,
    /// Normalized: never `Some("")`.
    pub image_url: Option<String>,
    pub price: Option<Paise>,
    pub list_price: Option<Paise>,
    pub features: Vec<String>,
    pub technical: BTreeMap<String, String>,
    pub review_count: Option<u32>,
}

impl ItemDetail {
    /// Placeholder for a pinned-ASIN watch; enrichment fills the rest.
    pub fn pinned(asin: Asin) -> Self {
        ItemDetail {
            asin,
            title: None,
            brand: None,
            image_url: None,
            price: None,
            list_price: None,
            features: Vec::new(),
            technical: BTreeMap::new(),
            review_count: None,
        }
    }

    /// Concatenated text fields used for feature extraction.
    pub fn descriptive_text(&self) -> String {
        let mut parts: Vec<&str> = Vec::new();
        if let Some(t) = &self.title {
            parts.push(t);
        }
        for f in &self.features {
            parts.push(f);
        }
        let mut text = parts.join(" ");
        for (k, v) in &self.technical {
            text.push(' ');
            text.push_str(k);
            text.push(' ');
            text.push_str(v);
        }
        text
    }
}

/* =========================
Request payloads (wire)
========================= */

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct SearchItemsPayload<'a> {
    pub keywords: &'a str,
    pub search_index: &'a str,
    pub item_page: u8,
    pub item_count: u8,
    pub resources: &'static [&'static str],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_price: Option<i64>,
    pub partner_tag: &'a str,
    pub partner_type: &'static str,
    pub marketplace: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct GetItemsPayload<'a> {
    pub item_ids: Vec<&'a str>,
    pub resources: &'static [&'static str],
    pub partner_tag: &'a str,
    pub partner_type: &'static str,
    pub marketplace: &'a str,
}

/* =========================
Response envelopes (wire)
========================= */

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct SearchEnvelope {
    pub search_result: Option<WireSearchResult>,
    pub errors: Option<Vec<WireError>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct WireSearchResult {
    #[serde(default)]
    pub items: Vec<WireItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct GetItemsEnvelope {
    pub items_result: Option<WireItemsResult>,
    pub errors: Option<Vec<WireError>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct WireItemsResult {
    #[serde(default)]
    pub items: Vec<WireItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct WireError {
    pub code: String,
    #[allow(dead_code)]
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct WireItem {
    #[serde(rename = "ASIN")]
    pub asin: String,
    pub item_info: Option<WireItemInfo>,
    pub offers: Option<WireOffers>,
    pub images: Option<WireImages>,
    pub customer_reviews: Option<WireReviews>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct WireItemInfo {
    pub title: Option<WireDisplay>,
    pub by_line_info: Option<WireByLine>,
    pub features: Option<WireDisplayList>,
    pub technical_info: Option<BTreeMap<String, WireDisplay>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct WireDisplay {
    pub display_value: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct WireDisplayList {
    #[serde(default)]
    pub display_values: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct WireByLine {
    pub brand: Option<WireDisplay>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct WireOffers {
    #[serde(default)]
    pub listings: Vec<WireListing>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct WireListing {
    pub price: Option<WireAmount>,
    pub saving_basis: Option<WireAmount>,
}

/// Vendor amounts arrive as integer paise.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct WireAmount {
    pub amount: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct WireImages {
    pub primary: Option<WireImageSet>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct WireImageSet {
    pub medium: Option<WireImage>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct WireImage {
    #[serde(rename = "URL")]
    pub url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct WireReviews {
    pub count: Option<u32>,
}

impl WireItem {
    /// Normalize a vendor item; returns `None` for a malformed ASIN.
    /// Empty-string fields collapse to `None` here so downstream code never
    /// sees a present-but-blank title, brand or image.
    pub(crate) fn normalize(self) -> Option<ItemDetail> {
        let asin = Asin::parse(&self.asin)?;

        let listing = self
            .offers
            .as_ref()
            .and_then(|o| o.listings.first());
        let price = listing
            .and_then(|l| l.price.as_ref())
            .and_then(|p| p.amount)
            .map(Paise::from_paise);
        let list_price = listing
            .and_then(|l| l.saving_basis.as_ref())
            .and_then(|p| p.amount)
            .map(Paise::from_paise);

        let title = self
            .item_info
            .as_ref()
            .and_then(|i| i.title.as_ref())
            .and_then(|t| t.display_value.clone())
            .filter(|s| !s.is_empty());
        let brand = self
            .item_info
            .as_ref()
            .and_then(|i| i.by_line_info.as_ref())
            .and_then(|b| b.brand.as_ref())
            .and_then(|b| b.display_value.clone())
            .filter(|s| !s.is_empty());
        let features = self
            .item_info
            .as_ref()
            .and_then(|i| i.features.as_ref())
            .map(|f| f.display_values.clone())
            .unwrap_or_default();
        let technical = self
            .item_info
            .and_then(|i| i.technical_info)
            .map(|m| {
                m.into_iter()
                    .filter_map(|(k, v)| v.display_value.map(|val| (k, val)))
                    .collect()
            })
            .unwrap_or_default();

        let image_url = self
            .images
            .and_then(|i| i.primary)
            .and_then(|p| p.medium)
            .and_then(|m| m.url)
            .filter(|u| !u.is_empty());

        let review_count = self.customer_reviews.and_then(|r| r.count);

        Some(ItemDetail {
            asin,
            title,
            brand,
            image_url,
            price,
            list_price,
            features,
            technical,
            review_count,
        })
    }
}
