//! Candidate enrichment.
//!
//! The vendor's search operation frequently omits offer data; `get_item` is
//! authoritative. For candidates missing a price the service issues serial
//! `get_item` calls (each through the governor), capped per invocation to
//! bound tail latency. A candidate whose detail fetch fails is dropped and
//! the batch continues.

use std::sync::Arc;

use tracing::debug;

use crate::paapi::ProductSource;
use crate::paapi::types::{ItemDetail, ResourceBundle};

/// Per-invocation ceiling on detail fetches.
pub const MAX_ENRICH_PER_RUN: usize = 5;

pub struct EnrichmentService {
    source: Arc<dyn ProductSource>,
}

impl EnrichmentService {
    pub fn new(source: Arc<dyn ProductSource>) -> Self {
        Self { source }
    }

    /// Fill pricing gaps in `candidates`.
    ///
    /// Candidates that already carry a price pass through untouched. Once
    /// the fetch budget is spent, remaining price-less candidates pass
    /// through as-is; downstream filters decide their fate.
    pub async fn enrich(&self, candidates: Vec<ItemDetail>) -> Vec<ItemDetail> {
        let mut budget = MAX_ENRICH_PER_RUN;
        let mut out = Vec::with_capacity(candidates.len());

        for item in candidates {
            if item.price.is_some() || budget == 0 {
                out.push(item);
                continue;
            }

            budget -= 1;
            match self
                .source
                .get_item(&item.asin, ResourceBundle::Detailed)
                .await
            {
                Ok(detail) => out.push(merge(item, detail)),
                Err(e) => {
                    // excluded from the pool; the batch continues
                    debug!(asin = %item.asin, error = %e, "enrichment dropped candidate");
                }
            }
        }

        out
    }
}

/// Prefer authoritative detail fields, keep search fields as fallback.
fn merge(search_item: ItemDetail, detail: ItemDetail) -> ItemDetail {
    ItemDetail {
        asin: search_item.asin,
        title: detail.title.or(search_item.title),
        brand: detail.brand.or(search_item.brand),
        image_url: detail.image_url.or(search_item.image_url),
        price: detail.price.or(search_item.price),
        list_price: detail.list_price.or(search_item.list_price),
        features: if detail.features.is_empty() {
            search_item.features
        } else {
            detail.features
        },
        technical: if detail.technical.is_empty() {
            search_item.technical
        } else {
            detail.technical
        },
        review_count: detail.review_count.or(search_item.review_count),
    }
}
