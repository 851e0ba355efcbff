//! Filter cascade and top-1 selection.
//!
//! The cascade is strict and left-biased: budget, brand, discount, then
//! feature re-rank. Filters never relax; an empty survivor set at any stage
//! short-circuits into a `NoMatch` naming that stage, and callers must
//! surface it rather than fall back to an unfiltered choice. All price
//! comparisons happen in paise.

mod filters;

use std::cmp::Ordering;
use std::sync::Arc;

use tracing::debug;

use crate::matcher::{CategoryMatcher, FeatureVector, MatchScore};
use crate::money::Paise;
use crate::paapi::types::ItemDetail;
use crate::store::model::Watch;

/// The filter that emptied the pool, with the context presentation needs.
#[derive(Clone, Debug, PartialEq)]
pub enum FilterStage {
    /// The candidate pool was empty before any filter ran.
    Search,
    Budget {
        max_price: Paise,
    },
    Brand {
        brand: String,
    },
    Discount {
        min_discount: i64,
    },
}

impl FilterStage {
    pub fn name(&self) -> &'static str {
        match self {
            FilterStage::Search => "search",
            FilterStage::Budget { .. } => "budget",
            FilterStage::Brand { .. } => "brand",
            FilterStage::Discount { .. } => "discount",
        }
    }
}

#[derive(Clone, Debug)]
pub struct RankedPick {
    pub item: ItemDetail,
    /// Present when the feature matcher re-ranked; `None` means vendor
    /// order decided.
    pub score: Option<MatchScore>,
}

/// Outcome of one selection run. Never a null-plus-sentinel pair: callers
/// pattern-match.
#[derive(Clone, Debug)]
pub enum Selection {
    Match(Box<RankedPick>),
    NoMatch { stage: FilterStage },
}

pub struct Selector {
    matcher: Arc<dyn CategoryMatcher>,
}

impl Selector {
    pub fn new(matcher: Arc<dyn CategoryMatcher>) -> Self {
        Self { matcher }
    }

    pub fn select(&self, watch: &Watch, candidates: Vec<ItemDetail>) -> Selection {
        if candidates.is_empty() {
            return Selection::NoMatch {
                stage: FilterStage::Search,
            };
        }

        let mut pool = candidates;

        if let Some(max_price) = watch.max_price {
            pool = filters::budget(pool, max_price);
            if pool.is_empty() {
                return Selection::NoMatch {
                    stage: FilterStage::Budget { max_price },
                };
            }
        }

        if let Some(wanted) = &watch.brand {
            pool = filters::brand(pool, wanted);
            if pool.is_empty() {
                return Selection::NoMatch {
                    stage: FilterStage::Brand {
                        brand: wanted.clone(),
                    },
                };
            }
        }

        if let Some(min_discount) = watch.min_discount {
            pool = filters::discount(pool, min_discount);
            if pool.is_empty() {
                return Selection::NoMatch {
                    stage: FilterStage::Discount { min_discount },
                };
            }
        }

        let query = self.matcher.extract_query(&watch.keywords);
        if self.is_technical(&query, &watch.keywords) {
            debug!(
                features = query.feature_count(),
                survivors = pool.len(),
                "technical query; feature re-rank"
            );
            return Selection::Match(Box::new(self.rank(&query, pool)));
        }

        // non-technical query: vendor relevance order stands
        let Some(item) = pool.into_iter().next() else {
            return Selection::NoMatch {
                stage: FilterStage::Search,
            };
        };
        Selection::Match(Box::new(RankedPick { item, score: None }))
    }

    /// A query is technical with two extracted features, or one feature plus
    /// an explicit category indicator. Zero features never re-ranks.
    fn is_technical(&self, query: &FeatureVector, keywords: &str) -> bool {
        let n = query.feature_count();
        n >= 2 || (n >= 1 && self.matcher.is_category_text(keywords))
    }

    fn rank(&self, query: &FeatureVector, pool: Vec<ItemDetail>) -> RankedPick {
        let mut scored: Vec<Scored> = pool
            .into_iter()
            .map(|item| {
                let product = self.matcher.extract_product(&item);
                let score = self.matcher.score(query, &product);
                Scored {
                    item,
                    product,
                    score,
                }
            })
            .collect();

        scored.sort_by(rank_order);

        // pool is non-empty by construction
        let best = scored.remove(0);
        RankedPick {
            item: best.item,
            score: Some(best.score),
        }
    }
}

struct Scored {
    item: ItemDetail,
    product: FeatureVector,
    score: MatchScore,
}

/// Deterministic ordering for equal-scoring candidates: higher refresh,
/// higher resolution class, lower price, larger review count, ASIN
/// lexicographic.
fn rank_order(a: &Scored, b: &Scored) -> Ordering {
    b.score
        .total
        .total_cmp(&a.score.total)
        .then_with(|| {
            b.product
                .refresh_hz
                .unwrap_or(0)
                .cmp(&a.product.refresh_hz.unwrap_or(0))
        })
        .then_with(|| b.product.resolution.cmp(&a.product.resolution))
        .then_with(|| {
            let price = |s: &Scored| s.item.price.map(Paise::as_i64).unwrap_or(i64::MAX);
            price(a).cmp(&price(b))
        })
        .then_with(|| {
            b.item
                .review_count
                .unwrap_or(0)
                .cmp(&a.item.review_count.unwrap_or(0))
        })
        .then_with(|| a.item.asin.cmp(&b.item.asin))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::{FeatureVerdict, GamingMonitorMatcher};
    use crate::store::model::{Asin, WatchMode};
    use uuid::Uuid;

    fn mk_watch(keywords: &str) -> Watch {
        Watch {
            watch_id: Uuid::new_v4(),
            user_id: 1,
            keywords: keywords.to_string(),
            brand: None,
            max_price: None,
            min_discount: None,
            asin: None,
            mode: WatchMode::Daily,
            created_ms: 0,
        }
    }

    fn mk_item(asin: &str, title: &str, price: i64) -> ItemDetail {
        let mut item = ItemDetail::pinned(Asin::parse(asin).expect("asin"));
        item.title = Some(title.to_string());
        item.price = Some(Paise::from_paise(price));
        item
    }

    fn selector() -> Selector {
        Selector::new(Arc::new(GamingMonitorMatcher::new()))
    }

    #[test]
    fn empty_pool_is_no_match_at_search() {
        let sel = selector().select(&mk_watch("gaming monitor"), vec![]);
        match sel {
            Selection::NoMatch { stage } => assert_eq!(stage.name(), "search"),
            Selection::Match(_) => panic!("expected no-match"),
        }
    }

    #[test]
    fn budget_stage_is_named_when_everything_is_over_cap() {
        let mut watch = mk_watch("samsung gaming monitor");
        watch.max_price = Some(Paise::from_paise(2_500_000));

        let pool = vec![
            mk_item("B000000001", "Monitor A", 3_100_000),
            mk_item("B000000002", "Monitor B", 3_400_000),
        ];

        match selector().select(&watch, pool) {
            Selection::NoMatch { stage } => {
                assert_eq!(stage.name(), "budget");
                assert_eq!(
                    stage,
                    FilterStage::Budget {
                        max_price: Paise::from_paise(2_500_000)
                    }
                );
            }
            Selection::Match(_) => panic!("expected budget no-match"),
        }
    }

    #[test]
    fn zero_feature_query_preserves_vendor_order() {
        // "ultrawide deals" extracts nothing; the first survivor wins even
        // though a later candidate would score higher on features
        let pool = vec![
            mk_item("B000000001", "Basic 60Hz office monitor", 1_000_000),
            mk_item("B000000002", "240Hz QHD esports monitor", 1_200_000),
        ];

        match selector().select(&mk_watch("ultrawide deals"), pool) {
            Selection::Match(pick) => {
                assert_eq!(pick.item.asin.as_str(), "B000000001");
                assert!(pick.score.is_none());
            }
            Selection::NoMatch { .. } => panic!("expected a match"),
        }
    }

    #[test]
    fn technical_query_reranks_and_marks_upgrade() {
        // seed case: the 165 Hz candidate wins on the refresh upgrade bonus
        let pool = vec![
            mk_item("B000000001", "144Hz 27 inch QHD gaming monitor", 2_000_000),
            mk_item("B000000002", "165Hz 27 inch QHD gaming monitor", 2_100_000),
        ];

        match selector().select(&mk_watch("gaming monitor 144Hz 27 inch QHD"), pool) {
            Selection::Match(pick) => {
                assert_eq!(pick.item.asin.as_str(), "B000000002");
                let score = pick.score.expect("technical query carries a score");
                assert_eq!(
                    score.report_for("refresh_rate").map(|r| r.verdict),
                    Some(FeatureVerdict::Upgrade)
                );
            }
            Selection::NoMatch { .. } => panic!("expected a match"),
        }
    }

    #[test]
    fn equal_scores_tie_break_on_price_then_asin() {
        let pool = vec![
            mk_item("B000000009", "144Hz QHD monitor", 2_000_000),
            mk_item("B000000001", "144Hz QHD monitor", 2_000_000),
            mk_item("B000000005", "144Hz QHD monitor", 1_900_000),
        ];

        match selector().select(&mk_watch("monitor 144hz qhd"), pool) {
            Selection::Match(pick) => assert_eq!(pick.item.asin.as_str(), "B000000005"),
            Selection::NoMatch { .. } => panic!("expected a match"),
        }
    }

    #[test]
    fn selection_is_deterministic_across_runs() {
        let pool = || {
            vec![
                mk_item("B000000003", "165Hz QHD 27in monitor", 2_200_000),
                mk_item("B000000001", "144Hz QHD 27in monitor", 2_000_000),
                mk_item("B000000002", "165Hz QHD 27in monitor", 2_200_000),
            ]
        };
        let watch = mk_watch("gaming monitor 144hz qhd 27 inch");

        let first = match selector().select(&watch, pool()) {
            Selection::Match(p) => p.item.asin.clone(),
            Selection::NoMatch { .. } => panic!("expected match"),
        };
        for _ in 0..5 {
            match selector().select(&watch, pool()) {
                Selection::Match(p) => assert_eq!(p.item.asin, first),
                Selection::NoMatch { .. } => panic!("expected match"),
            }
        }
    }
}
