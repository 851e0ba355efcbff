//! The individual filter passes. Each consumes the pool and returns the
//! survivors; emptiness is judged by the caller, which names the stage.

use crate::money::{Paise, discount_percent};
use crate::paapi::types::ItemDetail;

/// Keep candidates with a known price at or under the cap. Unknown price is
/// never assumed to pass.
pub(crate) fn budget(pool: Vec<ItemDetail>, max: Paise) -> Vec<ItemDetail> {
    pool.into_iter()
        .filter(|c| c.price.is_some_and(|p| p <= max))
        .collect()
}

/// Case-insensitive substring match on the brand field, falling back to the
/// title when the vendor omitted the brand.
pub(crate) fn brand(pool: Vec<ItemDetail>, wanted: &str) -> Vec<ItemDetail> {
    let needle = wanted.to_lowercase();
    pool.into_iter()
        .filter(|c| {
            let brand_hit = c
                .brand
                .as_deref()
                .is_some_and(|b| b.to_lowercase().contains(&needle));
            let title_hit = c
                .title
                .as_deref()
                .is_some_and(|t| t.to_lowercase().contains(&needle));
            brand_hit || title_hit
        })
        .collect()
}

/// Keep candidates whose discount against the list price meets the floor.
/// Candidates without a list price (or price) are dropped.
pub(crate) fn discount(pool: Vec<ItemDetail>, min: i64) -> Vec<ItemDetail> {
    pool.into_iter()
        .filter(|c| {
            match (c.list_price, c.price) {
                (Some(list), Some(price)) => {
                    discount_percent(list, price).is_some_and(|d| d >= min)
                }
                _ => false,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::model::Asin;

    fn mk(asin: &str, price: Option<i64>, list: Option<i64>) -> ItemDetail {
        let mut item = ItemDetail::pinned(Asin::parse(asin).expect("asin"));
        item.price = price.map(Paise::from_paise);
        item.list_price = list.map(Paise::from_paise);
        item
    }

    #[test]
    fn budget_drops_unknown_and_over_cap() {
        let pool = vec![
            mk("B000000001", Some(2_400_000), None),
            mk("B000000002", None, None),
            mk("B000000003", Some(2_500_001), None),
            mk("B000000004", Some(2_500_000), None),
        ];
        let out = budget(pool, Paise::from_paise(2_500_000));
        let asins: Vec<&str> = out.iter().map(|c| c.asin.as_str()).collect();
        assert_eq!(asins, ["B000000001", "B000000004"]);
    }

    #[test]
    fn brand_matches_field_then_title() {
        let mut by_field = mk("B000000001", None, None);
        by_field.brand = Some("Samsung Electronics".to_string());

        let mut by_title = mk("B000000002", None, None);
        by_title.title = Some("SAMSUNG Odyssey G5".to_string());

        let neither = mk("B000000003", None, None);

        let out = brand(vec![by_field, by_title, neither], "samsung");
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn discount_requires_list_price() {
        let pool = vec![
            mk("B000000001", Some(8_000), Some(10_000)), // 20%
            mk("B000000002", Some(8_500), Some(10_000)), // 15%
            mk("B000000003", Some(8_000), None),         // no list price
        ];
        let out = discount(pool, 20);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].asin.as_str(), "B000000001");
    }

    #[test]
    fn discount_boundary_is_inclusive() {
        let pool = vec![mk("B000000001", Some(8_000), Some(10_000))];
        assert_eq!(discount(pool.clone(), 20).len(), 1);
        assert_eq!(discount(pool, 21).len(), 0);
    }
}
