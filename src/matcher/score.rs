//! Weighted feature-fit scoring.
//!
//! Numeric features score full weight within a 15% band of the requested
//! value and decay linearly to zero at 50% deviation. A candidate strictly
//! better on a monotone feature takes a 10% bonus on that feature's
//! contribution. Categorical features score full on exact or compatible
//! upgrade, zero on mismatch. Only features the query actually requested
//! contribute; the report order is fixed, so scoring is deterministic.

use crate::matcher::{FeatureReport, FeatureVector, FeatureVerdict, MatchScore};

pub(crate) const W_REFRESH: f64 = 3.0;
pub(crate) const W_RESOLUTION: f64 = 2.5;
pub(crate) const W_SIZE: f64 = 2.0;
pub(crate) const W_PANEL: f64 = 1.5;
pub(crate) const W_CURVATURE: f64 = 1.0;
pub(crate) const W_BRAND: f64 = 1.0;

const FULL_BAND: f64 = 0.15;
const ZERO_BAND: f64 = 0.50;
const UPGRADE_BONUS: f64 = 1.10;

pub(crate) fn score(query: &FeatureVector, product: &FeatureVector) -> MatchScore {
    let mut reports = Vec::new();

    if let Some(want) = query.refresh_hz {
        let (contribution, verdict) = match product.refresh_hz {
            Some(have) => numeric(f64::from(want), f64::from(have), W_REFRESH),
            None => (0.0, FeatureVerdict::Miss),
        };
        reports.push(FeatureReport {
            feature: "refresh_rate",
            verdict,
            contribution,
        });
    }

    if let Some(want) = query.resolution {
        let (contribution, verdict) = match product.resolution {
            Some(have) if have == want => (W_RESOLUTION, FeatureVerdict::Match),
            Some(have) if have > want => (W_RESOLUTION * UPGRADE_BONUS, FeatureVerdict::Upgrade),
            _ => (0.0, FeatureVerdict::Miss),
        };
        reports.push(FeatureReport {
            feature: "resolution",
            verdict,
            contribution,
        });
    }

    if let Some(want) = query.size_inches {
        let (contribution, verdict) = match product.size_inches {
            Some(have) => numeric(f64::from(want), f64::from(have), W_SIZE),
            None => (0.0, FeatureVerdict::Miss),
        };
        reports.push(FeatureReport {
            feature: "size",
            verdict,
            contribution,
        });
    }

    if let Some(want) = query.panel {
        let (contribution, verdict) = match product.panel {
            Some(have) if have == want => (W_PANEL, FeatureVerdict::Match),
            // compatible upgrade, e.g. IPS offered when TN was requested
            Some(have) if have > want => (W_PANEL, FeatureVerdict::Upgrade),
            _ => (0.0, FeatureVerdict::Miss),
        };
        reports.push(FeatureReport {
            feature: "panel_type",
            verdict,
            contribution,
        });
    }

    if let Some(want) = query.curvature {
        let (contribution, verdict) = match product.curvature {
            Some(have) if have == want => (W_CURVATURE, FeatureVerdict::Match),
            _ => (0.0, FeatureVerdict::Miss),
        };
        reports.push(FeatureReport {
            feature: "curvature",
            verdict,
            contribution,
        });
    }

    if let Some(want) = &query.brand {
        let hit = product
            .brand
            .as_deref()
            .is_some_and(|have| have.eq_ignore_ascii_case(want));
        let (contribution, verdict) = if hit {
            (W_BRAND, FeatureVerdict::Match)
        } else {
            (0.0, FeatureVerdict::Miss)
        };
        reports.push(FeatureReport {
            feature: "brand",
            verdict,
            contribution,
        });
    }

    MatchScore {
        total: reports.iter().map(|r| r.contribution).sum(),
        reports,
    }
}

fn numeric(want: f64, have: f64, weight: f64) -> (f64, FeatureVerdict) {
    let deviation = (have - want).abs() / want;

    let closeness = if deviation <= FULL_BAND {
        1.0
    } else if deviation >= ZERO_BAND {
        0.0
    } else {
        (ZERO_BAND - deviation) / (ZERO_BAND - FULL_BAND)
    };

    if closeness <= 0.0 {
        return (0.0, FeatureVerdict::Miss);
    }

    if have > want {
        (closeness * weight * UPGRADE_BONUS, FeatureVerdict::Upgrade)
    } else if have == want {
        (weight, FeatureVerdict::Match)
    } else {
        (closeness * weight, FeatureVerdict::NearMatch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::{PanelType, ResolutionClass};
    use proptest::prelude::*;

    fn query_144_27_qhd() -> FeatureVector {
        FeatureVector {
            refresh_hz: Some(144),
            size_inches: Some(27.0),
            resolution: Some(ResolutionClass::Qhd),
            ..FeatureVector::default()
        }
    }

    fn product(hz: u32, size: f32, res: ResolutionClass) -> FeatureVector {
        FeatureVector {
            refresh_hz: Some(hz),
            size_inches: Some(size),
            resolution: Some(res),
            ..FeatureVector::default()
        }
    }

    #[test]
    fn exact_match_scores_full_weights() {
        let s = score(&query_144_27_qhd(), &product(144, 27.0, ResolutionClass::Qhd));
        assert_eq!(s.total, W_REFRESH + W_SIZE + W_RESOLUTION);
        assert!(s.reports.iter().all(|r| r.verdict == FeatureVerdict::Match));
    }

    #[test]
    fn upgrade_beats_exact_match_on_refresh() {
        // 165 Hz is within 15% of 144 Hz: full weight plus the upgrade bonus
        let exact = score(&query_144_27_qhd(), &product(144, 27.0, ResolutionClass::Qhd));
        let upgraded = score(&query_144_27_qhd(), &product(165, 27.0, ResolutionClass::Qhd));

        assert!(upgraded.total > exact.total);
        assert_eq!(
            upgraded.report_for("refresh_rate").map(|r| r.verdict),
            Some(FeatureVerdict::Upgrade)
        );
        assert_eq!(
            exact.report_for("refresh_rate").map(|r| r.verdict),
            Some(FeatureVerdict::Match)
        );
    }

    #[test]
    fn numeric_decays_linearly_past_the_band() {
        // 60 Hz against a 144 Hz ask: 58% deviation, past the zero band
        let (c, v) = numeric(144.0, 60.0, W_REFRESH);
        assert_eq!(c, 0.0);
        assert_eq!(v, FeatureVerdict::Miss);

        // 100 Hz: ~30.6% below, inside the decay ramp
        let (c, v) = numeric(144.0, 100.0, W_REFRESH);
        assert!(c > 0.0 && c < W_REFRESH);
        assert_eq!(v, FeatureVerdict::NearMatch);
    }

    #[test]
    fn resolution_upgrade_and_downgrade() {
        let mut q = FeatureVector::default();
        q.resolution = Some(ResolutionClass::Qhd);

        let mut up = FeatureVector::default();
        up.resolution = Some(ResolutionClass::Uhd);
        let s = score(&q, &up);
        assert_eq!(
            s.report_for("resolution").map(|r| r.verdict),
            Some(FeatureVerdict::Upgrade)
        );
        assert_eq!(s.total, W_RESOLUTION * 1.10);

        let mut down = FeatureVector::default();
        down.resolution = Some(ResolutionClass::Fhd);
        assert_eq!(score(&q, &down).total, 0.0);
    }

    #[test]
    fn panel_compatible_upgrade_scores_full_without_bonus() {
        let mut q = FeatureVector::default();
        q.panel = Some(PanelType::Tn);

        let mut p = FeatureVector::default();
        p.panel = Some(PanelType::Ips);

        let s = score(&q, &p);
        assert_eq!(s.total, W_PANEL);
        assert_eq!(
            s.report_for("panel_type").map(|r| r.verdict),
            Some(FeatureVerdict::Upgrade)
        );
    }

    #[test]
    fn unrequested_features_do_not_contribute() {
        let q = FeatureVector::default();
        let p = product(240, 32.0, ResolutionClass::Uhd);
        let s = score(&q, &p);
        assert_eq!(s.total, 0.0);
        assert!(s.reports.is_empty());
    }

    #[test]
    fn product_missing_a_requested_feature_is_a_miss() {
        let q = query_144_27_qhd();
        let p = FeatureVector::default();
        let s = score(&q, &p);
        assert_eq!(s.total, 0.0);
        assert_eq!(s.reports.len(), 3);
        assert!(s.reports.iter().all(|r| r.verdict == FeatureVerdict::Miss));
    }

    proptest! {
        #[test]
        fn scoring_is_deterministic_and_bounded(
            q_hz in 60u32..=360,
            p_hz in 30u32..=500,
            p_size in 15.0f32..=65.0,
        ) {
            let q = FeatureVector {
                refresh_hz: Some(q_hz),
                size_inches: Some(27.0),
                ..FeatureVector::default()
            };
            let p = FeatureVector {
                refresh_hz: Some(p_hz),
                size_inches: Some(p_size),
                ..FeatureVector::default()
            };

            let a = score(&q, &p);
            let b = score(&q, &p);
            prop_assert_eq!(&a, &b);

            let max = (W_REFRESH + W_SIZE) * 1.10;
            prop_assert!(a.total >= 0.0 && a.total <= max + 1e-9);
        }
    }
}
