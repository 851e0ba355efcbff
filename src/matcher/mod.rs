//! Category-scoped feature matching.
//!
//! Extracts a typed feature vector from the user's query and from each
//! candidate's descriptive text, then scores candidates by weighted feature
//! fit. The scorer sits behind `CategoryMatcher` so further categories plug
//! in without touching the selector; the bundled category is gaming
//! monitors.

pub mod extract;
mod memo;
pub mod score;

use crate::paapi::types::ItemDetail;

use extract::ExtractRules;
use memo::ExtractionMemo;

/// Ordered resolution classes; the derive order is the quality order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum ResolutionClass {
    Fhd,
    Qhd,
    Uhd,
}

/// Panel technologies, ordered by the usual quality ladder so a better
/// panel counts as a compatible upgrade.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum PanelType {
    Tn,
    Va,
    Ips,
    Oled,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Curvature {
    Flat,
    Curved,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct FeatureVector {
    pub refresh_hz: Option<u32>,
    pub size_inches: Option<f32>,
    pub resolution: Option<ResolutionClass>,
    pub curvature: Option<Curvature>,
    pub panel: Option<PanelType>,
    pub brand: Option<String>,
}

impl FeatureVector {
    pub fn feature_count(&self) -> usize {
        usize::from(self.refresh_hz.is_some())
            + usize::from(self.size_inches.is_some())
            + usize::from(self.resolution.is_some())
            + usize::from(self.curvature.is_some())
            + usize::from(self.panel.is_some())
            + usize::from(self.brand.is_some())
    }
}

/// Per-feature outcome, carried into presentation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FeatureVerdict {
    Match,
    NearMatch,
    Upgrade,
    Miss,
}

#[derive(Clone, Debug, PartialEq)]
pub struct FeatureReport {
    pub feature: &'static str,
    pub verdict: FeatureVerdict,
    pub contribution: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct MatchScore {
    pub total: f64,
    pub reports: Vec<FeatureReport>,
}

impl MatchScore {
    pub fn report_for(&self, feature: &str) -> Option<&FeatureReport> {
        self.reports.iter().find(|r| r.feature == feature)
    }
}

/// One product category's vocabulary and scorer.
pub trait CategoryMatcher: Send + Sync {
    fn category(&self) -> &'static str;

    /// Explicit category indicator in free text, independent of extracted
    /// feature count.
    fn is_category_text(&self, text: &str) -> bool;

    fn extract_query(&self, text: &str) -> FeatureVector;

    fn extract_product(&self, item: &ItemDetail) -> FeatureVector;

    fn score(&self, query: &FeatureVector, product: &FeatureVector) -> MatchScore;
}

/// Bundled category: gaming monitors.
pub struct GamingMonitorMatcher {
    rules: ExtractRules,
    memo: ExtractionMemo,
}

impl Default for GamingMonitorMatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl GamingMonitorMatcher {
    /// Product-side extractions are memoised; query extraction is cheap and
    /// always fresh.
    pub fn new() -> Self {
        Self {
            rules: ExtractRules::new(),
            memo: ExtractionMemo::new(100),
        }
    }
}

impl CategoryMatcher for GamingMonitorMatcher {
    fn category(&self) -> &'static str {
        "gaming monitor"
    }

    fn is_category_text(&self, text: &str) -> bool {
        text.to_lowercase().contains("monitor")
    }

    fn extract_query(&self, text: &str) -> FeatureVector {
        self.rules.extract(text)
    }

    fn extract_product(&self, item: &ItemDetail) -> FeatureVector {
        if let Some(hit) = self.memo.get(&item.asin) {
            return hit;
        }
        let vector = self.rules.extract(&item.descriptive_text());
        self.memo.insert(item.asin.clone(), vector.clone());
        vector
    }

    fn score(&self, query: &FeatureVector, product: &FeatureVector) -> MatchScore {
        score::score(query, product)
    }
}
