//! Table-driven feature extraction for the gaming-monitor vocabulary.
//!
//! One rule per feature keeps extraction auditable. All matching runs over
//! lowercased text with marketing filler stripped first.

use regex::Regex;

use crate::matcher::{Curvature, FeatureVector, PanelType, ResolutionClass};

/// Smallest and largest believable monitor diagonals, inches.
const SIZE_RANGE: (f32, f32) = (15.0, 65.0);

const BRANDS: &[&str] = &[
    "samsung",
    "lg",
    "dell",
    "hp",
    "acer",
    "asus",
    "msi",
    "benq",
    "zowie",
    "aoc",
    "viewsonic",
    "lenovo",
    "gigabyte",
    "alienware",
];

pub(crate) struct ExtractRules {
    marketing: Regex,
    refresh: Regex,
    size: Regex,
    resolution_uhd: Regex,
    resolution_qhd: Regex,
    resolution_fhd: Regex,
    curved: Regex,
    flat: Regex,
    panel: Regex,
    brand: Regex,
}

impl ExtractRules {
    pub fn new() -> Self {
        // all patterns are literals; compilation cannot fail at runtime
        Self {
            marketing: Regex::new(r"\b(?:stunning|immersive|cinematic|eye[\s-]?care)\b")
                .expect("static regex"),
            // FPS counts as Hz in monitor context
            refresh: Regex::new(r"(\d{2,3})\s*(?:hz|fps)\b").expect("static regex"),
            size: Regex::new(r#"(\d{2}(?:\.\d)?)\s*(?:["″]|(?:\s|-)?inch(?:es)?\b|in\b)"#)
                .expect("static regex"),
            resolution_uhd: Regex::new(r"\b(?:4k|uhd|2160p)\b").expect("static regex"),
            resolution_qhd: Regex::new(r"\b(?:qhd|wqhd|1440p)\b").expect("static regex"),
            resolution_fhd: Regex::new(r"\b(?:fhd|1080p|full\s*hd)\b").expect("static regex"),
            curved: Regex::new(r"\bcurved\b").expect("static regex"),
            flat: Regex::new(r"\bflat\b").expect("static regex"),
            panel: Regex::new(r"\b(ips|va|tn|oled)\b").expect("static regex"),
            brand: Regex::new(&format!(r"\b(?:{})\b", BRANDS.join("|"))).expect("static regex"),
        }
    }

    pub fn extract(&self, text: &str) -> FeatureVector {
        let lowered = text.to_lowercase();
        let cleaned = self.marketing.replace_all(&lowered, " ");

        FeatureVector {
            refresh_hz: self.extract_refresh(&cleaned),
            size_inches: self.extract_size(&cleaned),
            resolution: self.extract_resolution(&cleaned),
            curvature: self.extract_curvature(&cleaned),
            panel: self.extract_panel(&cleaned),
            brand: self.brand.find(&cleaned).map(|m| m.as_str().to_string()),
        }
    }

    fn extract_refresh(&self, text: &str) -> Option<u32> {
        self.refresh
            .captures(text)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse().ok())
    }

    fn extract_size(&self, text: &str) -> Option<f32> {
        let value: f32 = self
            .size
            .captures(text)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse().ok())?;
        (SIZE_RANGE.0..=SIZE_RANGE.1).contains(&value).then_some(value)
    }

    /// When a text mentions several classes the best one wins; titles list
    /// the native resolution ahead of scaler trivia.
    fn extract_resolution(&self, text: &str) -> Option<ResolutionClass> {
        if self.resolution_uhd.is_match(text) {
            Some(ResolutionClass::Uhd)
        } else if self.resolution_qhd.is_match(text) {
            Some(ResolutionClass::Qhd)
        } else if self.resolution_fhd.is_match(text) {
            Some(ResolutionClass::Fhd)
        } else {
            None
        }
    }

    fn extract_curvature(&self, text: &str) -> Option<Curvature> {
        if self.curved.is_match(text) {
            Some(Curvature::Curved)
        } else if self.flat.is_match(text) {
            Some(Curvature::Flat)
        } else {
            None
        }
    }

    fn extract_panel(&self, text: &str) -> Option<PanelType> {
        match self.panel.find(text).map(|m| m.as_str()) {
            Some("tn") => Some(PanelType::Tn),
            Some("va") => Some(PanelType::Va),
            Some("ips") => Some(PanelType::Ips),
            Some("oled") => Some(PanelType::Oled),
            _ => None,
        }
    }
}
