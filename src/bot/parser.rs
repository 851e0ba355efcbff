//! Watch-creation text parser.
//!
//! Pulls the structured fields out of a free-text request: pinned ASIN,
//! minimum discount, maximum price (rupees at this boundary, converted to
//! paise exactly once), brand, and the residual keywords. Extraction order
//! matters: the ASIN goes first so its digits can't be misread as a price,
//! the discount before the price so `20%` is never a rupee amount.

use regex::Regex;
use thiserror::Error;

use crate::money::Paise;
use crate::store::model::Asin;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ParseError {
    #[error("no usable fields in watch text")]
    NoUsableFields,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct WatchDraft {
    pub keywords: String,
    pub brand: Option<String>,
    pub max_price: Option<Paise>,
    pub min_discount: Option<i64>,
    pub asin: Option<Asin>,
}

const CURATED_BRANDS: &[&str] = &[
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
    "boat",
    "noise",
    "sony",
    "mi",
    "oneplus",
];

/// All-caps tokens that are formats or units, never brands.
const NOT_BRANDS: &[&str] = &[
    "HZ", "FPS", "QHD", "FHD", "UHD", "HD", "IPS", "VA", "TN", "OLED", "INR", "RS", "TV", "K",
];

const STOPWORDS: &[&str] = &[
    "at", "off", "with", "for", "the", "a", "an", "me", "my", "please", "deal", "deals", "alert",
    "watch", "track", "price", "and", "or",
];

pub struct WatchParser {
    asin: Regex,
    discount: Regex,
    price_marked: Regex,
    price_capped: Regex,
    price_k: Regex,
    number: Regex,
}

impl Default for WatchParser {
    fn default() -> Self {
        Self::new()
    }
}

impl WatchParser {
    pub fn new() -> Self {
        // all patterns are literals; compilation cannot fail at runtime
        Self {
            asin: Regex::new(r"\b([A-Z0-9]{10})\b").expect("static regex"),
            discount: Regex::new(r"(?i)\b(\d{1,2})\s*(?:%|percent|per\s*cent)").expect("static regex"),
            price_marked: Regex::new(r"(?i)(?:₹|\brs\.?\s*|\binr\s*)\s*([\d,]+)\s*(k?)")
                .expect("static regex"),
            price_capped: Regex::new(
                r"(?i)\b(?:under|below|upto|up\s*to|max|budget)\s+(?:₹|rs\.?\s*|inr\s*)?\s*([\d,]+)\s*(k?)",
            )
            .expect("static regex"),
            // two digits minimum so the 4k/8k resolution shorthand stays out
            price_k: Regex::new(r"(?i)\b([\d,]{2,})\s*k\b").expect("static regex"),
            number: Regex::new(r"[\d,]+").expect("static regex"),
        }
    }

    pub fn parse(&self, text: &str) -> Result<WatchDraft, ParseError> {
        let mut working = text.to_string();

        let asin = self.take_asin(&mut working);
        let min_discount = self.take_discount(&mut working);
        let max_price = self.take_price(&mut working);
        let brand = find_brand(&working);
        let keywords = residual_keywords(&working);

        if keywords.is_empty() && asin.is_none() {
            return Err(ParseError::NoUsableFields);
        }

        Ok(WatchDraft {
            keywords,
            brand,
            max_price,
            min_discount,
            asin,
        })
    }

    /// A pinned ASIN is a 10-char uppercase alphanumeric token carrying at
    /// least one digit; the digit requirement keeps all-caps brand words out.
    fn take_asin(&self, working: &mut String) -> Option<Asin> {
        for m in self.asin.find_iter(&working.clone()) {
            let token = m.as_str();
            if !token.chars().any(|c| c.is_ascii_digit()) {
                continue;
            }
            if let Some(asin) = Asin::parse(token) {
                *working = working.replace(token, " ");
                return Some(asin);
            }
        }
        None
    }

    fn take_discount(&self, working: &mut String) -> Option<i64> {
        let caps = self.discount.captures(working)?;
        let value: i64 = caps.get(1)?.as_str().parse().ok()?;
        let matched = caps.get(0)?.as_str().to_string();
        if !(1..=99).contains(&value) {
            return None;
        }
        *working = working.replace(&matched, " ");
        Some(value)
    }

    fn take_price(&self, working: &mut String) -> Option<Paise> {
        for re in [&self.price_capped, &self.price_marked, &self.price_k] {
            if let Some(caps) = re.captures(working) {
                let digits = caps.get(1)?.as_str().replace(',', "");
                let mut rupees: i64 = digits.parse().ok()?;
                if caps.get(2).is_some_and(|k| !k.as_str().is_empty())
                    || std::ptr::eq(re, &self.price_k)
                {
                    rupees *= 1000;
                }
                if rupees <= 0 {
                    return None;
                }
                let matched = caps.get(0)?.as_str().to_string();
                *working = working.replace(&matched, " ");
                return Some(Paise::from_rupees(rupees));
            }
        }
        self.take_bare_price(working)
    }

    /// A plain integer is a price when it is large enough to be one and is
    /// not glued to a unit token (`144hz`, `27 inch`, `1440p`).
    fn take_bare_price(&self, working: &mut String) -> Option<Paise> {
        let snapshot = working.clone();
        for m in self.number.find_iter(&snapshot) {
            let digits = m.as_str().replace(',', "");
            if !(4..=9).contains(&digits.len()) {
                continue;
            }
            let preceded_by_word = snapshot[..m.start()]
                .chars()
                .next_back()
                .is_some_and(|c| c.is_ascii_alphanumeric());
            if preceded_by_word {
                continue;
            }
            // glued letters make it part of a token (1440p, 2160p), not a price
            let glued = snapshot[m.end()..]
                .chars()
                .next()
                .is_some_and(|c| c.is_ascii_alphanumeric());
            if glued {
                continue;
            }
            let rest = snapshot[m.end()..].trim_start().to_lowercase();
            let unit_follows = ["hz", "fps", "inch", "%"]
                .iter()
                .any(|u| rest.starts_with(u));
            if unit_follows {
                continue;
            }
            let rupees: i64 = digits.parse().ok()?;
            if rupees <= 0 {
                continue;
            }
            *working = working.replace(m.as_str(), " ");
            return Some(Paise::from_rupees(rupees));
        }
        None
    }
}

fn find_brand(text: &str) -> Option<String> {
    for token in text.split_whitespace() {
        let cleaned: String = token
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect();
        if cleaned.is_empty() {
            continue;
        }
        if CURATED_BRANDS
            .iter()
            .any(|b| b.eq_ignore_ascii_case(&cleaned))
        {
            return Some(cleaned.to_lowercase());
        }
        // any remaining all-caps token reads as a brand
        let all_caps = cleaned.len() >= 2
            && cleaned.len() <= 9
            && cleaned.chars().all(|c| c.is_ascii_uppercase());
        if all_caps && !NOT_BRANDS.contains(&cleaned.as_str()) {
            return Some(cleaned.to_lowercase());
        }
    }
    None
}

fn residual_keywords(text: &str) -> String {
    text.split_whitespace()
        .filter(|t| {
            let lowered = t.to_lowercase();
            !STOPWORDS.contains(&lowered.as_str())
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> WatchDraft {
        WatchParser::new().parse(text).expect("parses")
    }

    #[test]
    fn rupee_notations_all_agree() {
        let expect = Some(Paise::from_paise(5_000_000));
        for text in [
            "monitor 50k",
            "monitor 50000",
            "monitor ₹50,000",
            "monitor rs. 50000",
            "monitor INR 50000",
        ] {
            assert_eq!(parse(text).max_price, expect, "failed on {text:?}");
        }
    }

    #[test]
    fn capped_phrases_extract_price() {
        assert_eq!(
            parse("samsung monitor under 30000").max_price,
            Some(Paise::from_rupees(30_000))
        );
        assert_eq!(
            parse("gaming monitor under ₹25,000").max_price,
            Some(Paise::from_rupees(25_000))
        );
    }

    #[test]
    fn discount_notations_all_agree() {
        assert_eq!(parse("monitor 20% off").min_discount, Some(20));
        assert_eq!(parse("monitor 20 percent off").min_discount, Some(20));
        assert_eq!(parse("monitor 20 per cent off").min_discount, Some(20));
    }

    #[test]
    fn asin_is_detected_and_removed_from_keywords() {
        let draft = parse("track B0DGXYZ123 for me");
        assert_eq!(draft.asin, Asin::parse("B0DGXYZ123"));
        assert!(!draft.keywords.contains("B0DGXYZ123"));
    }

    #[test]
    fn asin_alone_is_enough() {
        let draft = parse("B0DGXYZ123");
        assert!(draft.asin.is_some());
        assert!(draft.keywords.is_empty());
    }

    #[test]
    fn all_caps_token_reads_as_brand_but_units_do_not() {
        assert_eq!(parse("ZEBRONICS monitor").brand.as_deref(), Some("zebronics"));
        assert_eq!(parse("monitor 144 HZ qhd").brand, None);
    }

    #[test]
    fn curated_brand_is_case_insensitive() {
        assert_eq!(parse("Samsung gaming monitor").brand.as_deref(), Some("samsung"));
        assert_eq!(parse("lg ultragear").brand.as_deref(), Some("lg"));
    }

    #[test]
    fn unit_numbers_are_not_prices() {
        let draft = parse("gaming monitor 144hz 1440p");
        assert_eq!(draft.max_price, None);
    }

    #[test]
    fn combined_request_extracts_every_field() {
        let draft = parse("samsung gaming monitor under ₹35,000 at 25% off");
        assert_eq!(draft.brand.as_deref(), Some("samsung"));
        assert_eq!(draft.max_price, Some(Paise::from_rupees(35_000)));
        assert_eq!(draft.min_discount, Some(25));
        assert!(draft.keywords.contains("gaming monitor"));
    }

    #[test]
    fn empty_and_unusable_text_is_a_parse_failure() {
        let parser = WatchParser::new();
        assert_eq!(parser.parse(""), Err(ParseError::NoUsableFields));
        assert_eq!(parser.parse("   "), Err(ParseError::NoUsableFields));
    }

    #[test]
    fn discount_only_text_has_no_subject() {
        // "20% off" strips down to nothing usable
        assert_eq!(
            WatchParser::new().parse("20% off"),
            Err(ParseError::NoUsableFields)
        );
    }
}
