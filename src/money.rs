//! Typed money and product identifiers.
//!
//! Every price inside the pipeline is an integer amount of paise. Rupees
//! exist only at the chat boundary (user input, rendered messages); the two
//! conversion functions below are the only places the unit changes.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Integer amount in paise (1/100 rupee).
///
/// Comparing a `Paise` against a raw integer is a type error by
/// construction, which is the point.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Paise(i64);

impl Paise {
    /// Upper bound (exclusive) accepted by the price cache.
    pub const CACHE_LIMIT: Paise = Paise(10_000_000_000);

    pub const fn from_paise(v: i64) -> Self {
        Paise(v)
    }

    /// Boundary conversion: user-supplied whole rupees to paise.
    pub const fn from_rupees(rupees: i64) -> Self {
        Paise(rupees * 100)
    }

    /// Boundary conversion: whole rupees for display.
    pub const fn to_rupees(self) -> i64 {
        self.0 / 100
    }

    pub const fn as_i64(self) -> i64 {
        self.0
    }

    pub const fn is_positive(self) -> bool {
        self.0 > 0
    }
}

impl fmt::Display for Paise {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "₹{}.{:02}", self.0 / 100, (self.0 % 100).abs())
    }
}

/// Integer discount of `price` against `list`, in whole percent (floored).
///
/// `None` when the list price is missing-equivalent (non-positive) or below
/// the selling price. Floor keeps `discount_percent(..) >= d` exact for
/// integer thresholds.
pub fn discount_percent(list: Paise, price: Paise) -> Option<i64> {
    if list.0 <= 0 || price.0 > list.0 {
        return None;
    }
    Some((list.0 - price.0) * 100 / list.0)
}
