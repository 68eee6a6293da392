//! Integer price representation.
//!
//! Lab test prices are quoted in whole rupees and never carry a fractional
//! part, so a `Price` is a plain non-negative integer. Totals are computed by
//! summing prices, which saturates instead of overflowing.

use core::fmt;
use core::iter::Sum;
use core::ops::Add;

use serde::de::{self, IgnoredAny, MapAccess, SeqAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};

/// A non-negative whole-unit price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Price(u64);

impl Price {
    /// A zero price.
    pub const ZERO: Self = Self(0);

    /// Create a new price.
    #[must_use]
    pub const fn new(amount: u64) -> Self {
        Self(amount)
    }

    /// Get the amount in whole currency units.
    #[must_use]
    pub const fn amount(&self) -> u64 {
        self.0
    }

    /// Format for display (e.g., "₹599").
    #[must_use]
    pub fn display(&self) -> String {
        format!("₹{}", self.0)
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for Price {
    fn from(amount: u64) -> Self {
        Self(amount)
    }
}

impl Add for Price {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0.saturating_add(rhs.0))
    }
}

impl Sum for Price {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}

impl<'a> Sum<&'a Self> for Price {
    fn sum<I: Iterator<Item = &'a Self>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

/// Tolerant deserialization for prices coming from loosely-typed payloads.
///
/// Accepts non-negative integers, non-negative floats (rounded), and numeric
/// strings. Anything else - `null`, negatives, garbage strings, objects - is
/// read as "no price" instead of failing the whole payload.
///
/// ```rust
/// # use medibook_core::Price;
/// #[derive(serde::Deserialize)]
/// struct Item {
///     #[serde(default, deserialize_with = "medibook_core::price::lenient::deserialize")]
///     price: Option<Price>,
/// }
/// ```
pub mod lenient {
    use super::{Deserializer, IgnoredAny, MapAccess, Price, SeqAccess, Visitor, de, fmt};

    struct LenientPrice;

    impl<'de> Visitor<'de> for LenientPrice {
        type Value = Option<Price>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a price")
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
            Ok(Some(Price(v)))
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
            Ok(u64::try_from(v).ok().map(Price))
        }

        #[allow(
            clippy::cast_possible_truncation,
            clippy::cast_precision_loss,
            clippy::cast_sign_loss
        )] // range checked before the cast
        fn visit_f64<E: de::Error>(self, v: f64) -> Result<Self::Value, E> {
            if v.is_finite() && v >= 0.0 && v <= u64::MAX as f64 {
                Ok(Some(Price(v.round() as u64)))
            } else {
                Ok(None)
            }
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
            let trimmed = v.trim();
            if let Ok(n) = trimmed.parse::<u64>() {
                return Ok(Some(Price(n)));
            }
            match trimmed.parse::<f64>() {
                Ok(f) => self.visit_f64(f),
                Err(_) => Ok(None),
            }
        }

        fn visit_bool<E: de::Error>(self, _: bool) -> Result<Self::Value, E> {
            Ok(None)
        }

        fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
            Ok(None)
        }

        fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
            Ok(None)
        }

        fn visit_some<D: Deserializer<'de>>(self, d: D) -> Result<Self::Value, D::Error> {
            d.deserialize_any(Self)
        }

        fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
            while seq.next_element::<IgnoredAny>()?.is_some() {}
            Ok(None)
        }

        fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
            while map.next_entry::<IgnoredAny, IgnoredAny>()?.is_some() {}
            Ok(None)
        }
    }

    /// Deserialize an optional price, mapping malformed values to `None`.
    ///
    /// # Errors
    ///
    /// Only fails when the underlying deserializer itself fails.
    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Price>, D::Error> {
        d.deserialize_any(LenientPrice)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[derive(Deserialize)]
    struct Item {
        #[serde(default, deserialize_with = "lenient::deserialize")]
        price: Option<Price>,
    }

    fn parse(json: &str) -> Option<Price> {
        serde_json::from_str::<Item>(json).unwrap().price
    }

    #[test]
    fn test_sum_of_prices() {
        let total: Price = [Price::new(599), Price::new(899)].iter().sum();
        assert_eq!(total, Price::new(1498));
    }

    #[test]
    fn test_sum_saturates() {
        let total: Price = [Price::new(u64::MAX), Price::new(1)].into_iter().sum();
        assert_eq!(total.amount(), u64::MAX);
    }

    #[test]
    fn test_display() {
        assert_eq!(Price::new(599).display(), "₹599");
        assert_eq!(Price::new(599).to_string(), "599");
    }

    #[test]
    fn test_lenient_accepts_numbers_and_numeric_strings() {
        assert_eq!(parse(r#"{"price": 599}"#), Some(Price::new(599)));
        assert_eq!(parse(r#"{"price": 599.4}"#), Some(Price::new(599)));
        assert_eq!(parse(r#"{"price": " 899 "}"#), Some(Price::new(899)));
    }

    #[test]
    fn test_lenient_maps_garbage_to_none() {
        assert_eq!(parse(r"{}"), None);
        assert_eq!(parse(r#"{"price": null}"#), None);
        assert_eq!(parse(r#"{"price": -5}"#), None);
        assert_eq!(parse(r#"{"price": "free"}"#), None);
        assert_eq!(parse(r#"{"price": {"amount": 5}}"#), None);
        assert_eq!(parse(r#"{"price": [1, 2]}"#), None);
    }
}
