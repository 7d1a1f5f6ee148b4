//! # Fixed-Point Rates
//!
//! [`Rate`] is a non-negative decimal with 18 fractional digits, stored as a
//! scaled `u128`. It is the only way ratios enter fee arithmetic: parameters
//! arrive as decimal strings (`"0.2"`), are parsed exactly, and are applied to
//! integer amounts with [`Rate::mul_floor`], which truncates toward zero.
//!
//! Floats are never involved, so every node computes bit-identical splits.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::ValidationError;

/// Number of fractional decimal digits carried by a [`Rate`].
pub const RATE_DECIMALS: u32 = 18;

const SCALE: u128 = 10u128.pow(RATE_DECIMALS);

/// A non-negative fixed-point decimal ratio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Rate(u128);

impl Rate {
    /// `0`.
    pub const ZERO: Self = Self(0);
    /// `1`.
    pub const ONE: Self = Self(SCALE);

    /// Build `numerator / 10^decimals` exactly. `None` if more than 18
    /// fractional digits would be needed or the value overflows.
    pub fn from_parts(numerator: u128, decimals: u32) -> Option<Self> {
        if decimals > RATE_DECIMALS {
            return None;
        }
        numerator
            .checked_mul(10u128.pow(RATE_DECIMALS - decimals))
            .map(Self)
    }

    /// Parse a plain decimal string such as `"0.2"`, `"1"` or `"0.05"`.
    ///
    /// Signs, exponents and more than 18 fractional digits are rejected.
    pub fn parse(s: &str) -> Result<Self, ValidationError> {
        let fail = |reason: &str| ValidationError::InvalidRate {
            value: s.to_string(),
            reason: reason.to_string(),
        };

        let (int_part, frac_part) = s.split_once('.').unwrap_or((s, ""));
        if int_part.is_empty() || !int_part.bytes().all(|b| b.is_ascii_digit()) {
            return Err(fail("integer part must be decimal digits"));
        }
        if s.contains('.') && frac_part.is_empty() {
            return Err(fail("missing fractional digits after '.'"));
        }
        if !frac_part.bytes().all(|b| b.is_ascii_digit()) {
            return Err(fail("fractional part must be decimal digits"));
        }
        if frac_part.len() > RATE_DECIMALS as usize {
            return Err(fail("more than 18 fractional digits"));
        }

        let digits = format!("{int_part}{frac_part}");
        let numerator: u128 = digits.parse().map_err(|_| fail("value out of range"))?;
        // frac_part.len() <= 18 was checked above.
        Self::from_parts(numerator, frac_part.len() as u32).ok_or_else(|| fail("value out of range"))
    }

    /// `floor(amount * self)`. `None` only if the intermediate product or
    /// the result does not fit.
    pub fn mul_floor(&self, amount: u64) -> Option<u64> {
        let product = u128::from(amount).checked_mul(self.0)?;
        u64::try_from(product / SCALE).ok()
    }

    /// Whether `0 <= self <= 1`.
    pub fn is_fraction(&self) -> bool {
        *self <= Self::ONE
    }

    /// Raw scaled representation (`value * 10^18`).
    pub fn scaled(&self) -> u128 {
        self.0
    }
}

impl std::fmt::Display for Rate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let int = self.0 / SCALE;
        let frac = self.0 % SCALE;
        if frac == 0 {
            return write!(f, "{int}");
        }
        let frac = format!("{frac:018}");
        write!(f, "{int}.{}", frac.trim_end_matches('0'))
    }
}

impl std::str::FromStr for Rate {
    type Err = ValidationError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for Rate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Rate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        assert_eq!(Rate::parse("0.2").unwrap().to_string(), "0.2");
        assert_eq!(Rate::parse("1").unwrap(), Rate::ONE);
        assert_eq!(Rate::parse("0").unwrap(), Rate::ZERO);
        assert_eq!(Rate::parse("0.050").unwrap().to_string(), "0.05");
        assert_eq!(Rate::parse("1.5").unwrap().to_string(), "1.5");
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for bad in ["", ".5", "5.", "-0.1", "1e-3", "0.1.2", " 0.1", "0.0000000000000000001"] {
            assert!(Rate::parse(bad).is_err(), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn test_mul_floor_truncates() {
        let half = Rate::parse("0.5").unwrap();
        assert_eq!(half.mul_floor(5), Some(2));
        let fifth = Rate::parse("0.2").unwrap();
        assert_eq!(fifth.mul_floor(7_000_000), Some(1_400_000));
        assert_eq!(fifth.mul_floor(4), Some(0));
        assert_eq!(Rate::ONE.mul_floor(u64::MAX), Some(u64::MAX));
    }

    #[test]
    fn test_is_fraction() {
        assert!(Rate::ZERO.is_fraction());
        assert!(Rate::ONE.is_fraction());
        assert!(!Rate::parse("1.000000000000000001").unwrap().is_fraction());
    }

    #[test]
    fn test_serde_as_string() {
        let r = Rate::parse("0.25").unwrap();
        assert_eq!(serde_json::to_string(&r).unwrap(), "\"0.25\"");
        let back: Rate = serde_json::from_str("\"0.25\"").unwrap();
        assert_eq!(back, r);
        assert!(serde_json::from_str::<Rate>("\"abc\"").is_err());
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn mul_floor_never_exceeds_amount_for_fractions(
                amount in 0u64..=u64::MAX,
                millis in 0u128..=1000,
            ) {
                let rate = Rate::from_parts(millis, 3).unwrap();
                let part = rate.mul_floor(amount).unwrap();
                prop_assert!(part <= amount);
            }
        }
    }
}
