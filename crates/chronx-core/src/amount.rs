use std::fmt;
use std::ops::{Add, Sub};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::ChronxError;

/// Fixed-point decimal with exactly 8 fractional digits — the sole numeric
/// representation for balances, deltas, amounts and fees (spec §4.3/§6).
/// Addition and subtraction are exact; no rounding is ever performed on
/// the core's own arithmetic (only on construction from a wider input).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Amount(Decimal);

pub const SCALE: u32 = 8;

impl Amount {
    pub const ZERO: Amount = Amount(Decimal::ZERO);

    /// Construct from a `Decimal`, rescaling to exactly 8 fractional digits.
    pub fn new(value: Decimal) -> Self {
        let mut v = value;
        v.rescale(SCALE);
        Self(v)
    }

    /// Parse a canonical decimal string (e.g. "100.00000000").
    pub fn parse(s: &str) -> Result<Self, ChronxError> {
        let d: Decimal = s
            .parse()
            .map_err(|_| ChronxError::InvalidInput(format!("not a valid decimal amount: {s:?}")))?;
        if d.is_sign_negative() {
            return Err(ChronxError::InvalidInput(format!(
                "amount must be non-negative: {s:?}"
            )));
        }
        Ok(Self::new(d))
    }

    pub fn from_i64(v: i64) -> Self {
        Self::new(Decimal::from(v))
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn is_positive(&self) -> bool {
        self.0 > Decimal::ZERO
    }

    pub fn as_decimal(&self) -> Decimal {
        self.0
    }

    /// Canonical 8-dp string encoding used in `SignableData` and ledger
    /// entry hash inputs (spec §6) — no thousands separators, no sign for
    /// non-negative values.
    pub fn to_canonical_string(&self) -> String {
        format!("{:.*}", SCALE as usize, self.0)
    }

    pub fn checked_add(&self, other: Amount) -> Option<Amount> {
        self.0.checked_add(other.0).map(Amount::new)
    }

    pub fn checked_sub(&self, other: Amount) -> Option<Amount> {
        self.0.checked_sub(other.0).map(Amount::new)
    }

    /// `self - other`, `None` if it would go negative.
    pub fn checked_sub_nonneg(&self, other: Amount) -> Option<Amount> {
        if self.0 < other.0 {
            None
        } else {
            self.checked_sub(other)
        }
    }
}

impl Add for Amount {
    type Output = Amount;
    fn add(self, rhs: Amount) -> Amount {
        Amount::new(self.0 + rhs.0)
    }
}

impl Sub for Amount {
    type Output = Amount;
    fn sub(self, rhs: Amount) -> Amount {
        Amount::new(self.0 - rhs.0)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_canonical_string())
    }
}

impl fmt::Debug for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Amount({})", self.to_canonical_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_string_is_8dp() {
        let a = Amount::parse("100").unwrap();
        assert_eq!(a.to_canonical_string(), "100.00000000");
        let b = Amount::parse("10.5").unwrap();
        assert_eq!(b.to_canonical_string(), "10.50000000");
    }

    #[test]
    fn addition_and_subtraction_are_exact() {
        let a = Amount::parse("89.90000000").unwrap();
        let b = Amount::parse("0.10000000").unwrap();
        assert_eq!((a + b).to_canonical_string(), "90.00000000");
        assert_eq!((a - b).to_canonical_string(), "89.80000000");
    }

    #[test]
    fn rejects_negative_input() {
        assert!(Amount::parse("-1.0").is_err());
    }

    #[test]
    fn checked_sub_nonneg_bounds() {
        let a = Amount::parse("1.0").unwrap();
        let b = Amount::parse("2.0").unwrap();
        assert!(a.checked_sub_nonneg(b).is_none());
        assert!(b.checked_sub_nonneg(a).is_some());
    }
}
