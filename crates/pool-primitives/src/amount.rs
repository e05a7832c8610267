use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Neg, Sub};

/// Signed fixed-precision credit amount.
///
/// Backed by `i128` so that wei-like (10^18 scale) balances never overflow
/// under normal pool operation; arithmetic that would overflow is rejected
/// rather than wrapped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Amount(i128);

/// An arithmetic operation on an [`Amount`] would overflow `i128`.
#[derive(Debug, thiserror::Error)]
#[error("amount overflow")]
pub struct AmountOverflow;

impl Amount {
    pub const ZERO: Amount = Amount(0);

    pub fn new(value: i128) -> Self {
        Self(value)
    }

    pub fn value(self) -> i128 {
        self.0
    }

    pub fn is_negative(self) -> bool {
        self.0 < 0
    }

    pub fn checked_add(self, other: Amount) -> Result<Amount, AmountOverflow> {
        self.0.checked_add(other.0).map(Amount).ok_or(AmountOverflow)
    }

    pub fn checked_sub(self, other: Amount) -> Result<Amount, AmountOverflow> {
        self.0.checked_sub(other.0).map(Amount).ok_or(AmountOverflow)
    }
}

impl Add for Amount {
    type Output = Amount;
    fn add(self, rhs: Amount) -> Amount {
        Amount(self.0 + rhs.0)
    }
}

impl AddAssign for Amount {
    fn add_assign(&mut self, rhs: Amount) {
        self.0 += rhs.0;
    }
}

impl Sub for Amount {
    type Output = Amount;
    fn sub(self, rhs: Amount) -> Amount {
        Amount(self.0 - rhs.0)
    }
}

impl Neg for Amount {
    type Output = Amount;
    fn neg(self) -> Amount {
        Amount(-self.0)
    }
}

impl From<i64> for Amount {
    fn from(value: i64) -> Self {
        Amount(value as i128)
    }
}

impl From<i128> for Amount {
    fn from(value: i128) -> Self {
        Amount(value)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credit_and_debit() {
        let a = Amount::from(100i64);
        let b = Amount::from(-40i64);
        assert_eq!((a + b).value(), 60);
        assert!(b.is_negative());
    }

    #[test]
    fn large_scale_values_fit() {
        // 10^18-scale wei-like value.
        let wei = Amount::new(1_000_000_000_000_000_000_i128);
        assert_eq!(wei.checked_add(wei).unwrap().value(), 2_000_000_000_000_000_000);
    }

    #[test]
    fn overflow_is_rejected() {
        let max = Amount::new(i128::MAX);
        assert!(max.checked_add(Amount::new(1)).is_err());
    }
}
