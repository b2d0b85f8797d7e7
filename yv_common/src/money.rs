use std::{
    fmt::Display,
    iter::Sum,
    ops::{Add, Mul, Neg, Sub, SubAssign},
};

use serde::{Deserialize, Serialize};
use sqlx::Type;
use thiserror::Error;

use crate::op;

pub const USD_CURRENCY_CODE: &str = "USD";
pub const USD_CURRENCY_CODE_LOWER: &str = "usd";

//--------------------------------------     UsdCents       ----------------------------------------------------------
/// A USD amount in minor units (cents). All ledger arithmetic is integer arithmetic on this type.
#[derive(Debug, Clone, Copy, Default, Type, Ord, PartialOrd, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct UsdCents(i64);

op!(binary UsdCents, Add, add);
op!(binary UsdCents, Sub, sub);
op!(inplace UsdCents, SubAssign, sub_assign);
op!(unary UsdCents, Neg, neg);

impl Mul<i64> for UsdCents {
    type Output = Self;

    fn mul(self, rhs: i64) -> Self::Output {
        Self::from(self.value() * rhs)
    }
}

impl Sum for UsdCents {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

#[derive(Debug, Clone, Error)]
#[error("Value cannot be represented in US cents: {0}")]
pub struct UsdCentsConversionError(String);

impl From<i64> for UsdCents {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl PartialEq for UsdCents {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for UsdCents {}

impl TryFrom<u64> for UsdCents {
    type Error = UsdCentsConversionError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        if value > i64::MAX as u64 {
            Err(UsdCentsConversionError(format!("Value {} is too large to convert to UsdCents", value)))
        } else {
            #[allow(clippy::cast_possible_wrap)]
            Ok(Self(value as i64))
        }
    }
}

impl Display for UsdCents {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let cents = self.0.abs();
        write!(f, "{sign}${}.{:02}", cents / 100, cents % 100)
    }
}

impl UsdCents {
    pub const fn value(&self) -> i64 {
        self.0
    }

    pub const fn from_cents(cents: i64) -> Self {
        Self(cents)
    }

    pub const fn from_dollars(dollars: i64) -> Self {
        Self(dollars * 100)
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn display_formats_minor_units() {
        assert_eq!(UsdCents::from_cents(50577).to_string(), "$505.77");
        assert_eq!(UsdCents::from_dollars(500).to_string(), "$500.00");
        assert_eq!(UsdCents::from_cents(-1250).to_string(), "-$12.50");
        assert_eq!(UsdCents::from_cents(7).to_string(), "$0.07");
    }

    #[test]
    fn arithmetic() {
        let a = UsdCents::from_cents(1000);
        let b = UsdCents::from_cents(250);
        assert_eq!(a + b, UsdCents::from_cents(1250));
        assert_eq!(a - b, UsdCents::from_cents(750));
        assert_eq!(b * 4, UsdCents::from_cents(1000));
        assert_eq!(vec![a, b].into_iter().sum::<UsdCents>(), UsdCents::from_cents(1250));
    }
}
