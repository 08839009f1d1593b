//! Precision-safe decimal newtypes.
//!
//! Prices and sizes travel to the exchange as decimal strings, and the
//! string is part of the signed payload. Every value is therefore carried
//! as an exact `Decimal` and rendered through [`Price::to_wire`] /
//! [`Size::to_wire`], which produce one canonical spelling per value.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, Mul, Sub};
use std::str::FromStr;

const BPS_DENOMINATOR: Decimal = Decimal::from_parts(10_000, 0, 0, false, 0);

/// Canonical wire spelling: no trailing zeros, no trailing dot, no exponent.
fn canonical(value: Decimal) -> String {
    let normalized = value.normalize();
    if normalized.is_zero() {
        // normalize() keeps the sign bit of negative zero
        return "0".to_string();
    }
    normalized.to_string()
}

macro_rules! decimal_newtype {
    ($name:ident) => {
        impl $name {
            pub const ZERO: Self = Self(Decimal::ZERO);

            #[inline]
            pub fn new(value: Decimal) -> Self {
                Self(value)
            }

            #[inline]
            pub fn inner(&self) -> Decimal {
                self.0
            }

            #[inline]
            pub fn is_zero(&self) -> bool {
                self.0.is_zero()
            }

            #[inline]
            pub fn is_positive(&self) -> bool {
                self.0.is_sign_positive() && !self.0.is_zero()
            }

            /// Canonical string used in wire payloads and signature preimages.
            pub fn to_wire(&self) -> String {
                canonical(self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = rust_decimal::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(s.trim().parse()?))
            }
        }

        impl From<Decimal> for $name {
            fn from(d: Decimal) -> Self {
                Self(d)
            }
        }

        impl Add for $name {
            type Output = Self;

            fn add(self, rhs: Self) -> Self::Output {
                Self(self.0 + rhs.0)
            }
        }

        impl Sub for $name {
            type Output = Self;

            fn sub(self, rhs: Self) -> Self::Output {
                Self(self.0 - rhs.0)
            }
        }

        impl Mul<Decimal> for $name {
            type Output = Self;

            fn mul(self, rhs: Decimal) -> Self::Output {
                Self(self.0 * rhs)
            }
        }
    };
}

/// Price with exact decimal precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Price(pub Decimal);

decimal_newtype!(Price);

impl Price {
    /// Shift the price by `bps` basis points, upward when `up` is set.
    ///
    /// Used to turn a reference price into a worst acceptable fill price.
    pub fn offset_bps(&self, bps: u32, up: bool) -> Self {
        let factor = Decimal::from(bps) / BPS_DENOMINATOR;
        if up {
            Self(self.0 * (Decimal::ONE + factor))
        } else {
            Self(self.0 * (Decimal::ONE - factor))
        }
    }
}

/// Size/quantity with exact decimal precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Size(pub Decimal);

decimal_newtype!(Size);

impl Sum for Size {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, |acc, s| acc + s)
    }
}
