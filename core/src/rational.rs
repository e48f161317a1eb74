//! Exact rational numbers
//!
//! Every program value and every probability is a [`Rational`]. There is no
//! floating point anywhere in the engine.

use std::fmt;
use std::iter::Sum;
use std::ops::{Add, Mul, Neg, Sub};
use std::str::FromStr;

use num::{BigInt, BigRational, One, Signed, ToPrimitive, Zero};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Arbitrary-precision rational, always in lowest terms.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Rational(BigRational);

impl Rational {
    pub fn zero() -> Self {
        Rational(BigRational::zero())
    }

    pub fn one() -> Self {
        Rational(BigRational::one())
    }

    pub fn from_integer(value: i64) -> Self {
        Rational(BigRational::from_integer(BigInt::from(value)))
    }

    /// Builds `numer / denom`, or `None` when `denom` is zero.
    pub fn new(numer: i64, denom: i64) -> Option<Self> {
        if denom == 0 {
            return None;
        }
        Some(Rational(BigRational::new(
            BigInt::from(numer),
            BigInt::from(denom),
        )))
    }

    pub fn numer(&self) -> &BigInt {
        self.0.numer()
    }

    pub fn denom(&self) -> &BigInt {
        self.0.denom()
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn is_one(&self) -> bool {
        self.0.is_one()
    }

    pub fn is_negative(&self) -> bool {
        self.0.is_negative()
    }

    pub fn is_positive(&self) -> bool {
        self.0.is_positive()
    }

    pub fn is_integer(&self) -> bool {
        self.0.is_integer()
    }

    /// Largest integer not greater than `self`.
    pub fn floor(&self) -> Rational {
        Rational(self.0.floor())
    }

    /// Integer part, rounding toward zero.
    pub fn trunc(&self) -> Rational {
        Rational(self.0.trunc())
    }

    /// `None` on division by zero.
    pub fn checked_div(&self, rhs: &Rational) -> Option<Rational> {
        if rhs.is_zero() {
            None
        } else {
            Some(Rational(&self.0 / &rhs.0))
        }
    }

    /// Remainder whose sign follows the dividend: `l - r * trunc(l / r)`.
    pub fn checked_rem(&self, rhs: &Rational) -> Option<Rational> {
        let quotient = self.checked_div(rhs)?.trunc();
        Some(Rational(&self.0 - &(&rhs.0 * &quotient.0)))
    }

    /// Raises to an integer power; a fractional exponent is truncated toward
    /// zero first. `None` for a zero base with a negative exponent, or an
    /// exponent that does not fit in an `i32`.
    pub fn checked_pow(&self, exponent: &Rational) -> Option<Rational> {
        let exp = exponent.trunc().0.to_integer().to_i32()?;
        if exp < 0 && self.is_zero() {
            return None;
        }
        Some(Rational(self.0.pow(exp)))
    }

    /// Bitwise exclusive or of both operands truncated toward zero.
    pub fn xor(&self, rhs: &Rational) -> Rational {
        let lhs = self.0.trunc().to_integer();
        let rhs = rhs.0.trunc().to_integer();
        Rational(BigRational::from_integer(lhs ^ rhs))
    }

    /// The value as a `u64` if it is a non-negative integer in range.
    pub fn to_u64(&self) -> Option<u64> {
        if self.is_integer() {
            self.0.to_integer().to_u64()
        } else {
            None
        }
    }

    /// Parses an integer, an exact decimal (`0.25`) or a fraction (`1/4`).
    pub fn parse_exact(text: &str) -> Option<Rational> {
        let text = text.trim();
        if let Some((numer, denom)) = text.split_once('/') {
            let numer = Self::parse_exact(numer)?;
            let denom = Self::parse_exact(denom)?;
            return numer.checked_div(&denom);
        }

        let (negative, digits) = match text.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, text),
        };
        let (whole, fraction) = digits.split_once('.').unwrap_or((digits, ""));
        if whole.is_empty() || !whole.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        if !fraction.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }

        let mantissa = BigInt::parse_bytes(format!("{}{}", whole, fraction).as_bytes(), 10)?;
        let scale = num::pow(BigInt::from(10u8), fraction.len());
        let magnitude = BigRational::new(mantissa, scale);
        Some(Rational(if negative { -magnitude } else { magnitude }))
    }
}

impl From<i32> for Rational {
    fn from(value: i32) -> Self {
        Rational::from_integer(i64::from(value))
    }
}

impl From<i64> for Rational {
    fn from(value: i64) -> Self {
        Rational::from_integer(value)
    }
}

impl From<u64> for Rational {
    fn from(value: u64) -> Self {
        Rational(BigRational::from_integer(BigInt::from(value)))
    }
}

impl From<BigRational> for Rational {
    fn from(value: BigRational) -> Self {
        Rational(value)
    }
}

/* ===================== Operators ===================== */

impl Add for &Rational {
    type Output = Rational;
    fn add(self, rhs: &Rational) -> Rational {
        Rational(&self.0 + &rhs.0)
    }
}

impl Add for Rational {
    type Output = Rational;
    fn add(self, rhs: Rational) -> Rational {
        Rational(self.0 + rhs.0)
    }
}

impl Sub for &Rational {
    type Output = Rational;
    fn sub(self, rhs: &Rational) -> Rational {
        Rational(&self.0 - &rhs.0)
    }
}

impl Sub for Rational {
    type Output = Rational;
    fn sub(self, rhs: Rational) -> Rational {
        Rational(self.0 - rhs.0)
    }
}

impl Mul for &Rational {
    type Output = Rational;
    fn mul(self, rhs: &Rational) -> Rational {
        Rational(&self.0 * &rhs.0)
    }
}

impl Mul for Rational {
    type Output = Rational;
    fn mul(self, rhs: Rational) -> Rational {
        Rational(self.0 * rhs.0)
    }
}

impl Neg for &Rational {
    type Output = Rational;
    fn neg(self) -> Rational {
        Rational(-&self.0)
    }
}

impl Neg for Rational {
    type Output = Rational;
    fn neg(self) -> Rational {
        Rational(-self.0)
    }
}

impl Sum for Rational {
    fn sum<I: Iterator<Item = Rational>>(iter: I) -> Self {
        iter.fold(Rational::zero(), |acc, r| acc + r)
    }
}

impl<'a> Sum<&'a Rational> for Rational {
    fn sum<I: Iterator<Item = &'a Rational>>(iter: I) -> Self {
        iter.fold(Rational::zero(), |acc, r| &acc + r)
    }
}

/* ===================== Text Form ===================== */

impl fmt::Display for Rational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_integer() {
            write!(f, "{}", self.0.numer())
        } else {
            write!(f, "{}/{}", self.0.numer(), self.0.denom())
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid rational literal '{0}'")]
pub struct ParseRationalError(pub String);

impl FromStr for Rational {
    type Err = ParseRationalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Rational::parse_exact(s).ok_or_else(|| ParseRationalError(s.to_string()))
    }
}

impl Serialize for Rational {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Rational {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}
