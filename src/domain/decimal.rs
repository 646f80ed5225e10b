//! Fixed-point decimal with six fractional digits.
//!
//! Values are non-negative and stored as a `u128` numerator over [`SCALE`].
//! Products and quotients go through a 256-bit intermediate so that scaling
//! never overflows before the final narrowing back to 128 bits.

use rust_decimal::Decimal as RustDecimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[allow(clippy::all, missing_docs)]
mod wide {
    uint::construct_uint! {
        pub struct U256(4);
    }
}

use wide::U256;

/// Number of fractional digits carried by [`Decimal`].
pub const DECIMAL_PLACES: u32 = 6;

/// Implicit denominator of every [`Decimal`] numerator.
pub const SCALE: u128 = 1_000_000;

/// Arithmetic invariant violations.
///
/// These are unreachable when the engine is sequenced correctly, so callers
/// treat them as defects rather than recoverable conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MathError {
    #[error("division by zero")]
    DivideByZero,
    #[error("arithmetic underflow")]
    Underflow,
    #[error("arithmetic overflow")]
    Overflow,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecimalParseError {
    #[error("invalid decimal: {0}")]
    Invalid(String),
    #[error("decimal must not be negative")]
    Negative,
    #[error("decimal has more than {DECIMAL_PLACES} fractional digits")]
    TooPrecise,
}

fn narrow(value: U256) -> Result<u128, MathError> {
    if value > U256::from(u128::MAX) {
        return Err(MathError::Overflow);
    }
    Ok(value.low_u128())
}

/// `floor(a * b / d)` with a 256-bit intermediate.
pub fn mul_div_floor(a: u128, b: u128, d: u128) -> Result<u128, MathError> {
    if d == 0 {
        return Err(MathError::DivideByZero);
    }
    narrow(U256::from(a) * U256::from(b) / U256::from(d))
}

/// `ceil(a * b / d)` with a 256-bit intermediate.
pub fn mul_div_ceil(a: u128, b: u128, d: u128) -> Result<u128, MathError> {
    if d == 0 {
        return Err(MathError::DivideByZero);
    }
    let product = U256::from(a) * U256::from(b);
    let divisor = U256::from(d);
    let quotient = product / divisor;
    if (product % divisor).is_zero() {
        narrow(quotient)
    } else {
        narrow(quotient + U256::one())
    }
}

/// Non-negative fixed-point number scaled by 10^6.
///
/// Serializes as a canonical decimal string (e.g. `"0.375"`).
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(into = "String", try_from = "String")]
pub struct Decimal(u128);

impl Decimal {
    /// Build a Decimal directly from its scaled numerator.
    pub const fn from_raw(raw: u128) -> Self {
        Decimal(raw)
    }

    /// The scaled numerator.
    pub const fn raw(&self) -> u128 {
        self.0
    }

    pub const fn zero() -> Self {
        Decimal(0)
    }

    pub const fn one() -> Self {
        Decimal(SCALE)
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Lift a plain integer into the fixed-point domain.
    pub fn from_integer(n: u128) -> Result<Self, MathError> {
        n.checked_mul(SCALE).map(Decimal).ok_or(MathError::Overflow)
    }

    /// `num / den` as a Decimal, rounded down.
    pub fn from_ratio(num: u128, den: u128) -> Result<Self, MathError> {
        mul_div_floor(num, SCALE, den).map(Decimal)
    }

    pub fn checked_add(self, rhs: Decimal) -> Result<Decimal, MathError> {
        self.0
            .checked_add(rhs.0)
            .map(Decimal)
            .ok_or(MathError::Overflow)
    }

    /// Fails with [`MathError::Underflow`] when the result would be negative.
    pub fn checked_sub(self, rhs: Decimal) -> Result<Decimal, MathError> {
        self.0
            .checked_sub(rhs.0)
            .map(Decimal)
            .ok_or(MathError::Underflow)
    }

    /// `self * rhs / SCALE`, rounded down.
    pub fn checked_mul(self, rhs: Decimal) -> Result<Decimal, MathError> {
        mul_div_floor(self.0, rhs.0, SCALE).map(Decimal)
    }

    /// `self * SCALE / rhs`, rounded down.
    pub fn checked_div(self, rhs: Decimal) -> Result<Decimal, MathError> {
        mul_div_floor(self.0, SCALE, rhs.0).map(Decimal)
    }

    pub fn greater_than(&self, other: &Decimal) -> bool {
        self > other
    }

    /// Integer part, rounded down.
    pub fn floor_to_integer(&self) -> u128 {
        self.0 / SCALE
    }

    /// `floor(n * self)` for a plain integer `n`.
    pub fn mul_integer_floor(&self, n: u128) -> Result<u128, MathError> {
        mul_div_floor(n, self.0, SCALE)
    }

    /// Parse a non-negative decimal string with at most six fractional digits.
    pub fn from_str_canonical(s: &str) -> Result<Self, DecimalParseError> {
        let parsed = RustDecimal::from_str(s.trim())
            .map_err(|e| DecimalParseError::Invalid(e.to_string()))?;
        if parsed.is_sign_negative() && !parsed.is_zero() {
            return Err(DecimalParseError::Negative);
        }
        let mut normalized = parsed.normalize();
        if normalized.scale() > DECIMAL_PLACES {
            return Err(DecimalParseError::TooPrecise);
        }
        normalized.rescale(DECIMAL_PLACES);
        u128::try_from(normalized.mantissa().abs())
            .map(Decimal)
            .map_err(|e| DecimalParseError::Invalid(e.to_string()))
    }

    /// Render without exponent and without trailing fractional zeros.
    pub fn to_canonical_string(&self) -> String {
        let int = self.0 / SCALE;
        let frac = self.0 % SCALE;
        if frac == 0 {
            return int.to_string();
        }
        let digits = format!("{:0width$}", frac, width = DECIMAL_PLACES as usize);
        format!("{}.{}", int, digits.trim_end_matches('0'))
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_canonical_string())
    }
}

impl FromStr for Decimal {
    type Err = DecimalParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_str_canonical(s)
    }
}

impl From<Decimal> for String {
    fn from(value: Decimal) -> Self {
        value.to_canonical_string()
    }
}

impl TryFrom<String> for Decimal {
    type Error = DecimalParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_str_canonical(&value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> Decimal {
        Decimal::from_str_canonical(s).unwrap()
    }

    #[test]
    fn test_from_integer_and_floor() {
        let v = Decimal::from_integer(42).unwrap();
        assert_eq!(v.raw(), 42_000_000);
        assert_eq!(v.floor_to_integer(), 42);
        assert_eq!(d("42.999999").floor_to_integer(), 42);
    }

    #[test]
    fn test_from_integer_overflow() {
        assert_eq!(Decimal::from_integer(u128::MAX), Err(MathError::Overflow));
    }

    #[test]
    fn test_add_sub() {
        assert_eq!(d("10.5").checked_add(d("2.5")).unwrap(), d("13"));
        assert_eq!(d("10.5").checked_sub(d("2.5")).unwrap(), d("8"));
        assert_eq!(d("1").checked_sub(d("1.000001")), Err(MathError::Underflow));
    }

    #[test]
    fn test_mul_rounds_down() {
        assert_eq!(d("10.5").checked_mul(d("2.5")).unwrap(), d("26.25"));
        // 0.000001 * 0.5 = 0.0000005 -> floor
        assert_eq!(d("0.000001").checked_mul(d("0.5")).unwrap(), Decimal::zero());
    }

    #[test]
    fn test_div_rounds_down() {
        assert_eq!(d("10").checked_div(d("4")).unwrap(), d("2.5"));
        assert_eq!(d("1").checked_div(d("3")).unwrap(), d("0.333333"));
        assert_eq!(d("2").checked_div(d("3")).unwrap(), d("0.666666"));
    }

    #[test]
    fn test_div_by_zero() {
        assert_eq!(d("1").checked_div(Decimal::zero()), Err(MathError::DivideByZero));
        assert_eq!(Decimal::from_ratio(1, 0), Err(MathError::DivideByZero));
    }

    #[test]
    fn test_from_ratio() {
        assert_eq!(Decimal::from_ratio(30, 80).unwrap(), d("0.375"));
        assert_eq!(Decimal::from_ratio(750, 1).unwrap(), d("750"));
    }

    #[test]
    fn test_wide_intermediate_does_not_overflow() {
        // raw numerators around 1e30 multiply to 1e60, far beyond u128.
        let big = Decimal::from_integer(1_000_000_000_000_000_000_000_000).unwrap();
        let half = d("0.5");
        assert_eq!(
            big.checked_mul(half).unwrap(),
            Decimal::from_integer(500_000_000_000_000_000_000_000).unwrap()
        );
        assert_eq!(big.checked_div(big).unwrap(), Decimal::one());
    }

    #[test]
    fn test_mul_integer_floor() {
        assert_eq!(d("0.375").mul_integer_floor(1000).unwrap(), 375);
        assert_eq!(d("0.375").mul_integer_floor(3).unwrap(), 1);
    }

    #[test]
    fn test_mul_div_rounding_directions() {
        assert_eq!(mul_div_floor(10, 1, 3).unwrap(), 3);
        assert_eq!(mul_div_ceil(10, 1, 3).unwrap(), 4);
        assert_eq!(mul_div_ceil(9, 1, 3).unwrap(), 3);
        assert_eq!(mul_div_ceil(1, 1, 0), Err(MathError::DivideByZero));
        assert_eq!(mul_div_floor(u128::MAX, 2, 1), Err(MathError::Overflow));
    }

    #[test]
    fn test_greater_than() {
        assert!(d("0.000002").greater_than(&d("0.000001")));
        assert!(!d("1").greater_than(&d("1")));
    }

    #[test]
    fn test_canonical_string() {
        assert_eq!(d("0.375").to_canonical_string(), "0.375");
        assert_eq!(d("750").to_canonical_string(), "750");
        assert_eq!(d("0.000001").to_canonical_string(), "0.000001");
        assert_eq!(d("1.10").to_string(), "1.1");
    }

    #[test]
    fn test_parse_rejects_negative_and_too_precise() {
        assert_eq!(Decimal::from_str_canonical("-1"), Err(DecimalParseError::Negative));
        assert_eq!(
            Decimal::from_str_canonical("0.0000001"),
            Err(DecimalParseError::TooPrecise)
        );
        assert!(matches!(
            Decimal::from_str_canonical("abc"),
            Err(DecimalParseError::Invalid(_))
        ));
    }

    #[test]
    fn test_json_serializes_as_string() {
        let json = serde_json::to_value(d("123.456")).unwrap();
        assert_eq!(json, serde_json::json!("123.456"));
        let back: Decimal = serde_json::from_value(json).unwrap();
        assert_eq!(back, d("123.456"));
    }
}
