use crate::domain::{Decimal, MathError};

/// An amount split into a fee and what is left after it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FeeSplit {
    pub fee: u128,
    pub remainder: u128,
}

/// `fee = floor(amount * ratio)`, `remainder = amount - fee`.
///
/// `ratio` is expected in `[0, 1]`; a larger ratio surfaces as
/// [`MathError::Underflow`].
pub fn split_fee(amount: u128, ratio: Decimal) -> Result<FeeSplit, MathError> {
    let fee = ratio.mul_integer_floor(amount)?;
    let remainder = amount.checked_sub(fee).ok_or(MathError::Underflow)?;
    Ok(FeeSplit { fee, remainder })
}
