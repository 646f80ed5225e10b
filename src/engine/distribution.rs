//! Time-driven release of output and spending of input ("tick").

use crate::domain::decimal::SCALE;
use crate::domain::{mul_div_floor, Decimal, DistributionLedger, MathError, StreamTiming, TimeMs};
use tracing::debug;

const DEFAULT_ASSET_DECIMALS: u8 = 6;

/// Decimal precision of the two sides of an asset pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssetPrecision {
    pub in_decimals: u8,
    pub out_decimals: u8,
}

impl Default for AssetPrecision {
    fn default() -> Self {
        Self {
            in_decimals: DEFAULT_ASSET_DECIMALS,
            out_decimals: DEFAULT_ASSET_DECIMALS,
        }
    }
}

/// Fraction of the remaining stream window covered by `[last_updated, now]`.
///
/// Returns zero when no streaming time elapsed (before start, after end, or
/// a repeated call with the same `now`).
pub fn time_diff(
    last_updated: TimeMs,
    now: TimeMs,
    timing: &StreamTiming,
) -> Result<Decimal, MathError> {
    let from = last_updated.max(timing.stream_start);
    let numerator = now
        .min(timing.stream_end)
        .as_ms()
        .saturating_sub(from.as_ms());
    let denominator = timing.stream_end.as_ms().saturating_sub(from.as_ms());
    if numerator <= 0 || denominator <= 0 {
        return Ok(Decimal::zero());
    }
    Decimal::from_ratio(numerator as u128, denominator as u128)
}

/// Price of `released` output in units of input, both sides normalized to
/// 18 fractional digits.
///
/// `spent * 10^(18 - in) / (released * 10^(18 - out))` reduces to a single
/// power of ten on one side, which keeps the intermediates small.
pub fn normalized_price(
    spent: u128,
    released: u128,
    precision: AssetPrecision,
) -> Result<Decimal, MathError> {
    let pow10 = |exp: u8| 10u128.checked_pow(u32::from(exp)).ok_or(MathError::Overflow);
    if precision.out_decimals >= precision.in_decimals {
        let factor = pow10(precision.out_decimals - precision.in_decimals)?;
        let numerator_scale = SCALE.checked_mul(factor).ok_or(MathError::Overflow)?;
        mul_div_floor(spent, numerator_scale, released).map(Decimal::from_raw)
    } else {
        let factor = pow10(precision.in_decimals - precision.out_decimals)?;
        let unscaled = mul_div_floor(spent, SCALE, released)?;
        Ok(Decimal::from_raw(unscaled / factor))
    }
}

/// Advance the ledger to `now`.
///
/// Output is released linearly over the remaining window, and the outstanding
/// input is spent by the same fraction. With no shares outstanding nothing is
/// released and only `last_updated` moves.
pub fn update_distribution(
    ledger: &DistributionLedger,
    now: TimeMs,
    timing: &StreamTiming,
    precision: AssetPrecision,
) -> Result<DistributionLedger, MathError> {
    let mut next = ledger.clone();
    let diff = time_diff(ledger.last_updated, now, timing)?;
    next.last_updated = now.max(ledger.last_updated);

    if diff.is_zero() || ledger.shares == 0 {
        return Ok(next);
    }

    let spent_delta = diff.mul_integer_floor(ledger.in_supply)?;
    let released_delta = diff.mul_integer_floor(ledger.out_remaining)?;

    next.in_supply = ledger
        .in_supply
        .checked_sub(spent_delta)
        .ok_or(MathError::Underflow)?;
    next.spent_in = ledger
        .spent_in
        .checked_add(spent_delta)
        .ok_or(MathError::Overflow)?;
    next.out_remaining = ledger
        .out_remaining
        .checked_sub(released_delta)
        .ok_or(MathError::Underflow)?;
    next.dist_index = ledger
        .dist_index
        .checked_add(Decimal::from_ratio(released_delta, ledger.shares)?)?;

    if released_delta > 0 {
        next.current_price = normalized_price(spent_delta, released_delta, precision)?;
    }

    debug!(
        diff = %diff,
        spent_delta,
        released_delta,
        dist_index = %next.dist_index,
        "Distribution advanced"
    );

    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timing() -> StreamTiming {
        StreamTiming::new(TimeMs(100), TimeMs(200), TimeMs(300), 0).unwrap()
    }

    fn funded_ledger(last_updated: i64) -> DistributionLedger {
        let mut ledger = DistributionLedger::new(2000, TimeMs(last_updated));
        ledger.in_supply = 1000;
        ledger.shares = 1000;
        ledger
    }

    #[test]
    fn test_time_diff_inside_window() {
        let diff = time_diff(TimeMs(220), TimeMs(250), &timing()).unwrap();
        assert_eq!(diff.to_canonical_string(), "0.375");
    }

    #[test]
    fn test_time_diff_clamps_to_window() {
        // Before the stream starts nothing elapses.
        assert!(time_diff(TimeMs(0), TimeMs(150), &timing()).unwrap().is_zero());
        // Last update before start counts from start.
        assert_eq!(
            time_diff(TimeMs(150), TimeMs(250), &timing()).unwrap(),
            Decimal::from_ratio(1, 2).unwrap()
        );
        // Past the end the whole remaining window elapsed.
        assert_eq!(
            time_diff(TimeMs(250), TimeMs(900), &timing()).unwrap(),
            Decimal::one()
        );
        // Once caught up with the end nothing is left.
        assert!(time_diff(TimeMs(300), TimeMs(900), &timing()).unwrap().is_zero());
    }

    #[test]
    fn test_tick_without_shares_only_moves_clock() {
        let ledger = DistributionLedger::new(2000, TimeMs(200));
        let next = update_distribution(&ledger, TimeMs(250), &timing(), AssetPrecision::default())
            .unwrap();
        assert_eq!(next.out_remaining, 2000);
        assert!(next.dist_index.is_zero());
        assert_eq!(next.last_updated, TimeMs(250));
    }

    #[test]
    fn test_tick_at_end_releases_everything() {
        let ledger = funded_ledger(250);
        let next = update_distribution(&ledger, TimeMs(400), &timing(), AssetPrecision::default())
            .unwrap();
        assert_eq!(next.out_remaining, 0);
        assert_eq!(next.in_supply, 0);
        assert_eq!(next.spent_in, 1000);
        assert_eq!(next.dist_index, Decimal::from_integer(2).unwrap());
        assert_eq!(next.out_released(), 2000);
    }

    #[test]
    fn test_tick_is_idempotent_for_same_now() {
        let ledger = funded_ledger(200);
        let once = update_distribution(&ledger, TimeMs(260), &timing(), AssetPrecision::default())
            .unwrap();
        let twice = update_distribution(&once, TimeMs(260), &timing(), AssetPrecision::default())
            .unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_clock_never_moves_backwards() {
        let ledger = funded_ledger(260);
        let next = update_distribution(&ledger, TimeMs(240), &timing(), AssetPrecision::default())
            .unwrap();
        assert_eq!(next, ledger);
    }

    #[test]
    fn test_price_equal_decimals() {
        let price = normalized_price(375, 750, AssetPrecision::default()).unwrap();
        assert_eq!(price.to_canonical_string(), "0.5");
    }

    #[test]
    fn test_price_normalizes_mixed_decimals() {
        // 1.5 units of a 6-decimal input for 3 units of an 18-decimal output.
        let precision = AssetPrecision {
            in_decimals: 6,
            out_decimals: 18,
        };
        let spent = 1_500_000;
        let released = 3_000_000_000_000_000_000;
        let price = normalized_price(spent, released, precision).unwrap();
        assert_eq!(price.to_canonical_string(), "0.5");

        // Same trade with the decimals swapped.
        let precision = AssetPrecision {
            in_decimals: 18,
            out_decimals: 6,
        };
        let price =
            normalized_price(1_500_000_000_000_000_000, 3_000_000, precision).unwrap();
        assert_eq!(price.to_canonical_string(), "0.5");
    }

    #[test]
    fn test_price_is_recorded_only_when_output_released() {
        let mut ledger = funded_ledger(200);
        ledger.out_remaining = 0;
        let next = update_distribution(&ledger, TimeMs(250), &timing(), AssetPrecision::default())
            .unwrap();
        assert!(next.current_price.is_zero());
        assert_eq!(next.spent_in, 500);
    }
}
