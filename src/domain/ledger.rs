//! Timing configuration and the global distribution ledger.

use crate::domain::{Decimal, TimeMs};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("checkpoints must satisfy bootstrapping_start <= stream_start <= stream_end")]
pub struct TimingOrderError;

/// Immutable checkpoints and participation threshold of one stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamTiming {
    pub bootstrapping_start: TimeMs,
    pub stream_start: TimeMs,
    pub stream_end: TimeMs,
    /// Minimum cumulative spent input for the stream to settle successfully.
    pub threshold: u128,
}

impl StreamTiming {
    pub fn new(
        bootstrapping_start: TimeMs,
        stream_start: TimeMs,
        stream_end: TimeMs,
        threshold: u128,
    ) -> Result<Self, TimingOrderError> {
        if bootstrapping_start > stream_start || stream_start > stream_end {
            return Err(TimingOrderError);
        }
        Ok(Self {
            bootstrapping_start,
            stream_start,
            stream_end,
            threshold,
        })
    }
}

/// Global accounting state of one stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistributionLedger {
    /// Output not yet released to the index.
    pub out_remaining: u128,
    /// Accumulated output released per share.
    pub dist_index: Decimal,
    /// Input converted into purchases so far.
    pub spent_in: u128,
    /// Total outstanding shares.
    pub shares: u128,
    /// Marginal price of the last tick that released output (informational).
    pub current_price: Decimal,
    /// Output supply the stream was created with.
    pub out_supply: u128,
    /// Input deposited and not yet spent or withdrawn.
    pub in_supply: u128,
    pub last_updated: TimeMs,
}

impl DistributionLedger {
    pub fn new(out_supply: u128, created_at: TimeMs) -> Self {
        Self {
            out_remaining: out_supply,
            dist_index: Decimal::zero(),
            spent_in: 0,
            shares: 0,
            current_price: Decimal::zero(),
            out_supply,
            in_supply: 0,
            last_updated: created_at,
        }
    }

    /// Output already released to participants through the index.
    pub fn out_released(&self) -> u128 {
        self.out_supply.saturating_sub(self.out_remaining)
    }

    pub fn threshold_met(&self, timing: &StreamTiming) -> bool {
        self.spent_in >= timing.threshold
    }
}
