//! Per-participant position record.

use crate::domain::{Decimal, TimeMs};

/// One participant's claim on a stream.
///
/// Unknown participants are represented by `Position::default()`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Position {
    /// Deposited input not yet spent or withdrawn.
    pub in_balance: u128,
    pub shares: u128,
    /// Distribution index at the last sync.
    pub index: Decimal,
    pub spent_in: u128,
    pub purchased: u128,
    pub last_updated: TimeMs,
    /// Set exactly once, when the participant exits.
    pub exited_at: Option<TimeMs>,
}

impl Position {
    /// A position that never participated (or fully withdrew before spending anything).
    pub fn is_empty(&self) -> bool {
        self.shares == 0 && self.in_balance == 0 && self.spent_in == 0 && self.purchased == 0
    }

    pub fn is_exited(&self) -> bool {
        self.exited_at.is_some()
    }
}
