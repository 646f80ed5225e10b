//! Asset movement.
//!
//! The engine never touches balances itself: every operation hands the
//! transfers it needs to its [`StreamStore`](crate::store::StreamStore) as one
//! batch, together with the rest of the operation's writes.

use crate::domain::{Address, AssetId};
use thiserror::Error;

pub mod memory;

pub use memory::{InMemoryBank, StagedTransfers};

/// A single movement of `amount` units of `asset`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transfer {
    pub asset: AssetId,
    pub from: Address,
    pub to: Address,
    pub amount: u128,
}

impl Transfer {
    pub fn new(asset: AssetId, from: Address, to: Address, amount: u128) -> Self {
        Self {
            asset,
            from,
            to,
            amount,
        }
    }

    /// Zero-amount transfers are skipped by every ledger.
    pub fn is_noop(&self) -> bool {
        self.amount == 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransferError {
    #[error("insufficient {asset} balance for {owner}: required {required}, available {available}")]
    InsufficientBalance {
        asset: AssetId,
        owner: Address,
        required: u128,
        available: u128,
    },
    #[error("transfer not authorized: {0}")]
    Unauthorized(String),
    #[error("asset ledger error: {0}")]
    Backend(String),
}

impl From<sqlx::Error> for TransferError {
    fn from(err: sqlx::Error) -> Self {
        TransferError::Backend(err.to_string())
    }
}
