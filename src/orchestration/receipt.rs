//! Outcome of a committed operation.

use crate::assets::Transfer;
use crate::domain::{Address, AssetId, Phase, Position};
use crate::settlement::SettlementHandoff;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Create,
    Deposit,
    Withdraw,
    Exit,
    Finalize,
    Cancel,
    SyncStream,
    SyncPosition,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Operation::Create => "create",
            Operation::Deposit => "deposit",
            Operation::Withdraw => "withdraw",
            Operation::Exit => "exit",
            Operation::Finalize => "finalize",
            Operation::Cancel => "cancel",
            Operation::SyncStream => "sync_stream",
            Operation::SyncPosition => "sync_position",
        };
        f.write_str(s)
    }
}

/// What a committed operation did.
///
/// `handoffs` are not yet delivered: the caller dispatches them once the
/// resulting state is durable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    pub operation_id: Uuid,
    pub operation: Operation,
    pub phase: Phase,
    pub transfers: Vec<Transfer>,
    pub participant: Option<Address>,
    pub position: Option<Position>,
    pub handoffs: Vec<SettlementHandoff>,
}

impl Receipt {
    /// Total of `asset` moved to `account` by this operation.
    pub fn received_by(&self, account: &Address, asset: &AssetId) -> u128 {
        self.transfers
            .iter()
            .filter(|t| &t.to == account && &t.asset == asset)
            .map(|t| t.amount)
            .sum()
    }
}
