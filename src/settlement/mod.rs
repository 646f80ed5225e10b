//! Post-settlement hand-offs to vesting and liquidity-pool creators.
//!
//! Hand-offs run after the state transition that produced them has been
//! persisted. A failing hook is logged and never rolls anything back.

use crate::domain::{Address, AssetId};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

pub mod recording;
pub mod webhook;

pub use recording::RecordingSettlementHook;
pub use webhook::WebhookSettlementHook;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandoffKind {
    /// Creator revenue to be vested.
    CreatorVesting,
    /// A participant's purchased output to be vested.
    SubscriberVesting,
    /// Creator revenue seeded into a liquidity pool.
    LiquidityPool,
}

impl fmt::Display for HandoffKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            HandoffKind::CreatorVesting => "creator_vesting",
            HandoffKind::SubscriberVesting => "subscriber_vesting",
            HandoffKind::LiquidityPool => "liquidity_pool",
        };
        f.write_str(s)
    }
}

/// An amount and beneficiary passed on after a successful settlement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettlementHandoff {
    pub kind: HandoffKind,
    pub beneficiary: Address,
    pub asset: AssetId,
    pub amount: u128,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SettlementHookError {
    #[error("settlement hook request failed: {0}")]
    Request(String),
    #[error("settlement hook rejected hand-off with status {0}")]
    Rejected(u16),
}

#[async_trait]
pub trait SettlementHook: Send + Sync {
    async fn hand_off(
        &self,
        operation_id: Uuid,
        handoff: &SettlementHandoff,
    ) -> Result<(), SettlementHookError>;
}

/// Deliver every hand-off of one operation, logging failures.
///
/// Returns how many hand-offs were accepted.
pub async fn dispatch_handoffs(
    hook: &dyn SettlementHook,
    operation_id: Uuid,
    handoffs: &[SettlementHandoff],
) -> usize {
    let mut delivered = 0;
    for handoff in handoffs {
        match hook.hand_off(operation_id, handoff).await {
            Ok(()) => {
                delivered += 1;
                info!(
                    %operation_id,
                    kind = %handoff.kind,
                    beneficiary = %handoff.beneficiary,
                    amount = handoff.amount,
                    "Settlement hand-off delivered"
                );
            }
            Err(e) => {
                warn!(
                    %operation_id,
                    kind = %handoff.kind,
                    beneficiary = %handoff.beneficiary,
                    "Settlement hand-off failed: {}",
                    e
                );
            }
        }
    }
    delivered
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handoff(kind: HandoffKind) -> SettlementHandoff {
        SettlementHandoff {
            kind,
            beneficiary: Address::new("creator"),
            asset: AssetId::Native,
            amount: 10,
        }
    }

    #[tokio::test]
    async fn test_dispatch_counts_deliveries() {
        let hook = RecordingSettlementHook::new();
        let handoffs = vec![
            handoff(HandoffKind::CreatorVesting),
            handoff(HandoffKind::LiquidityPool),
        ];
        let delivered = dispatch_handoffs(&hook, Uuid::new_v4(), &handoffs).await;
        assert_eq!(delivered, 2);
        assert_eq!(hook.recorded().await.len(), 2);
    }

    #[tokio::test]
    async fn test_dispatch_swallows_failures() {
        let hook = RecordingSettlementHook::failing();
        let delivered =
            dispatch_handoffs(&hook, Uuid::new_v4(), &[handoff(HandoffKind::CreatorVesting)])
                .await;
        assert_eq!(delivered, 0);
    }

    #[test]
    fn test_kind_serialization() {
        let json = serde_json::to_string(&HandoffKind::SubscriberVesting).unwrap();
        assert_eq!(json, "\"subscriber_vesting\"");
    }
}
