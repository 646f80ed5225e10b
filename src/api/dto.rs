//! JSON shapes shared by several endpoints.

use crate::assets::Transfer;
use crate::domain::Position;
use crate::orchestration::Receipt;
use crate::settlement::{HandoffKind, SettlementHandoff};
use serde::Serialize;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionDto {
    pub in_balance: String,
    pub shares: String,
    pub index: String,
    pub spent_in: String,
    pub purchased: String,
    pub last_updated_ms: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exited_at_ms: Option<i64>,
}

impl From<&Position> for PositionDto {
    fn from(p: &Position) -> Self {
        Self {
            in_balance: p.in_balance.to_string(),
            shares: p.shares.to_string(),
            index: p.index.to_canonical_string(),
            spent_in: p.spent_in.to_string(),
            purchased: p.purchased.to_string(),
            last_updated_ms: p.last_updated.as_ms(),
            exited_at_ms: p.exited_at.map(|t| t.as_ms()),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferDto {
    pub asset: String,
    pub from: String,
    pub to: String,
    pub amount: String,
}

impl From<&Transfer> for TransferDto {
    fn from(t: &Transfer) -> Self {
        Self {
            asset: t.asset.to_string(),
            from: t.from.to_string(),
            to: t.to.to_string(),
            amount: t.amount.to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HandoffDto {
    pub kind: HandoffKind,
    pub beneficiary: String,
    pub asset: String,
    pub amount: String,
}

impl From<&SettlementHandoff> for HandoffDto {
    fn from(h: &SettlementHandoff) -> Self {
        Self {
            kind: h.kind,
            beneficiary: h.beneficiary.to_string(),
            asset: h.asset.to_string(),
            amount: h.amount.to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptDto {
    pub operation_id: String,
    pub operation: String,
    pub phase: String,
    pub transfers: Vec<TransferDto>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub participant: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<PositionDto>,
    pub handoffs: Vec<HandoffDto>,
}

impl From<&Receipt> for ReceiptDto {
    fn from(r: &Receipt) -> Self {
        Self {
            operation_id: r.operation_id.to_string(),
            operation: r.operation.to_string(),
            phase: r.phase.to_string(),
            transfers: r.transfers.iter().map(TransferDto::from).collect(),
            participant: r.participant.as_ref().map(|a| a.to_string()),
            position: r.position.as_ref().map(PositionDto::from),
            handoffs: r.handoffs.iter().map(HandoffDto::from).collect(),
        }
    }
}
