use crate::api::{parse_user, AppState};
use crate::error::AppError;
use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransfersQuery {
    pub user: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransfersResponse {
    pub transfers: Vec<TransferRecordDto>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferRecordDto {
    pub operation_id: String,
    pub seq: i64,
    pub asset: String,
    pub from: String,
    pub to: String,
    pub amount: String,
    pub recorded_at_ms: i64,
}

/// Journaled transfers sent or received by the user.
pub async fn get_transfers(
    Query(params): Query<TransfersQuery>,
    State(state): State<AppState>,
) -> Result<Json<TransfersResponse>, AppError> {
    let user = parse_user(&params.user)?;
    let records = state.repo.query_transfers(&user).await?;

    let transfers = records
        .into_iter()
        .map(|r| TransferRecordDto {
            operation_id: r.operation_id.to_string(),
            seq: r.seq,
            asset: r.transfer.asset.to_string(),
            from: r.transfer.from.to_string(),
            to: r.transfer.to.to_string(),
            amount: r.transfer.amount.to_string(),
            recorded_at_ms: r.recorded_at.as_ms(),
        })
        .collect();

    Ok(Json(TransfersResponse { transfers }))
}
