use crate::api::dto::{PositionDto, ReceiptDto};
use crate::api::{parse_user, AppState};
use crate::error::AppError;
use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionQuery {
    pub user: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionResponse {
    pub user: String,
    pub position: PositionDto,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncPositionRequest {
    pub user: String,
}

/// The position as a sync right now would leave it. Nothing is persisted.
pub async fn get_position(
    Query(params): Query<PositionQuery>,
    State(state): State<AppState>,
) -> Result<Json<PositionResponse>, AppError> {
    let user = parse_user(&params.user)?;
    let position = state.orchestrator.preview_position(&user).await?;
    Ok(Json(PositionResponse {
        user: user.to_string(),
        position: PositionDto::from(&position),
    }))
}

pub async fn sync_position(
    State(state): State<AppState>,
    Json(body): Json<SyncPositionRequest>,
) -> Result<Json<ReceiptDto>, AppError> {
    let user = parse_user(&body.user)?;
    let receipt = state.orchestrator.sync_position(&user).await?;
    Ok(Json(ReceiptDto::from(&receipt)))
}
