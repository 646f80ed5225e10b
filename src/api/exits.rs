use crate::api::dto::ReceiptDto;
use crate::api::{parse_user, AppState};
use crate::error::AppError;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExitRequest {
    pub user: String,
}

pub async fn exit(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<ExitRequest>,
) -> Result<Json<ReceiptDto>, AppError> {
    let user = parse_user(&body.user)?;
    state.authenticate(&headers, &user)?;
    let receipt = state.orchestrator.exit(&user).await?;
    Ok(Json(ReceiptDto::from(&receipt)))
}
