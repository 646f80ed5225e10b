use crate::api::dto::ReceiptDto;
use crate::api::{parse_user, AppState};
use crate::error::AppError;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamResponse {
    pub phase: String,
    pub as_of_ms: i64,
    pub creator: String,
    pub in_asset: String,
    pub out_asset: String,
    pub out_supply: String,
    pub out_remaining: String,
    pub out_released: String,
    pub in_supply: String,
    pub spent_in: String,
    pub shares: String,
    pub dist_index: String,
    pub current_price: String,
    pub last_updated_ms: i64,
    pub bootstrapping_start_ms: i64,
    pub stream_start_ms: i64,
    pub stream_end_ms: i64,
    pub threshold: String,
    pub threshold_met: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatorRequest {
    pub caller: String,
}

/// Stream status projected to the current time.
pub async fn get_stream(State(state): State<AppState>) -> Result<Json<StreamResponse>, AppError> {
    let status = state.orchestrator.status().await?;
    let stream = &state.config.stream;
    let ledger = &status.ledger;

    Ok(Json(StreamResponse {
        phase: status.phase.to_string(),
        as_of_ms: status.as_of.as_ms(),
        creator: stream.creator.to_string(),
        in_asset: stream.in_asset.to_string(),
        out_asset: stream.out_asset.to_string(),
        out_supply: ledger.out_supply.to_string(),
        out_remaining: ledger.out_remaining.to_string(),
        out_released: ledger.out_released().to_string(),
        in_supply: ledger.in_supply.to_string(),
        spent_in: ledger.spent_in.to_string(),
        shares: ledger.shares.to_string(),
        dist_index: ledger.dist_index.to_canonical_string(),
        current_price: ledger.current_price.to_canonical_string(),
        last_updated_ms: ledger.last_updated.as_ms(),
        bootstrapping_start_ms: status.timing.bootstrapping_start.as_ms(),
        stream_start_ms: status.timing.stream_start.as_ms(),
        stream_end_ms: status.timing.stream_end.as_ms(),
        threshold: status.timing.threshold.to_string(),
        threshold_met: status.threshold_met,
    }))
}

pub async fn sync_stream(State(state): State<AppState>) -> Result<Json<ReceiptDto>, AppError> {
    let receipt = state.orchestrator.sync_stream().await?;
    Ok(Json(ReceiptDto::from(&receipt)))
}

pub async fn finalize(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<CreatorRequest>,
) -> Result<Json<ReceiptDto>, AppError> {
    let caller = parse_user(&body.caller)?;
    state.authenticate(&headers, &caller)?;
    let receipt = state.orchestrator.finalize(&caller).await?;
    Ok(Json(ReceiptDto::from(&receipt)))
}

pub async fn cancel(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<CreatorRequest>,
) -> Result<Json<ReceiptDto>, AppError> {
    let caller = parse_user(&body.caller)?;
    state.authenticate(&headers, &caller)?;
    let receipt = state.orchestrator.cancel(&caller).await?;
    Ok(Json(ReceiptDto::from(&receipt)))
}
