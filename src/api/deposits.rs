use crate::api::dto::ReceiptDto;
use crate::api::{parse_amount, parse_proof_param, parse_user, AppState};
use crate::domain::TimeMs;
use crate::error::AppError;
use crate::permit::DepositPermit;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepositRequest {
    pub user: String,
    pub amount: String,
    /// Hex-encoded allow-list proof, needed on the first deposit only.
    pub proof: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermitDepositRequest {
    pub owner: String,
    pub amount: String,
    pub nonce: u64,
    pub deadline_ms: i64,
    pub signature: String,
    pub proof: Option<Vec<String>>,
}

pub async fn deposit(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<DepositRequest>,
) -> Result<Json<ReceiptDto>, AppError> {
    let user = parse_user(&body.user)?;
    state.authenticate(&headers, &user)?;
    let amount = parse_amount("amount", &body.amount)?;
    let proof = parse_proof_param(body.proof.as_deref())?;

    let receipt = state.orchestrator.deposit(&user, amount, &proof).await?;
    Ok(Json(ReceiptDto::from(&receipt)))
}

/// The signed permit is the owner's credential; no bearer token is needed.
pub async fn deposit_with_permit(
    State(state): State<AppState>,
    Json(body): Json<PermitDepositRequest>,
) -> Result<Json<ReceiptDto>, AppError> {
    let permit = DepositPermit {
        owner: parse_user(&body.owner)?,
        amount: parse_amount("amount", &body.amount)?,
        nonce: body.nonce,
        deadline: TimeMs::new(body.deadline_ms),
        signature: body.signature,
    };
    let proof = parse_proof_param(body.proof.as_deref())?;

    let receipt = state
        .orchestrator
        .deposit_with_permit(&permit, &proof)
        .await?;
    Ok(Json(ReceiptDto::from(&receipt)))
}
