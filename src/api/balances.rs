use crate::api::{bearer_token, parse_amount, parse_user, AppState};
use crate::domain::AssetId;
use crate::error::AppError;
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceQuery {
    pub user: String,
    pub asset: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceResponse {
    pub user: String,
    pub asset: String,
    pub amount: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreditRequest {
    /// External reference of the funding event; replays are ignored.
    pub reference: String,
    pub asset: String,
    pub account: String,
    pub amount: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreditResponse {
    pub reference: String,
    pub applied: bool,
    pub balance: String,
}

pub async fn get_balance(
    Query(params): Query<BalanceQuery>,
    State(state): State<AppState>,
) -> Result<Json<BalanceResponse>, AppError> {
    let user = parse_user(&params.user)?;
    let asset = AssetId::from(params.asset.trim().to_string());
    let amount = state.repo.balance(&asset, &user).await?;
    Ok(Json(BalanceResponse {
        user: user.to_string(),
        asset: asset.to_string(),
        amount: amount.to_string(),
    }))
}

/// Fund an account. Only the operator may call this, and only when an
/// operator token is configured.
pub async fn credit(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<CreditRequest>,
) -> Result<Json<CreditResponse>, AppError> {
    let Some(expected) = state.config.operator_token.as_deref() else {
        return Err(AppError::NotFound("Crediting is disabled".into()));
    };
    if bearer_token(&headers).map(str::trim) != Some(expected) {
        warn!("Rejected credit request with a bad operator token");
        return Err(AppError::Forbidden("Invalid operator token".into()));
    }

    let reference = body.reference.trim();
    if reference.is_empty() {
        return Err(AppError::BadRequest("reference must not be empty".into()));
    }
    let account = parse_user(&body.account)?;
    let asset = AssetId::from(body.asset.trim().to_string());
    let amount = parse_amount("amount", &body.amount)?;

    let applied = state.repo.credit(reference, &asset, &account, amount).await?;
    let balance = state.repo.balance(&asset, &account).await?;
    Ok(Json(CreditResponse {
        reference: reference.to_string(),
        applied,
        balance: balance.to_string(),
    }))
}
