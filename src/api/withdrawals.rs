use crate::api::dto::ReceiptDto;
use crate::api::{parse_amount, parse_user, AppState};
use crate::error::AppError;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawRequest {
    pub user: String,
    /// Omitted to withdraw the whole unspent balance.
    pub amount: Option<String>,
}

pub async fn withdraw(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<WithdrawRequest>,
) -> Result<Json<ReceiptDto>, AppError> {
    let user = parse_user(&body.user)?;
    state.authenticate(&headers, &user)?;
    let receipt = match body.amount.as_deref() {
        Some(raw) => {
            let amount = parse_amount("amount", raw)?;
            state.orchestrator.withdraw(&user, amount).await?
        }
        None => state.orchestrator.withdraw_all(&user).await?,
    };
    Ok(Json(ReceiptDto::from(&receipt)))
}
