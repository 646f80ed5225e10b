pub mod balances;
pub mod deposits;
pub mod dto;
pub mod exits;
pub mod health;
pub mod positions;
pub mod stream;
pub mod transfers;
pub mod withdrawals;

use crate::allowlist::{parse_proof, Hash32};
use crate::auth::CallerAuthenticator;
use crate::config::Config;
use crate::db::Repository;
use crate::domain::Address;
use crate::error::AppError;
use crate::orchestration::Orchestrator;
use axum::{
    http::{header::AUTHORIZATION, HeaderMap},
    routing::{get, post},
    Router,
};
use std::str::FromStr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<Repository>,
    pub config: Config,
    pub orchestrator: Arc<Orchestrator>,
    pub authenticator: CallerAuthenticator,
}

impl AppState {
    pub fn new(repo: Arc<Repository>, config: Config, orchestrator: Arc<Orchestrator>) -> Self {
        let authenticator = CallerAuthenticator::new(config.auth_secret.clone());
        Self {
            repo,
            config,
            orchestrator,
            authenticator,
        }
    }

    /// Reject the request unless it carries `account`'s bearer token.
    pub(crate) fn authenticate(&self, headers: &HeaderMap, account: &Address) -> Result<(), AppError> {
        Ok(self.authenticator.authenticate(account, bearer_token(headers))?)
    }
}

pub(crate) fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))
        .route("/v1/stream", get(stream::get_stream))
        .route("/v1/stream/sync", post(stream::sync_stream))
        .route("/v1/stream/finalize", post(stream::finalize))
        .route("/v1/stream/cancel", post(stream::cancel))
        .route("/v1/positions", get(positions::get_position))
        .route("/v1/positions/sync", post(positions::sync_position))
        .route("/v1/deposits", post(deposits::deposit))
        .route("/v1/deposits/permit", post(deposits::deposit_with_permit))
        .route("/v1/withdrawals", post(withdrawals::withdraw))
        .route("/v1/exits", post(exits::exit))
        .route("/v1/transfers", get(transfers::get_transfers))
        .route("/v1/balances", get(balances::get_balance))
        .route("/v1/credits", post(balances::credit))
        .layer(cors)
        .with_state(state)
}

pub(crate) fn parse_user(raw: &str) -> Result<Address, AppError> {
    Address::from_str(raw).map_err(|_| AppError::BadRequest("Invalid user address".into()))
}

/// Amounts travel as decimal strings so that u128 values survive JSON.
pub(crate) fn parse_amount(field: &str, raw: &str) -> Result<u128, AppError> {
    raw.trim()
        .parse::<u128>()
        .map_err(|_| AppError::BadRequest(format!("{} must be a non-negative integer string", field)))
}

pub(crate) fn parse_proof_param(proof: Option<&[String]>) -> Result<Vec<Hash32>, AppError> {
    parse_proof(proof.unwrap_or_default())
        .map_err(|e| AppError::BadRequest(format!("Invalid allow-list proof: {}", e)))
}
