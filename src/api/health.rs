use crate::api::AppState;
use axum::extract::State;
use axum::Json;

pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

/// Ready once the stream instance is loaded; reports its persisted phase.
pub async fn ready(State(state): State<AppState>) -> Json<serde_json::Value> {
    let phase = state.orchestrator.state().await.phase;
    Json(serde_json::json!({"status": "ready", "phase": phase.as_str()}))
}
