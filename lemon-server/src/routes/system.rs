use crate::error::ServerError;
use crate::state::AppState;
use crate::wire::{HealthEntry, StatsResponse};
use axum::extract::State;
use axum::Json;
use serde_json::json;
use std::sync::Arc;

#[utoipa::path(get, path = "/health", responses((status = 200, body = [HealthEntry])))]
pub async fn health(State(state): State<Arc<AppState>>) -> Json<Vec<HealthEntry>> {
    let entries = state
        .orchestrator
        .health()
        .into_iter()
        .map(|e| HealthEntry {
            recipe: e.recipe,
            backend: e.backend,
            model: e.model_name,
        })
        .collect();
    Json(entries)
}

#[utoipa::path(get, path = "/system-info", responses((status = 200, body = serde_json::Value)))]
pub async fn system_info(State(state): State<Arc<AppState>>) -> Result<Json<serde_json::Value>, ServerError> {
    let statuses = state.manager.get_all_backends_status()?;
    Ok(Json(json!({ "recipes": statuses })))
}

#[utoipa::path(get, path = "/stats", responses((status = 200, body = StatsResponse)))]
pub async fn stats(State(state): State<Arc<AppState>>) -> Json<StatsResponse> {
    let s = state.orchestrator.stats();
    Json(StatsResponse {
        total_requests: s.total_requests,
        total_tokens: s.total_tokens,
        last_ttft_ms: s.last_ttft_ms,
        last_tokens_per_sec: s.last_tokens_per_sec,
    })
}
