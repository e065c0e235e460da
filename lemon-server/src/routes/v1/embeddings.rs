use crate::error::ServerError;
use crate::state::AppState;
use crate::wire::{EmbeddingsRequest, RerankingRequest};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use lemon_core::spec_table::Capability;
use serde_json::json;
use std::sync::Arc;

const UNARY_TIMEOUT_S: u64 = 30;

#[utoipa::path(post, path = "/embeddings", request_body = EmbeddingsRequest, responses((status = 200)))]
pub async fn embeddings(
    State(state): State<Arc<AppState>>,
    Json(req): Json<EmbeddingsRequest>,
) -> Result<impl IntoResponse, ServerError> {
    let model = req.model.clone();
    let body = serde_json::to_value(&json!({
        "model": req.model,
        "input": req.input,
    }))
    .map_err(|e| ServerError::BadRequest(e.to_string()))?;
    let value = state
        .orchestrator
        .dispatch(
            &model,
            &json!({}),
            Capability::Embeddings,
            "/v1/embeddings",
            body,
            UNARY_TIMEOUT_S,
        )
        .await?;
    Ok(Json(value))
}

#[utoipa::path(post, path = "/reranking", request_body = RerankingRequest, responses((status = 200)))]
pub async fn reranking(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RerankingRequest>,
) -> Result<impl IntoResponse, ServerError> {
    let model = req.model.clone();
    let body = serde_json::to_value(&json!({
        "model": req.model,
        "query": req.query,
        "documents": req.documents,
        "top_n": req.top_n,
    }))
    .map_err(|e| ServerError::BadRequest(e.to_string()))?;
    let value = state
        .orchestrator
        .dispatch(
            &model,
            &json!({}),
            Capability::Reranking,
            "/v1/rerank",
            body,
            UNARY_TIMEOUT_S,
        )
        .await?;
    Ok(Json(value))
}
