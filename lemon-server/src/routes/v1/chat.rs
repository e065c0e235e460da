//! Chat/completion routes, grounded on the predecessor's
//! `slab-server/src/routes/v1/chat.rs` SSE-forwarding pattern: the engine's
//! own chunked response is relayed byte-for-byte when streaming is requested.

use crate::error::ServerError;
use crate::state::AppState;
use crate::wire::{ChatCompletionRequest, CompletionRequest, ResponsesRequest};
use axum::body::Body;
use axum::extract::State;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;
use lemon_core::spec_table::Capability;
use serde_json::json;
use std::sync::Arc;

const UNARY_TIMEOUT_S: u64 = 30;

#[utoipa::path(post, path = "/chat/completions", request_body = ChatCompletionRequest, responses((status = 200)))]
pub async fn chat_completions(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ChatCompletionRequest>,
) -> Result<Response, ServerError> {
    let body = serde_json::to_value(&req).map_err(|e| ServerError::BadRequest(e.to_string()))?;

    if req.stream {
        let stream = state
            .orchestrator
            .dispatch_streaming(
                &req.model,
                &json!({}),
                Capability::ChatCompletion,
                "/v1/chat/completions",
                body,
                UNARY_TIMEOUT_S,
            )
            .await?;

        // The child's chunked body is forwarded byte-for-byte: re-framing it
        // into discrete SSE `Event`s would corrupt any `data:` line that
        // straddles a network chunk boundary.
        let mut response = Response::new(Body::from_stream(stream));
        response
            .headers_mut()
            .insert(header::CONTENT_TYPE, header::HeaderValue::from_static("text/event-stream"));
        return Ok(response);
    }

    let value = state
        .orchestrator
        .dispatch(
            &req.model,
            &json!({}),
            Capability::ChatCompletion,
            "/v1/chat/completions",
            body,
            UNARY_TIMEOUT_S,
        )
        .await?;

    Ok(Json(value).into_response())
}

#[utoipa::path(post, path = "/completions", request_body = CompletionRequest, responses((status = 200)))]
pub async fn completions(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CompletionRequest>,
) -> Result<impl IntoResponse, ServerError> {
    let model = req.model.clone();
    let body = serde_json::to_value(&req).map_err(|e| ServerError::BadRequest(e.to_string()))?;
    let value = state
        .orchestrator
        .dispatch(
            &model,
            &json!({}),
            Capability::ChatCompletion,
            "/v1/completions",
            body,
            UNARY_TIMEOUT_S,
        )
        .await?;
    Ok(Json(value))
}

#[utoipa::path(post, path = "/responses", request_body = ResponsesRequest, responses((status = 200)))]
pub async fn responses(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ResponsesRequest>,
) -> Result<impl IntoResponse, ServerError> {
    let model = req.model.clone();
    let value = state
        .orchestrator
        .dispatch(
            &model,
            &json!({}),
            Capability::ChatCompletion,
            "/v1/responses",
            req.rest,
            UNARY_TIMEOUT_S,
        )
        .await?;
    Ok(Json(value))
}
