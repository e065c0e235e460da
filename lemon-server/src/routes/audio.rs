use crate::error::ServerError;
use crate::routes::images::collect_multipart;
use crate::state::AppState;
use crate::wire::AudioSpeechRequest;
use axum::extract::{Multipart, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;
use lemon_core::spec_table::Capability;
use serde_json::json;
use std::sync::Arc;

const UNARY_TIMEOUT_S: u64 = 60;

#[utoipa::path(post, path = "/audio/transcriptions", responses((status = 200)))]
pub async fn transcriptions(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<impl IntoResponse, ServerError> {
    let (model, fields) = collect_multipart(multipart).await?;
    let value = state
        .orchestrator
        .dispatch_multipart(
            &model,
            &json!({}),
            Capability::AudioTranscribe,
            "/v1/audio/transcriptions",
            fields,
            UNARY_TIMEOUT_S,
        )
        .await?;
    Ok(Json(value))
}

#[utoipa::path(post, path = "/audio/speech", request_body = AudioSpeechRequest, responses((status = 200)))]
pub async fn speech(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AudioSpeechRequest>,
) -> Result<Response, ServerError> {
    let model = req.model.clone();
    let body = serde_json::to_value(&req).map_err(|e| ServerError::BadRequest(e.to_string()))?;
    let value = state
        .orchestrator
        .dispatch(
            &model,
            &json!({}),
            Capability::AudioSpeak,
            "/v1/audio/speech",
            body,
            UNARY_TIMEOUT_S,
        )
        .await?;

    // The engine returns base64-encoded audio in a JSON envelope; unwrap it
    // back into a raw binary response for the caller.
    let audio_b64 = value
        .get("audio")
        .and_then(|v| v.as_str())
        .ok_or_else(|| ServerError::BadRequest("engine returned no audio payload".to_string()))?;
    let bytes = base64::Engine::decode(&base64::engine::general_purpose::STANDARD, audio_b64)
        .map_err(|e| ServerError::BadRequest(e.to_string()))?;

    Ok(([(header::CONTENT_TYPE, "audio/wav")], bytes).into_response())
}
