use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use lemon_core::RuntimeError;
use serde_json::json;
use thiserror::Error;

/// HTTP-boundary error type, wrapping `lemon_core::RuntimeError` exactly as
/// the predecessor's `ServerError` wraps `slab_core::RuntimeError` — each
/// tagged kind maps to a status code and a JSON `{error}` body (§7).
#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    #[error("invalid request: {0}")]
    BadRequest(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ServerError::Runtime(e) => runtime_status(e),
            ServerError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ServerError::Database(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
            ServerError::Internal(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

fn runtime_status(e: &RuntimeError) -> (StatusCode, String) {
    let status = match e {
        RuntimeError::UnsupportedBackend { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        RuntimeError::UnsupportedOperation { .. } => StatusCode::BAD_REQUEST,
        RuntimeError::ModelNotFound { .. } => StatusCode::NOT_FOUND,
        RuntimeError::ModelInvalidated { .. } => StatusCode::BAD_GATEWAY,
        RuntimeError::EngineNotReady { .. } => StatusCode::BAD_GATEWAY,
        RuntimeError::BackendInstallFailed { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        RuntimeError::TransportError(_) => StatusCode::BAD_GATEWAY,
        RuntimeError::Busy { .. } | RuntimeError::AlreadyInstalling { .. } => {
            StatusCode::CONFLICT
        }
        RuntimeError::DownloadAborted { .. } => StatusCode::GONE,
        RuntimeError::StreamAborted { .. } => StatusCode::BAD_GATEWAY,
        RuntimeError::MissingVersionEntry { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        RuntimeError::Fetch(_) | RuntimeError::Io(_) | RuntimeError::Json(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (status, e.to_string())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn model_not_found_maps_to_404() {
        let e = RuntimeError::ModelNotFound {
            model: "x".to_string(),
        };
        assert_eq!(runtime_status(&e).0, StatusCode::NOT_FOUND);
    }

    #[test]
    fn unsupported_backend_maps_to_422() {
        let e = RuntimeError::UnsupportedBackend {
            recipe: "r".to_string(),
            backend: "b".to_string(),
            reason: "nope".to_string(),
        };
        assert_eq!(runtime_status(&e).0, StatusCode::UNPROCESSABLE_ENTITY);
    }
}
