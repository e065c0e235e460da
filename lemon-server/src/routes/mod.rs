pub mod audio;
pub mod backends;
pub mod doc;
pub mod images;
pub mod models;
pub mod system;
pub mod v1;

use crate::middleware::{cors, trace::trace_requests};
use crate::state::AppState;
use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Assembles the full HTTP surface (§6), applies CORS and the ambient
/// request-audit middleware, and mounts Swagger UI when enabled.
pub fn build(state: Arc<AppState>) -> Router {
    let enable_swagger = state.config.enable_swagger;
    let store = state.store.clone();

    let mut router = Router::new()
        .route("/health", get(system::health))
        .route("/system-info", get(system::system_info))
        .route("/stats", get(system::stats))
        .route("/models", get(models::list_models))
        .route("/pull", post(models::pull_model))
        .route("/delete", post(models::delete_model))
        .route("/load", post(models::load_model))
        .route("/unload", post(models::unload_model))
        .route("/install", post(backends::install_backend))
        .route("/uninstall", post(backends::uninstall_backend))
        .route("/chat/completions", post(v1::chat::chat_completions))
        .route("/completions", post(v1::chat::completions))
        .route("/responses", post(v1::chat::responses))
        .route("/embeddings", post(v1::embeddings::embeddings))
        .route("/reranking", post(v1::embeddings::reranking))
        .route("/images/generations", post(images::generations))
        .route("/images/edits", post(images::edits))
        .route("/images/variations", post(images::variations))
        .route("/audio/transcriptions", post(audio::transcriptions))
        .route("/audio/speech", post(audio::speech))
        .with_state(state.clone());

    if enable_swagger {
        router = router.merge(SwaggerUi::new("/docs").url("/openapi.json", doc::ApiDoc::openapi()));
    }

    router
        .route_layer(from_fn_with_state(store, trace_requests))
        .layer(cors::layer(&state.config.cors_origins))
}
