use crate::error::ServerError;
use crate::state::AppState;
use crate::wire::{
    DeleteModelRequest, LoadRequest, ModelEntry, ModelListResponse, ModelRegistration,
    PullRequest, UnloadRequest,
};
use axum::extract::{Query, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use axum::Json;
use futures::stream::Stream;
use lemon_core::resolver::ModelInfo;
use serde::Deserialize;
use serde_json::json;
use std::convert::Infallible;
use std::sync::Arc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt as _;

#[derive(Debug, Deserialize)]
pub struct ShowAllQuery {
    #[serde(default)]
    pub show_all: bool,
}

#[utoipa::path(get, path = "/models", responses((status = 200, body = ModelListResponse)))]
pub async fn list_models(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ShowAllQuery>,
) -> Json<ModelListResponse> {
    let models_root = state.resolver.models_root().to_path_buf();
    let data: Vec<ModelEntry> = state
        .resolver
        .list()
        .into_iter()
        .map(|m| {
            let downloaded = m.is_downloaded(&models_root);
            (m, downloaded)
        })
        .filter(|(_, downloaded)| query.show_all || *downloaded)
        .map(|(m, downloaded)| ModelEntry {
            id: m.name,
            object: "model".to_string(),
            recipe: m.recipe,
            downloaded,
        })
        .collect();

    Json(ModelListResponse {
        object: "list".to_string(),
        data,
    })
}

/// `/pull`: streams `started → progress* → (complete | error)` (§4.6).
#[utoipa::path(post, path = "/pull", request_body = PullRequest, responses((status = 200)))]
pub async fn pull_model(
    State(state): State<Arc<AppState>>,
    Json(req): Json<PullRequest>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let (tx, rx) = tokio::sync::mpsc::channel::<lemon_core::events::Frame>(32);

    let resolver = state.resolver.clone();
    let transfers = state.transfers.clone();
    let model_name = req.model.clone();
    let registration = req.registration.map(|r| ModelInfo {
        name: model_name.clone(),
        checkpoint: r.checkpoint,
        recipe: r.recipe,
        reasoning: r.reasoning,
        vision: r.vision,
        embedding: r.embedding,
        reranking: r.reranking,
        aux_files: Default::default(),
    });

    tokio::spawn(async move {
        let _ = lemon_core::download::pull(
            &resolver,
            &transfers,
            &model_name,
            registration,
            move |frame| {
                let _ = tx.try_send(frame);
            },
        )
        .await;
    });

    let stream = ReceiverStream::new(rx).map(|frame: lemon_core::events::Frame| {
        Ok(Event::default()
            .event(frame.event_name())
            .data(frame.payload_json().to_string()))
    });
    Sse::new(stream).keep_alive(KeepAlive::default())
}

#[utoipa::path(post, path = "/delete", request_body = DeleteModelRequest, responses((status = 200)))]
pub async fn delete_model(
    State(state): State<Arc<AppState>>,
    Json(req): Json<DeleteModelRequest>,
) -> Result<impl IntoResponse, ServerError> {
    let info = state
        .resolver
        .resolve(&req.model)
        .map_err(ServerError::from)?;
    if let Some(path) = info.resolved_path("weights", state.resolver.models_root()) {
        if let Some(dir) = path.parent() {
            let _ = std::fs::remove_dir_all(dir);
        }
    }
    state.resolver.remove(&req.model)?;
    Ok(Json(json!({ "deleted": req.model })))
}

#[utoipa::path(post, path = "/load", request_body = LoadRequest, responses((status = 200)))]
pub async fn load_model(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoadRequest>,
) -> Result<impl IntoResponse, ServerError> {
    let engine = state.orchestrator.load(&req.model, &req.options).await?;
    Ok(Json(json!({
        "recipe": engine.recipe,
        "backend": engine.backend,
        "model": engine.model_name,
        "port": engine.port,
    })))
}

#[utoipa::path(post, path = "/unload", request_body = UnloadRequest, responses((status = 200)))]
pub async fn unload_model(
    State(state): State<Arc<AppState>>,
    Json(req): Json<UnloadRequest>,
) -> impl IntoResponse {
    state.orchestrator.unload(&req.recipe, &req.backend).await;
    Json(json!({ "unloaded": true }))
}
