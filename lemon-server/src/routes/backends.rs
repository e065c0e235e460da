use crate::state::AppState;
use crate::wire::InstallRequest;
use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use axum::Json;
use futures::stream::Stream;
use lemon_core::events::{Frame, ProgressPayload};
use serde_json::json;
use std::convert::Infallible;
use std::sync::Arc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt as _;

/// `/install`: streams backend-install progress the same way `/pull` streams
/// model-download progress (both ride the Event Channel, C11).
#[utoipa::path(post, path = "/install", request_body = InstallRequest, responses((status = 200)))]
pub async fn install_backend(
    State(state): State<Arc<AppState>>,
    Json(req): Json<InstallRequest>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let (tx, rx) = tokio::sync::mpsc::channel::<Frame>(32);

    let manager = state.manager.clone();
    let recipe = req.recipe.clone();
    let backend = req.backend.clone();
    let display_name = format!("{recipe}/{backend}");

    tokio::spawn(async move {
        let tx_progress = tx.clone();
        let result = manager
            .install(&recipe, &backend, move |received, total| {
                let _ = tx_progress.try_send(Frame::Progress(ProgressPayload::new(
                    received,
                    total,
                    display_name.clone(),
                )));
            })
            .await;

        let frame = match result {
            Ok(()) => Frame::Complete,
            Err(e) => Frame::Error(e.to_string()),
        };
        let _ = tx.try_send(frame);
    });

    let stream = ReceiverStream::new(rx).map(|frame: Frame| {
        Ok(Event::default()
            .event(frame.event_name())
            .data(frame.payload_json().to_string()))
    });
    Sse::new(stream).keep_alive(KeepAlive::default())
}

#[utoipa::path(post, path = "/uninstall", request_body = InstallRequest, responses((status = 200)))]
pub async fn uninstall_backend(
    State(state): State<Arc<AppState>>,
    Json(req): Json<InstallRequest>,
) -> Result<impl IntoResponse, crate::error::ServerError> {
    state.manager.uninstall(&req.recipe, &req.backend).await?;
    Ok(Json(json!({ "uninstalled": true })))
}
