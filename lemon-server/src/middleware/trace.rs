use crate::db::RequestStore;
use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info_span, Instrument};
use uuid::Uuid;

/// Tags every request with a trace ID, logs it via `tracing`, and persists a
/// `RequestRecord` row — the predecessor's `TraceLayer`/`TraceMiddleware`
/// pattern, implemented here as an `axum::middleware::from_fn_with_state`
/// function rather than a hand-rolled `tower::Layer`, since this service has
/// exactly one cross-cutting concern to apply rather than a stack of them.
pub async fn trace_requests(
    State(store): State<Arc<RequestStore>>,
    request: Request,
    next: Next,
) -> Response {
    let trace_id = Uuid::new_v4().to_string();
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let started = Instant::now();

    let span = info_span!("request", trace_id = %trace_id, method = %method, path = %path);
    let response = next.run(request).instrument(span).await;

    let status = response.status().as_u16();
    let latency_ms = started.elapsed().as_millis() as u64;

    let store = store.clone();
    let trace_id_owned = trace_id.clone();
    tokio::spawn(async move {
        if let Err(e) = store
            .record(&trace_id_owned, &method, &path, status, latency_ms)
            .await
        {
            tracing::warn!(error = %e, "failed to persist request audit log row");
        }
    });

    response
}
