use crate::error::ServerError;
use crate::state::AppState;
use crate::wire::ImageGenerationRequest;
use axum::extract::{Multipart, State};
use axum::response::IntoResponse;
use axum::Json;
use lemon_core::adapter::MultipartField;
use lemon_core::spec_table::Capability;
use serde_json::json;
use std::sync::Arc;

const UNARY_TIMEOUT_S: u64 = 60;

#[utoipa::path(post, path = "/images/generations", request_body = ImageGenerationRequest, responses((status = 200)))]
pub async fn generations(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ImageGenerationRequest>,
) -> Result<impl IntoResponse, ServerError> {
    let model = req.model.clone();
    let body = serde_json::to_value(&req).map_err(|e| ServerError::BadRequest(e.to_string()))?;
    let value = state
        .orchestrator
        .dispatch(
            &model,
            &json!({}),
            Capability::ImageGenerate,
            "/v1/images/generations",
            body,
            UNARY_TIMEOUT_S,
        )
        .await?;
    Ok(Json(value))
}

#[utoipa::path(post, path = "/images/edits", responses((status = 200)))]
pub async fn edits(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<impl IntoResponse, ServerError> {
    let (model, fields) = collect_multipart(multipart).await?;
    let value = state
        .orchestrator
        .dispatch_multipart(
            &model,
            &json!({}),
            Capability::ImageEdit,
            "/v1/images/edits",
            fields,
            UNARY_TIMEOUT_S,
        )
        .await?;
    Ok(Json(value))
}

#[utoipa::path(post, path = "/images/variations", responses((status = 200)))]
pub async fn variations(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<impl IntoResponse, ServerError> {
    let (model, fields) = collect_multipart(multipart).await?;
    let value = state
        .orchestrator
        .dispatch_multipart(
            &model,
            &json!({}),
            Capability::ImageVariation,
            "/v1/images/variations",
            fields,
            UNARY_TIMEOUT_S,
        )
        .await?;
    Ok(Json(value))
}

/// Buffers a multipart form into `MultipartField`s, pulling out `model` so
/// the caller can resolve which engine to forward the rest to.
pub(crate) async fn collect_multipart(
    mut multipart: Multipart,
) -> Result<(String, Vec<MultipartField>), ServerError> {
    let mut model = None;
    let mut fields = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServerError::BadRequest(e.to_string()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        let filename = field.file_name().map(|f| f.to_string());
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();

        if name == "model" {
            let value = field
                .text()
                .await
                .map_err(|e| ServerError::BadRequest(e.to_string()))?;
            model = Some(value.clone());
            fields.push(MultipartField::Text { name, value });
            continue;
        }

        match filename {
            Some(filename) => {
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| ServerError::BadRequest(e.to_string()))?;
                fields.push(MultipartField::Binary {
                    name,
                    filename,
                    content_type,
                    data,
                });
            }
            None => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| ServerError::BadRequest(e.to_string()))?;
                fields.push(MultipartField::Text { name, value });
            }
        }
    }

    let model = model.ok_or_else(|| ServerError::BadRequest("missing `model` field".to_string()))?;
    Ok((model, fields))
}
