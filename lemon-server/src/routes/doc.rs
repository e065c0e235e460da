use utoipa::OpenApi;

/// Aggregates every route's `#[utoipa::path]` annotation into one OpenAPI
/// document, mounted behind `LEMON_ENABLE_SWAGGER` (§6).
#[derive(OpenApi)]
#[openapi(
    paths(
        super::system::health,
        super::system::system_info,
        super::system::stats,
        super::models::list_models,
        super::models::pull_model,
        super::models::delete_model,
        super::models::load_model,
        super::models::unload_model,
        super::backends::install_backend,
        super::backends::uninstall_backend,
        super::v1::chat::chat_completions,
        super::v1::chat::completions,
        super::v1::chat::responses,
        super::v1::embeddings::embeddings,
        super::v1::embeddings::reranking,
        super::images::generations,
        super::images::edits,
        super::images::variations,
        super::audio::transcriptions,
        super::audio::speech,
    ),
    components(schemas(
        crate::wire::ChatMessage,
        crate::wire::ChatCompletionRequest,
        crate::wire::ChatCompletionResponse,
        crate::wire::ChatChoice,
        crate::wire::Usage,
        crate::wire::CompletionRequest,
        crate::wire::CompletionResponse,
        crate::wire::CompletionChoice,
        crate::wire::ResponsesRequest,
        crate::wire::EmbeddingInput,
        crate::wire::EmbeddingsRequest,
        crate::wire::EmbeddingsResponse,
        crate::wire::EmbeddingData,
        crate::wire::RerankingRequest,
        crate::wire::RerankingResponse,
        crate::wire::RerankResult,
        crate::wire::ImageGenerationRequest,
        crate::wire::ImageGenerationResponse,
        crate::wire::ImageData,
        crate::wire::AudioTranscriptionResponse,
        crate::wire::AudioSpeechRequest,
        crate::wire::ModelEntry,
        crate::wire::ModelListResponse,
        crate::wire::PullRequest,
        crate::wire::ModelRegistration,
        crate::wire::DeleteModelRequest,
        crate::wire::LoadRequest,
        crate::wire::UnloadRequest,
        crate::wire::InstallRequest,
        crate::wire::HealthEntry,
        crate::wire::StatsResponse,
    )),
    tags((name = "lemon", description = "Local inference runtime API"))
)]
pub struct ApiDoc;
