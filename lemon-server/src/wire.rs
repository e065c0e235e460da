//! OpenAI-compatible wire types, consolidated from the predecessor's
//! `slab-server::models::openai` module tree into one file since this
//! service's wire surface is a fixed, closed set of endpoints rather than a
//! growing per-feature schema tree.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub stream: bool,
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ChatChoice {
    pub index: u32,
    pub message: ChatMessage,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Default)]
pub struct Usage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ChatCompletionResponse {
    pub id: String,
    pub object: String,
    pub created: i64,
    pub model: String,
    pub choices: Vec<ChatChoice>,
    pub usage: Usage,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CompletionRequest {
    pub model: String,
    pub prompt: String,
    #[serde(default)]
    pub stream: bool,
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CompletionChoice {
    pub index: u32,
    pub text: String,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CompletionResponse {
    pub id: String,
    pub object: String,
    pub created: i64,
    pub model: String,
    pub choices: Vec<CompletionChoice>,
    pub usage: Usage,
}

/// A near-passthrough wrapper for the OpenAI Responses API: only `model` is
/// inspected for routing, the rest of the body is forwarded to the engine
/// unmodified.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ResponsesRequest {
    pub model: String,
    #[serde(flatten)]
    pub rest: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(untagged)]
pub enum EmbeddingInput {
    One(String),
    Many(Vec<String>),
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct EmbeddingsRequest {
    pub model: String,
    pub input: EmbeddingInput,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct EmbeddingData {
    pub index: u32,
    pub embedding: Vec<f32>,
    pub object: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct EmbeddingsResponse {
    pub object: String,
    pub data: Vec<EmbeddingData>,
    pub model: String,
    pub usage: Usage,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct RerankingRequest {
    pub model: String,
    pub query: String,
    pub documents: Vec<String>,
    pub top_n: Option<usize>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RerankResult {
    pub index: u32,
    pub relevance_score: f32,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RerankingResponse {
    pub model: String,
    pub results: Vec<RerankResult>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ImageGenerationRequest {
    pub model: String,
    pub prompt: String,
    #[serde(default = "default_n")]
    pub n: u32,
    pub size: Option<String>,
    pub response_format: Option<String>,
}

fn default_n() -> u32 {
    1
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ImageData {
    pub b64_json: Option<String>,
    pub url: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ImageGenerationResponse {
    pub created: i64,
    pub data: Vec<ImageData>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AudioTranscriptionResponse {
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AudioSpeechRequest {
    pub model: String,
    pub input: String,
    pub voice: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ModelEntry {
    pub id: String,
    pub object: String,
    pub recipe: String,
    pub downloaded: bool,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ModelListResponse {
    pub object: String,
    pub data: Vec<ModelEntry>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct PullRequest {
    pub model: String,
    pub registration: Option<ModelRegistration>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ModelRegistration {
    pub checkpoint: String,
    pub recipe: String,
    #[serde(default)]
    pub reasoning: bool,
    #[serde(default)]
    pub vision: bool,
    #[serde(default)]
    pub embedding: bool,
    #[serde(default)]
    pub reranking: bool,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct DeleteModelRequest {
    pub model: String,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct LoadRequest {
    pub model: String,
    #[serde(default)]
    pub options: serde_json::Value,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct UnloadRequest {
    pub recipe: String,
    pub backend: String,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct InstallRequest {
    pub recipe: String,
    pub backend: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct HealthEntry {
    pub recipe: String,
    pub backend: String,
    pub model: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct StatsResponse {
    pub total_requests: u64,
    pub total_tokens: u64,
    pub last_ttft_ms: Option<u64>,
    pub last_tokens_per_sec: Option<f64>,
}
