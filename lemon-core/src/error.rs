use thiserror::Error;

/// The tagged error hierarchy for the orchestration core (§7).
///
/// `lemon-server` wraps this in its own `ServerError` at the HTTP boundary,
/// mapping each variant to a status code the same way the predecessor's
/// `ServerError` maps `slab_core::RuntimeError`.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("backend {backend} of recipe {recipe} is not supported on this host: {reason}")]
    UnsupportedBackend {
        recipe: String,
        backend: String,
        reason: String,
    },

    #[error("failed to install backend {backend} of recipe {recipe}: {cause}")]
    BackendInstallFailed {
        recipe: String,
        backend: String,
        cause: String,
    },

    #[error("model {model} not found")]
    ModelNotFound { model: String },

    #[error("model {model} was invalidated by the engine")]
    ModelInvalidated { model: String },

    #[error("download aborted: {reason}")]
    DownloadAborted { reason: AbortReason },

    #[error("engine {recipe}/{backend} did not become ready within {elapsed_ms} ms")]
    EngineNotReady {
        recipe: String,
        backend: String,
        elapsed_ms: u64,
    },

    #[error("operation {operation} is not supported by engine {engine}")]
    UnsupportedOperation { operation: String, engine: String },

    #[error("transport error: {0}")]
    TransportError(#[from] reqwest::Error),

    #[error("a pre-flight transition for {recipe}/{backend} is already in progress")]
    Busy { recipe: String, backend: String },

    #[error("an install for {recipe}/{backend} is already in progress")]
    AlreadyInstalling { recipe: String, backend: String },

    #[error("no version registry entry for {recipe}/{backend}")]
    MissingVersionEntry { recipe: String, backend: String },

    #[error("stream reported an error frame: {message}")]
    StreamAborted { message: String },

    #[error(transparent)]
    Fetch(#[from] lemon_fetch::FetchError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Why a Download Transfer stopped short of `completed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbortReason {
    Paused,
    Cancelled,
}

impl std::fmt::Display for AbortReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AbortReason::Paused => write!(f, "paused"),
            AbortReason::Cancelled => write!(f, "cancelled"),
        }
    }
}
