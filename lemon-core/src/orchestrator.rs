//! The pre-flight state machine and request router (C10).
//!
//! Grounded on the predecessor's `Orchestrator`/command-loop idiom and its
//! per-backend `ResourceManager` semaphore for admission control, adapted
//! here to a per-`(recipe, backend)` `tokio::sync::Mutex<EngineSlot>`
//! guarding the pre-flight transition — this system's unit of work is
//! "ensure one engine process is loaded," not "run a pipeline stage."

use crate::adapter::EngineInstance;
use crate::download::{self, TransferRegistry};
use crate::error::RuntimeError;
use crate::events::Frame;
use crate::manager::BackendManager;
use crate::resolver::ModelResolver;
use crate::spec_table::{self, Capability};
use crate::types::{options_fingerprint, BackendState};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Mutex as AsyncMutex;
use tracing::{info, instrument};

#[derive(Debug, Clone)]
pub struct EngineSummary {
    pub recipe: String,
    pub backend: String,
    pub model_name: String,
    pub options_fingerprint: u64,
}

#[derive(Debug, Default)]
pub struct Stats {
    pub total_requests: u64,
    pub total_tokens: u64,
    pub last_ttft_ms: Option<u64>,
    pub last_tokens_per_sec: Option<f64>,
}

#[derive(Default)]
struct EngineSlot {
    engine: Option<Arc<EngineInstance>>,
}

pub struct Orchestrator {
    manager: Arc<BackendManager>,
    resolver: Arc<ModelResolver>,
    transfers: Arc<TransferRegistry>,
    slots: Mutex<HashMap<(String, String), Arc<AsyncMutex<EngineSlot>>>>,
    stats: Mutex<Stats>,
    next_request_id: AtomicU64,
}

impl Orchestrator {
    pub fn new(
        manager: Arc<BackendManager>,
        resolver: Arc<ModelResolver>,
        transfers: Arc<TransferRegistry>,
    ) -> Self {
        Self {
            manager,
            resolver,
            transfers,
            slots: Mutex::new(HashMap::new()),
            stats: Mutex::new(Stats::default()),
            next_request_id: AtomicU64::new(0),
        }
    }

    fn slot_for(&self, recipe: &str, backend: &str) -> Arc<AsyncMutex<EngineSlot>> {
        let key = (recipe.to_string(), backend.to_string());
        self.slots
            .lock()
            .unwrap()
            .entry(key)
            .or_insert_with(|| Arc::new(AsyncMutex::new(EngineSlot::default())))
            .clone()
    }

    /// `/health`: Orchestrator's own view of which engines are ready, with no
    /// re-probing of the child processes themselves.
    pub fn health(&self) -> Vec<EngineSummary> {
        let slots: Vec<_> = self.slots.lock().unwrap().values().cloned().collect();
        let mut out = Vec::new();
        for slot in slots {
            if let Ok(guard) = slot.try_lock() {
                if let Some(engine) = &guard.engine {
                    out.push(EngineSummary {
                        recipe: engine.recipe.clone(),
                        backend: engine.backend.clone(),
                        model_name: engine.model_name.clone(),
                        options_fingerprint: engine.options_fingerprint,
                    });
                }
            }
        }
        out
    }

    pub fn stats(&self) -> Stats {
        let s = self.stats.lock().unwrap();
        Stats {
            total_requests: s.total_requests,
            total_tokens: s.total_tokens,
            last_ttft_ms: s.last_ttft_ms,
            last_tokens_per_sec: s.last_tokens_per_sec,
        }
    }

    pub fn record_completion(&self, tokens: u64, ttft_ms: u64, tokens_per_sec: f64) {
        let mut s = self.stats.lock().unwrap();
        s.total_requests += 1;
        s.total_tokens += tokens;
        s.last_ttft_ms = Some(ttft_ms);
        s.last_tokens_per_sec = Some(tokens_per_sec);
    }

    /// `/load`: ensure `model_name` is loaded with `options`, performing
    /// backend install and model download as needed (§4.7.1).
    #[instrument(skip(self, options))]
    pub async fn load(
        &self,
        model_name: &str,
        options: &serde_json::Value,
    ) -> Result<Arc<EngineInstance>, RuntimeError> {
        let info = self.resolver.resolve(model_name)?;
        let spec = spec_table::spec_for(&info.recipe).ok_or_else(|| RuntimeError::UnsupportedBackend {
            recipe: info.recipe.clone(),
            backend: String::new(),
            reason: "unknown recipe".to_string(),
        })?;
        let backend = spec.default_backend;
        let fp = options_fingerprint(options);

        let slot = self.slot_for(&info.recipe, backend);
        // A re-entry guard (§4.7.2): a concurrent pre-flight attempt for the
        // same (recipe, backend) slot is rejected as busy rather than queued
        // behind the in-flight one.
        let mut guard = slot.try_lock().map_err(|_| RuntimeError::Busy {
            recipe: info.recipe.clone(),
            backend: backend.to_string(),
        })?;

        // Fast path (§4.7.1 step 1): an absent options map matches any
        // currently-loaded fingerprint.
        if let Some(engine) = &guard.engine {
            let options_match = options.as_object().map(|m| m.is_empty()).unwrap_or(true)
                || engine.options_fingerprint == fp;
            if engine.model_name == model_name && options_match {
                return Ok(engine.clone());
            }
        }

        self.pre_flight(&mut guard, spec, backend, &info, model_name, fp)
            .await
    }

    async fn pre_flight(
        &self,
        guard: &mut EngineSlot,
        spec: &'static spec_table::EngineSpec,
        backend: &str,
        info: &crate::resolver::ModelInfo,
        model_name: &str,
        fp: u64,
    ) -> Result<Arc<EngineInstance>, RuntimeError> {
        // 2a. Ensure the backend is installed.
        let status = self.manager.status_for(&info.recipe, backend)?;
        match status.state {
            BackendState::Unsupported => {
                return Err(RuntimeError::UnsupportedBackend {
                    recipe: info.recipe.clone(),
                    backend: backend.to_string(),
                    reason: status.message,
                });
            }
            BackendState::Installable | BackendState::UpdateRequired => {
                self.manager.install(&info.recipe, backend, |_, _| {}).await?;
            }
            BackendState::Installed => {}
        }

        // 2b. Ensure the model is downloaded.
        if !info.is_downloaded(self.resolver.models_root()) {
            download::pull(
                &self.resolver,
                &self.transfers,
                model_name,
                None,
                |_frame: Frame| {},
            )
            .await?;
        }

        // 2c. Unload a stale instance occupying this slot. `unload` stops the
        // child through a shared reference, so this holds even when an
        // in-flight request still holds its own clone of the old `Arc`: the
        // invariant of at most one live child per slot must hold the moment
        // the new instance is spawned, not just once every clone is dropped.
        if let Some(old) = guard.engine.take() {
            old.unload().await;
        }

        // 2d. Load the new instance.
        let instance = self.spawn_instance(spec, backend, info, model_name, fp).await?;
        let instance = Arc::new(instance);
        guard.engine = Some(instance.clone());
        Ok(instance)
    }

    async fn spawn_instance(
        &self,
        spec: &'static spec_table::EngineSpec,
        backend: &str,
        info: &crate::resolver::ModelInfo,
        model_name: &str,
        fp: u64,
    ) -> Result<EngineInstance, RuntimeError> {
        let version = self
            .manager
            .status_for(&info.recipe, backend)?
            .installed_version
            .ok_or_else(|| RuntimeError::BackendInstallFailed {
                recipe: info.recipe.clone(),
                backend: backend.to_string(),
                cause: "backend reports installed but no version on disk".to_string(),
            })?;
        let install_dir = self.manager.exe_path(&info.recipe, backend, &version);
        let exe_path: PathBuf = install_dir.join(spec.exe_name);

        let weights = info
            .resolved_path("weights", self.resolver.models_root())
            .ok_or_else(|| RuntimeError::ModelNotFound {
                model: model_name.to_string(),
            })?;

        let argv = vec!["-m".to_string(), weights.display().to_string()];

        EngineInstance::spawn(
            spec,
            backend,
            &exe_path,
            argv,
            HashMap::new(),
            Some(install_dir),
            model_name,
            fp,
        )
        .await
    }

    pub async fn unload(&self, recipe: &str, backend: &str) {
        let slot = self.slot_for(recipe, backend);
        let mut guard = slot.lock().await;
        if let Some(old) = guard.engine.take() {
            old.unload().await;
        }
    }

    /// Forward a unary request, with the model-invalidated re-pull-and-retry
    /// rule (§4.7.1 step 2e / §4.7.4).
    #[instrument(skip(self, options, body))]
    pub async fn dispatch(
        &self,
        model_name: &str,
        options: &serde_json::Value,
        capability: Capability,
        path: &str,
        body: serde_json::Value,
        timeout_s: u64,
    ) -> Result<serde_json::Value, RuntimeError> {
        self.next_request_id.fetch_add(1, Ordering::Relaxed);
        let engine = self.load(model_name, options).await?;
        if !engine.supports(capability) {
            return Err(RuntimeError::UnsupportedOperation {
                operation: format!("{capability:?}"),
                engine: engine.recipe.clone(),
            });
        }

        match engine.forward_request(path, body.clone(), timeout_s).await {
            Ok(value) => Ok(value),
            Err(RuntimeError::TransportError(e)) if is_not_found(&e) => {
                info!(model = model_name, "model invalidated, re-pulling and retrying once");
                download::pull(
                    &self.resolver,
                    &self.transfers,
                    model_name,
                    None,
                    |_frame: Frame| {},
                )
                .await
                .map_err(|_| RuntimeError::ModelInvalidated {
                    model: model_name.to_string(),
                })?;
                let engine = self.load(model_name, options).await?;
                engine.forward_request(path, body, timeout_s).await
            }
            Err(e) => Err(e),
        }
    }

    /// Forward a streaming request. Unlike `dispatch`, no model-invalidated
    /// retry is attempted once bytes have started flowing to the caller.
    pub async fn dispatch_streaming(
        &self,
        model_name: &str,
        options: &serde_json::Value,
        capability: Capability,
        path: &str,
        body: serde_json::Value,
        timeout_s: u64,
    ) -> Result<impl futures::Stream<Item = Result<bytes::Bytes, RuntimeError>>, RuntimeError> {
        let engine = self.load(model_name, options).await?;
        if !engine.supports(capability) {
            return Err(RuntimeError::UnsupportedOperation {
                operation: format!("{capability:?}"),
                engine: engine.recipe.clone(),
            });
        }
        engine.forward_streaming_request(path, body, timeout_s).await
    }

    /// Forward a multipart request (image edit/variation, audio
    /// transcription). No model-invalidated retry, matching `dispatch_streaming`.
    pub async fn dispatch_multipart(
        &self,
        model_name: &str,
        options: &serde_json::Value,
        capability: Capability,
        path: &str,
        fields: Vec<crate::adapter::MultipartField>,
        timeout_s: u64,
    ) -> Result<serde_json::Value, RuntimeError> {
        let engine = self.load(model_name, options).await?;
        if !engine.supports(capability) {
            return Err(RuntimeError::UnsupportedOperation {
                operation: format!("{capability:?}"),
                engine: engine.recipe.clone(),
            });
        }
        engine.forward_multipart(path, fields, timeout_s).await
    }
}

fn is_not_found(e: &reqwest::Error) -> bool {
    e.status().map(|s| s.as_u16() == 404).unwrap_or(false)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn stats_accumulate_across_completions() {
        let orch_stats = Stats::default();
        let stats = Mutex::new(orch_stats);
        {
            let mut s = stats.lock().unwrap();
            s.total_requests += 1;
            s.total_tokens += 42;
        }
        let s = stats.lock().unwrap();
        assert_eq!(s.total_requests, 1);
        assert_eq!(s.total_tokens, 42);
    }
}
