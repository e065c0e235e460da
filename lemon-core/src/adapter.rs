//! Base behavior shared by every engine subprocess: choose a port, launch,
//! wait for readiness, forward requests, unload (C7).
//!
//! All six recipes share this one implementation; they differ only in their
//! `EngineSpec` table entry (C3) — executable name, readiness path, and
//! capability set.

use crate::error::RuntimeError;
use crate::port;
use crate::process::{self, ProcessHandle, SpawnOptions};
use crate::spec_table::{Capability, EngineSpec};
use bytes::Bytes;
use futures::Stream;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{info, instrument, warn};

const READINESS_POLL_INTERVAL: Duration = Duration::from_millis(200);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    Starting,
    Ready,
    Failed,
    Stopped,
}

pub enum MultipartField {
    Text { name: String, value: String },
    Binary {
        name: String,
        filename: String,
        content_type: String,
        data: Bytes,
    },
}

/// A live child process bound to exactly one loaded model.
///
/// `readiness` and `process` are behind interior-mutability locks rather than
/// requiring `&mut self` so that [`EngineInstance::unload`] can stop the
/// child through a shared `Arc<EngineInstance>` — callers may still be
/// holding a clone when the orchestrator evicts this instance from its slot.
pub struct EngineInstance {
    pub recipe: String,
    pub backend: String,
    pub model_name: String,
    pub options_fingerprint: u64,
    pub port: u16,
    pub started_at: Instant,
    readiness: std::sync::Mutex<Readiness>,
    process: tokio::sync::Mutex<ProcessHandle>,
    client: reqwest::Client,
    capabilities: &'static [Capability],
}

impl EngineInstance {
    /// Choose a port, spawn the child, and block until the readiness probe
    /// returns a 2xx or the recipe's deadline elapses.
    #[instrument(skip(spec, argv, env))]
    pub async fn spawn(
        spec: &EngineSpec,
        backend: &str,
        exe_path: &Path,
        mut argv: Vec<String>,
        mut env: HashMap<String, String>,
        cwd: Option<PathBuf>,
        model_name: &str,
        options_fingerprint: u64,
    ) -> Result<Self, RuntimeError> {
        let chosen_port = port::allocate()?;
        argv.push("--port".to_string());
        argv.push(chosen_port.to_string());

        prepend_path_var(&mut env, "PATH", exe_path.parent());
        prepend_path_var(&mut env, "LD_LIBRARY_PATH", exe_path.parent());

        let opts = SpawnOptions {
            cwd,
            env,
            inherit_output: false,
            filter_health_logs: true,
            readiness_path: spec.readiness_path.to_string(),
        };

        let process = process::spawn(exe_path, &argv, &opts)?;

        let instance = Self {
            recipe: spec.recipe.to_string(),
            backend: backend.to_string(),
            model_name: model_name.to_string(),
            options_fingerprint,
            port: chosen_port,
            started_at: Instant::now(),
            readiness: std::sync::Mutex::new(Readiness::Starting),
            process: tokio::sync::Mutex::new(process),
            client: reqwest::Client::new(),
            capabilities: spec.capabilities,
        };

        instance
            .wait_until_ready(spec.readiness_path, spec.readiness_deadline_secs)
            .await?;
        Ok(instance)
    }

    async fn wait_until_ready(&self, path: &str, deadline_secs: u64) -> Result<(), RuntimeError> {
        let deadline = Instant::now() + Duration::from_secs(deadline_secs);
        let url = format!("http://127.0.0.1:{}{}", self.port, path);

        loop {
            if !self.process.lock().await.is_running() {
                self.set_readiness(Readiness::Failed);
                return Err(RuntimeError::EngineNotReady {
                    recipe: self.recipe.clone(),
                    backend: self.backend.clone(),
                    elapsed_ms: self.started_at.elapsed().as_millis() as u64,
                });
            }

            if let Ok(resp) = self.client.get(&url).send().await {
                if resp.status().is_success() {
                    self.set_readiness(Readiness::Ready);
                    info!(recipe = %self.recipe, backend = %self.backend, port = self.port, "engine ready");
                    return Ok(());
                }
            }

            if Instant::now() >= deadline {
                self.process.lock().await.stop().await;
                self.set_readiness(Readiness::Failed);
                return Err(RuntimeError::EngineNotReady {
                    recipe: self.recipe.clone(),
                    backend: self.backend.clone(),
                    elapsed_ms: self.started_at.elapsed().as_millis() as u64,
                });
            }

            tokio::time::sleep(READINESS_POLL_INTERVAL).await;
        }
    }

    fn set_readiness(&self, r: Readiness) {
        *self.readiness.lock().unwrap() = r;
    }

    pub fn readiness(&self) -> Readiness {
        *self.readiness.lock().unwrap()
    }

    pub fn supports(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }

    fn base_url(&self, path: &str) -> String {
        format!("http://127.0.0.1:{}{}", self.port, path)
    }

    /// `forward_request` (§4.5): unary JSON request/response.
    pub async fn forward_request(
        &self,
        path: &str,
        body: serde_json::Value,
        timeout_s: u64,
    ) -> Result<serde_json::Value, RuntimeError> {
        let resp = self
            .client
            .post(self.base_url(path))
            .json(&body)
            .timeout(Duration::from_secs(timeout_s))
            .send()
            .await?
            .error_for_status()?;
        Ok(resp.json().await?)
    }

    /// `forward_streaming_request` (§4.5): copies the child's chunked body to
    /// the caller unmodified; `sse` frames pass through byte-for-byte.
    pub async fn forward_streaming_request(
        &self,
        path: &str,
        body: serde_json::Value,
        timeout_s: u64,
    ) -> Result<impl Stream<Item = Result<Bytes, RuntimeError>>, RuntimeError> {
        use futures::StreamExt;

        let resp = self
            .client
            .post(self.base_url(path))
            .json(&body)
            .timeout(Duration::from_secs(timeout_s))
            .send()
            .await?
            .error_for_status()?;

        Ok(resp.bytes_stream().map(|r| r.map_err(RuntimeError::from)))
    }

    /// `forward_multipart` (§4.5): used by image-edit/variation and audio
    /// transcription endpoints where the child expects `multipart/form-data`.
    pub async fn forward_multipart(
        &self,
        path: &str,
        fields: Vec<MultipartField>,
        timeout_s: u64,
    ) -> Result<serde_json::Value, RuntimeError> {
        let mut form = reqwest::multipart::Form::new();
        for field in fields {
            form = match field {
                MultipartField::Text { name, value } => form.text(name, value),
                MultipartField::Binary {
                    name,
                    filename,
                    content_type,
                    data,
                } => {
                    let part = reqwest::multipart::Part::bytes(data.to_vec())
                        .file_name(filename)
                        .mime_str(&content_type)
                        .unwrap_or_else(|_| reqwest::multipart::Part::bytes(Vec::new()));
                    form.part(name, part)
                }
            };
        }

        let resp = self
            .client
            .post(self.base_url(path))
            .multipart(form)
            .timeout(Duration::from_secs(timeout_s))
            .send()
            .await?
            .error_for_status()?;
        Ok(resp.json().await?)
    }

    /// Stop the child, releasing the port. Takes `&self` rather than
    /// consuming the instance: the orchestrator may still hold other clones
    /// of the surrounding `Arc` when evicting a slot, and the invariant of
    /// at most one live child per `(recipe, backend)` slot requires the old
    /// child to actually stop rather than being skipped on contention.
    pub async fn unload(&self) {
        self.process.lock().await.stop().await;
        self.set_readiness(Readiness::Stopped);
        warn!(recipe = %self.recipe, backend = %self.backend, "engine unloaded");
    }
}

fn prepend_path_var(env: &mut HashMap<String, String>, var: &str, dir: Option<&Path>) {
    let Some(dir) = dir else { return };
    let sep = if cfg!(windows) { ";" } else { ":" };
    let existing = env
        .get(var)
        .cloned()
        .or_else(|| std::env::var(var).ok())
        .unwrap_or_default();
    let new_value = if existing.is_empty() {
        dir.display().to_string()
    } else {
        format!("{}{sep}{existing}", dir.display())
    };
    env.insert(var.to_string(), new_value);
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn prepend_path_var_preserves_host_value() {
        let mut env = HashMap::new();
        env.insert("PATH".to_string(), "/usr/bin".to_string());
        prepend_path_var(&mut env, "PATH", Some(Path::new("/opt/engine")));
        let value = env.get("PATH").unwrap();
        assert!(value.starts_with("/opt/engine"));
        assert!(value.contains("/usr/bin"));
    }

    #[test]
    fn prepend_path_var_noop_without_dir() {
        let mut env = HashMap::new();
        prepend_path_var(&mut env, "PATH", None);
        assert!(env.is_empty());
    }
}
