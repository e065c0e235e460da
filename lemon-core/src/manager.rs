//! Detects, installs, and uninstalls native engine distributions, and
//! publishes the live "system recipes" view (C4).

use crate::error::RuntimeError;
use crate::registry::VersionRegistry;
use crate::spec_table::{self, EngineSpec};
use crate::types::{BackendEntry, BackendState};
use crate::version::Version;
use lemon_fetch::Downloader;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;
use tracing::{info, instrument};

pub struct BackendEnrichment {
    pub release_url: String,
    pub archive_filename: String,
    pub version: String,
}

pub struct BackendManager {
    bin_root: PathBuf,
    registry: VersionRegistry,
    downloader: Downloader,
    cache: Mutex<HashMap<(String, String), BackendEntry>>,
    installing: Mutex<HashSet<(String, String)>>,
}

impl BackendManager {
    pub fn new(cache_root: &Path, registry: VersionRegistry) -> Self {
        Self {
            bin_root: cache_root.join("bin"),
            registry,
            downloader: Downloader::new(),
            cache: Mutex::new(HashMap::new()),
            installing: Mutex::new(HashSet::new()),
        }
    }

    fn backend_root(&self, recipe: &str, backend: &str) -> PathBuf {
        self.bin_root.join(recipe).join(backend)
    }

    fn update_entry(&self, entry: BackendEntry) {
        let key = (entry.recipe.clone(), entry.backend.clone());
        self.cache.lock().unwrap().insert(key, entry);
    }

    /// Probe every `(recipe, backend)` in the static spec table and refresh
    /// the cache. The caller gets the freshly-probed snapshot; subsequent
    /// reads of `/system-info` should use `cached_status` instead.
    #[instrument(skip(self))]
    pub fn get_all_backends_status(&self) -> Result<Vec<BackendEntry>, RuntimeError> {
        let mut out = Vec::new();
        for spec in spec_table::table() {
            for backend in spec.backends {
                let entry = self.probe(spec, backend)?;
                self.update_entry(entry.clone());
                out.push(entry);
            }
        }
        Ok(out)
    }

    pub fn cached_status(&self) -> Vec<BackendEntry> {
        self.cache.lock().unwrap().values().cloned().collect()
    }

    /// Probe a single `(recipe, backend)` pair directly, without refreshing
    /// the whole table — used by the Orchestrator's pre-flight check.
    pub fn status_for(&self, recipe: &str, backend: &str) -> Result<BackendEntry, RuntimeError> {
        let spec = spec_table::spec_for(recipe).ok_or_else(|| RuntimeError::UnsupportedBackend {
            recipe: recipe.to_string(),
            backend: backend.to_string(),
            reason: "unknown recipe".to_string(),
        })?;
        let entry = self.probe(spec, backend)?;
        self.update_entry(entry.clone());
        Ok(entry)
    }

    pub fn exe_path(&self, recipe: &str, backend: &str, version: &str) -> PathBuf {
        self.backend_root(recipe, backend).join(version)
    }

    fn probe(&self, spec: &EngineSpec, backend: &str) -> Result<BackendEntry, RuntimeError> {
        if !(spec.os_supported)() {
            return Ok(BackendEntry {
                recipe: spec.recipe.to_string(),
                backend: backend.to_string(),
                state: BackendState::Unsupported,
                installed_version: None,
                required_version: None,
                message: format!("{} is not supported on this host", spec.recipe),
                action: String::new(),
                release_url: None,
                archive_filename: None,
                archive_size: None,
            });
        }

        let required = self.registry.required_version(spec.recipe, backend)?;
        let install_action = format!("install {} {}", spec.recipe, backend);

        if spec.vendor_installer {
            let installed = find_on_path(spec.exe_name);
            let state = if installed.is_some() {
                BackendState::Installed
            } else {
                BackendState::Installable
            };
            return Ok(BackendEntry {
                recipe: spec.recipe.to_string(),
                backend: backend.to_string(),
                state,
                installed_version: None,
                required_version: Some(required.as_str().to_string()),
                message: String::new(),
                action: if installed.is_some() {
                    String::new()
                } else {
                    "launch vendor installer".to_string()
                },
                release_url: None,
                archive_filename: None,
                archive_size: None,
            });
        }

        let backend_root = self.backend_root(spec.recipe, backend);
        let installed_version = lemon_fetch::installed_version(&backend_root, spec.exe_name);

        let (state, action) = match &installed_version {
            None => (BackendState::Installable, install_action),
            Some(v) if Version::parse(v) >= required => (BackendState::Installed, String::new()),
            Some(_) => (BackendState::UpdateRequired, install_action),
        };

        Ok(BackendEntry {
            recipe: spec.recipe.to_string(),
            backend: backend.to_string(),
            state,
            installed_version,
            required_version: Some(required.as_str().to_string()),
            message: String::new(),
            action,
            release_url: None,
            archive_filename: None,
            archive_size: None,
        })
    }

    pub fn get_backend_enrichment(
        &self,
        recipe: &str,
        backend: &str,
    ) -> Result<BackendEnrichment, RuntimeError> {
        let spec = spec_table::spec_for(recipe).ok_or_else(|| RuntimeError::UnsupportedBackend {
            recipe: recipe.to_string(),
            backend: backend.to_string(),
            reason: "unknown recipe".to_string(),
        })?;
        let required = self.registry.required_version(recipe, backend)?;
        let params = (spec.install_params)(backend, &required);
        Ok(BackendEnrichment {
            release_url: format!(
                "https://github.com/{}/releases/tag/{}",
                params.repo, required
            ),
            archive_filename: params.asset_name,
            version: required.as_str().to_string(),
        })
    }

    #[instrument(skip(self, progress_cb))]
    pub async fn install(
        &self,
        recipe: &str,
        backend: &str,
        mut progress_cb: impl FnMut(u64, u64) + Send,
    ) -> Result<(), RuntimeError> {
        let key = (recipe.to_string(), backend.to_string());
        {
            let mut installing = self.installing.lock().unwrap();
            if !installing.insert(key.clone()) {
                return Err(RuntimeError::AlreadyInstalling {
                    recipe: recipe.to_string(),
                    backend: backend.to_string(),
                });
            }
        }
        let result = self.install_inner(recipe, backend, &mut progress_cb).await;
        self.installing.lock().unwrap().remove(&key);
        result
    }

    async fn install_inner(
        &self,
        recipe: &str,
        backend: &str,
        progress_cb: &mut (impl FnMut(u64, u64) + Send),
    ) -> Result<(), RuntimeError> {
        let spec = spec_table::spec_for(recipe).ok_or_else(|| RuntimeError::UnsupportedBackend {
            recipe: recipe.to_string(),
            backend: backend.to_string(),
            reason: "unknown recipe".to_string(),
        })?;

        if !(spec.os_supported)() {
            return Err(RuntimeError::UnsupportedBackend {
                recipe: recipe.to_string(),
                backend: backend.to_string(),
                reason: "host predicate rejected this recipe".to_string(),
            });
        }

        if spec.vendor_installer {
            return Err(RuntimeError::BackendInstallFailed {
                recipe: recipe.to_string(),
                backend: backend.to_string(),
                cause: "this backend is managed by an external vendor installer".to_string(),
            });
        }

        let required = self.registry.required_version(recipe, backend)?;
        let params = (spec.install_params)(backend, &required);
        let backend_root = self.backend_root(recipe, backend);

        info!(recipe, backend, version = %required, "installing backend");

        lemon_fetch::install_from_github(
            &self.downloader,
            &params.repo,
            &params.asset_name,
            required.as_str(),
            &backend_root,
            spec.exe_name,
            progress_cb,
        )
        .await
        .map_err(|e| RuntimeError::BackendInstallFailed {
            recipe: recipe.to_string(),
            backend: backend.to_string(),
            cause: e.to_string(),
        })?;

        self.update_entry(BackendEntry {
            recipe: recipe.to_string(),
            backend: backend.to_string(),
            state: BackendState::Installed,
            installed_version: Some(required.as_str().to_string()),
            required_version: Some(required.as_str().to_string()),
            message: String::new(),
            action: String::new(),
            release_url: Some(format!(
                "https://github.com/{}/releases/tag/{}",
                params.repo, required
            )),
            archive_filename: Some(params.asset_name),
            archive_size: None,
        });

        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn uninstall(&self, recipe: &str, backend: &str) -> Result<(), RuntimeError> {
        let backend_root = self.backend_root(recipe, backend);
        if !backend_root.exists() {
            return Ok(());
        }

        let mut last_err = None;
        for attempt in 0..5 {
            match std::fs::remove_dir_all(&backend_root) {
                Ok(()) => {
                    last_err = None;
                    break;
                }
                Err(e) => {
                    last_err = Some(e);
                    if attempt + 1 < 5 {
                        tokio::time::sleep(Duration::from_millis(500)).await;
                    }
                }
            }
        }

        if backend_root.exists() {
            if let Some(e) = last_err {
                return Err(RuntimeError::Io(e));
            }
        }

        let spec = spec_table::spec_for(recipe);
        let required = self
            .registry
            .required_version(recipe, backend)
            .ok()
            .map(|v| v.as_str().to_string());
        self.update_entry(BackendEntry {
            recipe: recipe.to_string(),
            backend: backend.to_string(),
            state: BackendState::Installable,
            installed_version: None,
            required_version: required,
            message: String::new(),
            action: spec
                .map(|_| format!("install {recipe} {backend}"))
                .unwrap_or_default(),
            release_url: None,
            archive_filename: None,
            archive_size: None,
        });

        Ok(())
    }
}

fn find_on_path(exe_name: &str) -> Option<PathBuf> {
    let path_var = std::env::var_os("PATH")?;
    std::env::split_paths(&path_var)
        .map(|dir| dir.join(exe_name))
        .find(|candidate| candidate.is_file())
}

#[cfg(test)]
mod test {
    use super::*;

    fn test_registry() -> VersionRegistry {
        serde_json::from_str(
            r#"{"versions": {
                "gpu-llama/vulkan": "b4500",
                "gpu-llama/rocm": "b4500",
                "gpu-llama/cpu": "b4500",
                "whisper/cpu": "v1.8.3",
                "diffusion/vulkan": "v0.14.2",
                "diffusion/cpu": "v0.14.2",
                "tts/cpu": "v0.3.1",
                "npu-llm/npu": "v1.0.4",
                "ryzen-ai/ryzen-ai": "v1.2.0"
            }}"#,
        )
        .unwrap()
    }

    #[test]
    fn uninstalled_backend_is_installable() {
        let root = std::env::temp_dir().join(format!("lemon_core_mgr_test_{}", std::process::id()));
        let mgr = BackendManager::new(&root, test_registry());
        let statuses = mgr.get_all_backends_status().unwrap();
        let whisper = statuses
            .iter()
            .find(|b| b.recipe == "whisper" && b.backend == "cpu")
            .unwrap();
        assert_eq!(whisper.state, BackendState::Installable);
        std::fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn uninstall_nonexistent_is_a_no_op() {
        let root = std::env::temp_dir().join(format!("lemon_core_mgr_test2_{}", std::process::id()));
        let mgr = BackendManager::new(&root, test_registry());
        let result = futures::executor::block_on(mgr.uninstall("whisper", "cpu"));
        assert!(result.is_ok());
    }
}
