//! Maps a user-facing model name to a `ModelInfo` and resolves on-disk
//! file paths for its constituent files (C8).

use crate::error::RuntimeError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// A checkpoint string is `<hub repo>` or `<hub repo>:<variant>`; the variant
/// defaults to `default` when absent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    pub name: String,
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
    /// Auxiliary file roles (`mmproj`, `text_encoder`, `vae`, ...) mapped to
    /// their filename within the checkpoint's resolved directory.
    #[serde(default)]
    pub aux_files: HashMap<String, String>,
}

impl ModelInfo {
    pub(crate) fn checkpoint_dir(&self, models_root: &Path) -> PathBuf {
        let (repo, variant) = self.checkpoint.split_once(':').unwrap_or((&self.checkpoint, "default"));
        models_root.join(repo).join(variant)
    }

    pub(crate) fn primary_filename(&self) -> String {
        self.checkpoint
            .rsplit_once(':')
            .map(|(_, variant)| variant.to_string())
            .unwrap_or_else(|| "model".to_string())
    }

    /// The on-disk path for `role` (`"weights"` for the primary checkpoint
    /// file, or a key of `aux_files`), or `None` when that role doesn't apply
    /// to this model or hasn't been downloaded yet.
    pub fn resolved_path(&self, role: &str, models_root: &Path) -> Option<PathBuf> {
        let dir = self.checkpoint_dir(models_root);
        let filename = if role == "weights" {
            self.primary_filename()
        } else {
            self.aux_files.get(role)?.clone()
        };
        let path = dir.join(filename);
        path.is_file().then_some(path)
    }

    pub fn is_downloaded(&self, models_root: &Path) -> bool {
        self.resolved_path("weights", models_root).is_some()
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct UserModels {
    models: Vec<ModelInfo>,
}

/// Registration store for user-supplied models plus path resolution against
/// `<cache_root>/models/`.
pub struct ModelResolver {
    models_root: PathBuf,
    registry_path: PathBuf,
    models: Mutex<HashMap<String, ModelInfo>>,
}

impl ModelResolver {
    pub fn load(cache_root: &Path, config_dir: &Path) -> Result<Self, RuntimeError> {
        let registry_path = config_dir.join("user_models.json");
        let models = match std::fs::read_to_string(&registry_path) {
            Ok(data) => {
                let parsed: UserModels = serde_json::from_str(&data)?;
                parsed
                    .models
                    .into_iter()
                    .map(|m| (m.name.clone(), m))
                    .collect()
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(e.into()),
        };

        Ok(Self {
            models_root: cache_root.join("models"),
            registry_path,
            models: Mutex::new(models),
        })
    }

    pub fn models_root(&self) -> &Path {
        &self.models_root
    }

    pub fn resolve(&self, model_name: &str) -> Result<ModelInfo, RuntimeError> {
        self.models
            .lock()
            .unwrap()
            .get(model_name)
            .cloned()
            .ok_or_else(|| RuntimeError::ModelNotFound {
                model: model_name.to_string(),
            })
    }

    pub fn list(&self) -> Vec<ModelInfo> {
        self.models.lock().unwrap().values().cloned().collect()
    }

    /// Register `info`, persisted before any download progress begins, so a
    /// cancelled pull still leaves the model registered as not-downloaded.
    pub fn register(&self, info: ModelInfo) -> Result<(), RuntimeError> {
        self.models.lock().unwrap().insert(info.name.clone(), info);
        self.persist()
    }

    pub fn remove(&self, model_name: &str) -> Result<(), RuntimeError> {
        self.models.lock().unwrap().remove(model_name);
        self.persist()
    }

    fn persist(&self) -> Result<(), RuntimeError> {
        let snapshot = UserModels {
            models: self.models.lock().unwrap().values().cloned().collect(),
        };
        if let Some(parent) = self.registry_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.registry_path, serde_json::to_string_pretty(&snapshot)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn sample() -> ModelInfo {
        ModelInfo {
            name: "llama-3-8b".to_string(),
            checkpoint: "meta/llama-3-8b:q4_k_m.gguf".to_string(),
            recipe: "gpu-llama".to_string(),
            reasoning: false,
            vision: false,
            embedding: false,
            reranking: false,
            aux_files: HashMap::new(),
        }
    }

    #[test]
    fn resolved_path_is_none_until_file_exists() {
        let root = std::env::temp_dir().join(format!("lemon_core_resolver_{}", std::process::id()));
        let info = sample();
        assert!(info.resolved_path("weights", &root).is_none());

        let dir = info.checkpoint_dir(&root);
        std::fs::create_dir_all(&dir).unwrap();
        let weights = dir.join(info.primary_filename());
        std::fs::write(&weights, b"").unwrap();

        assert_eq!(info.resolved_path("weights", &root), Some(weights));

        std::fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn register_then_resolve_round_trips() {
        let root = std::env::temp_dir().join(format!("lemon_core_resolver_reg_{}", std::process::id()));
        std::fs::create_dir_all(&root).unwrap();
        let resolver = ModelResolver::load(&root, &root).unwrap();
        resolver.register(sample()).unwrap();
        assert_eq!(resolver.resolve("llama-3-8b").unwrap().recipe, "gpu-llama");
        assert!(resolver.resolve("missing").is_err());
        std::fs::remove_dir_all(&root).ok();
    }
}
