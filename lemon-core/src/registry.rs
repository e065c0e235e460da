use crate::error::RuntimeError;
use crate::version::Version;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Bundled fallback table, seeded when `<config_root>/backend_versions.json`
/// is absent at startup — mirrors how the predecessor's `Config` ships
/// compiled-in defaults for every env-derived field.
const DEFAULT_TABLE: &str = include_str!("../resources/backend_versions.json");

/// Maps `(recipe, backend)` to the version required for that pairing to be
/// considered `installed` rather than `update_required`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionRegistry {
    versions: HashMap<String, String>,
}

fn key(recipe: &str, backend: &str) -> String {
    format!("{recipe}/{backend}")
}

impl VersionRegistry {
    /// Load from `<config_root>/backend_versions.json`, falling back to the
    /// bundled default table when the file does not exist.
    pub fn load(config_dir: &Path) -> Result<Self, RuntimeError> {
        let path = config_dir.join("backend_versions.json");
        let data = match std::fs::read_to_string(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => DEFAULT_TABLE.to_string(),
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_str(&data)?)
    }

    pub fn required_version(&self, recipe: &str, backend: &str) -> Result<Version, RuntimeError> {
        self.versions
            .get(&key(recipe, backend))
            .map(|s| Version::parse(s))
            .ok_or_else(|| RuntimeError::MissingVersionEntry {
                recipe: recipe.to_string(),
                backend: backend.to_string(),
            })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn bundled_default_parses() {
        let registry: VersionRegistry = serde_json::from_str(DEFAULT_TABLE).unwrap();
        assert!(registry.required_version("gpu-llama", "vulkan").is_ok());
    }

    #[test]
    fn missing_entry_errors() {
        let registry = VersionRegistry {
            versions: HashMap::new(),
        };
        assert!(matches!(
            registry.required_version("gpu-llama", "vulkan"),
            Err(RuntimeError::MissingVersionEntry { .. })
        ));
    }
}
