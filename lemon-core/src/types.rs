//! Shared data-model types (§3) that don't belong to any single component.

use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendState {
    Installed,
    Installable,
    UpdateRequired,
    Unsupported,
}

/// One `(recipe, backend)` row of the Recipes Cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendEntry {
    pub recipe: String,
    pub backend: String,
    pub state: BackendState,
    pub installed_version: Option<String>,
    pub required_version: Option<String>,
    pub message: String,
    pub action: String,
    pub release_url: Option<String>,
    pub archive_filename: Option<String>,
    pub archive_size: Option<u64>,
}

/// A stable hash over a normalized load-options map, used to decide whether
/// an already-loaded Engine Instance can serve a new request without reload.
/// An absent options map matches any currently-loaded fingerprint (§4.7.1).
pub fn options_fingerprint(options: &serde_json::Value) -> u64 {
    let mut entries: Vec<(String, String)> = match options.as_object() {
        Some(map) => map
            .iter()
            .map(|(k, v)| (k.clone(), v.to_string()))
            .collect(),
        None => Vec::new(),
    };
    entries.sort();

    let mut hasher = DefaultHasher::new();
    for (k, v) in entries {
        k.hash(&mut hasher);
        v.hash(&mut hasher);
    }
    hasher.finish()
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    #[test]
    fn fingerprint_is_stable_under_key_reordering() {
        let a = json!({"temperature": 0.7, "top_p": 0.9});
        let b = json!({"top_p": 0.9, "temperature": 0.7});
        assert_eq!(options_fingerprint(&a), options_fingerprint(&b));
    }

    #[test]
    fn fingerprint_differs_for_different_options() {
        let a = json!({"temperature": 0.7});
        let b = json!({"temperature": 0.2});
        assert_ne!(options_fingerprint(&a), options_fingerprint(&b));
    }
}
