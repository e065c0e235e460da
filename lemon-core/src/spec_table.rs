//! Static map from recipe to executable name, install-params function,
//! capability set, and OS-support predicate (C3).

use crate::version::Version;

/// One inference capability a recipe may support.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Capability {
    ChatCompletion,
    Embeddings,
    Reranking,
    ImageGenerate,
    ImageEdit,
    ImageVariation,
    AudioTranscribe,
    AudioSpeak,
}

/// Source repository and archive filename for a `(recipe, backend, version)`.
#[derive(Debug, Clone)]
pub struct InstallParams {
    pub repo: String,
    pub asset_name: String,
}

/// The static, compiled-in description of one recipe.
pub struct EngineSpec {
    pub recipe: &'static str,
    pub default_backend: &'static str,
    pub backends: &'static [&'static str],
    pub exe_name: &'static str,
    pub capabilities: &'static [Capability],
    pub readiness_path: &'static str,
    pub readiness_deadline_secs: u64,
    /// True for the one recipe (`ryzen-ai`) driven by an external vendor
    /// installer rather than C1's GitHub-release flow.
    pub vendor_installer: bool,
    pub os_supported: fn() -> bool,
    pub install_params: fn(backend: &str, version: &Version) -> InstallParams,
}

fn always_supported() -> bool {
    true
}

fn npu_supported() -> bool {
    // NPU runtime is currently only shipped for Windows hosts.
    cfg!(target_os = "windows")
}

fn gpu_llama_install_params(backend: &str, version: &Version) -> InstallParams {
    let (os, arch) = (std::env::consts::OS, std::env::consts::ARCH);
    InstallParams {
        repo: "ggml-org/llama.cpp".to_string(),
        asset_name: format!("llama-{version}-bin-{os}-{backend}-{arch}.zip"),
    }
}

fn whisper_install_params(_backend: &str, version: &Version) -> InstallParams {
    let (os, arch) = (std::env::consts::OS, std::env::consts::ARCH);
    InstallParams {
        repo: "ggml-org/whisper.cpp".to_string(),
        asset_name: format!("whisper-{version}-bin-{os}-{arch}.zip"),
    }
}

fn diffusion_install_params(backend: &str, version: &Version) -> InstallParams {
    let (os, arch) = (std::env::consts::OS, std::env::consts::ARCH);
    InstallParams {
        repo: "leejet/stable-diffusion.cpp".to_string(),
        asset_name: format!("sd-{version}-{os}-{backend}-{arch}.tar.gz"),
    }
}

fn tts_install_params(_backend: &str, version: &Version) -> InstallParams {
    let (os, arch) = (std::env::consts::OS, std::env::consts::ARCH);
    InstallParams {
        repo: "rhasspy/piper".to_string(),
        asset_name: format!("piper-{version}-{os}-{arch}.tar.gz"),
    }
}

fn npu_llm_install_params(_backend: &str, version: &Version) -> InstallParams {
    InstallParams {
        repo: "amd/npu-llm-server".to_string(),
        asset_name: format!("npu-llm-server-{version}-windows-x86_64.zip"),
    }
}

fn ryzen_ai_install_params(_backend: &str, version: &Version) -> InstallParams {
    InstallParams {
        repo: "amd/ryzen-ai-server".to_string(),
        asset_name: format!("ryzen-ai-server-{version}-installer.exe"),
    }
}

pub fn table() -> &'static [EngineSpec] {
    use Capability::*;
    static TABLE: &[EngineSpec] = &[
        EngineSpec {
            recipe: "gpu-llama",
            default_backend: "vulkan",
            backends: &["vulkan", "rocm", "cpu"],
            exe_name: if cfg!(target_os = "windows") {
                "llama-server.exe"
            } else {
                "llama-server"
            },
            capabilities: &[ChatCompletion, Embeddings, Reranking],
            readiness_path: "/health",
            readiness_deadline_secs: 60,
            vendor_installer: false,
            os_supported: always_supported,
            install_params: gpu_llama_install_params,
        },
        EngineSpec {
            recipe: "whisper",
            default_backend: "cpu",
            backends: &["cpu"],
            exe_name: if cfg!(target_os = "windows") {
                "whisper-server.exe"
            } else {
                "whisper-server"
            },
            capabilities: &[AudioTranscribe],
            readiness_path: "/",
            readiness_deadline_secs: 60,
            vendor_installer: false,
            os_supported: always_supported,
            install_params: whisper_install_params,
        },
        EngineSpec {
            recipe: "diffusion",
            default_backend: "vulkan",
            backends: &["vulkan", "cpu"],
            exe_name: if cfg!(target_os = "windows") {
                "sd-server.exe"
            } else {
                "sd-server"
            },
            capabilities: &[ImageGenerate, ImageEdit, ImageVariation],
            readiness_path: "/health",
            readiness_deadline_secs: 60,
            vendor_installer: false,
            os_supported: always_supported,
            install_params: diffusion_install_params,
        },
        EngineSpec {
            recipe: "tts",
            default_backend: "cpu",
            backends: &["cpu"],
            exe_name: if cfg!(target_os = "windows") {
                "piper-server.exe"
            } else {
                "piper-server"
            },
            capabilities: &[AudioSpeak],
            readiness_path: "/health",
            readiness_deadline_secs: 30,
            vendor_installer: false,
            os_supported: always_supported,
            install_params: tts_install_params,
        },
        EngineSpec {
            recipe: "npu-llm",
            default_backend: "npu",
            backends: &["npu"],
            exe_name: "npu-llm-server.exe",
            capabilities: &[ChatCompletion],
            readiness_path: "/api/tags",
            readiness_deadline_secs: 60,
            vendor_installer: false,
            os_supported: npu_supported,
            install_params: npu_llm_install_params,
        },
        EngineSpec {
            recipe: "ryzen-ai",
            default_backend: "ryzen-ai",
            backends: &["ryzen-ai"],
            exe_name: "ryzen-ai-server.exe",
            capabilities: &[ChatCompletion],
            readiness_path: "/health",
            readiness_deadline_secs: 60,
            vendor_installer: true,
            os_supported: || cfg!(target_os = "windows"),
            install_params: ryzen_ai_install_params,
        },
    ];
    TABLE
}

pub fn spec_for(recipe: &str) -> Option<&'static EngineSpec> {
    table().iter().find(|s| s.recipe == recipe)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn every_recipe_has_its_default_backend_listed() {
        for spec in table() {
            assert!(spec.backends.contains(&spec.default_backend));
        }
    }

    #[test]
    fn spec_for_unknown_recipe_is_none() {
        assert!(spec_for("nonexistent").is_none());
    }

    #[test]
    fn ryzen_ai_is_the_only_vendor_installer() {
        let vendor: Vec<_> = table().iter().filter(|s| s.vendor_installer).collect();
        assert_eq!(vendor.len(), 1);
        assert_eq!(vendor[0].recipe, "ryzen-ai");
    }
}
