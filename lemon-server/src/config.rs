use std::path::PathBuf;

/// Env-var driven configuration with documented defaults, mirroring the
/// predecessor's `slab-server::config::Config`.
#[derive(Debug, Clone)]
pub struct Config {
    /// `LEMON_BIND` — HTTP bind address.
    pub bind: String,
    /// `LEMON_LOG` — the server's own `tracing` filter (distinct from
    /// `LEMON_LOG_LEVEL`, which governs child-process log verbosity).
    pub log_filter: String,
    pub log_json: bool,
    /// `LEMON_CACHE_DIR` — overrides `<cache_root>` (engine installs + model weights).
    pub cache_dir: PathBuf,
    /// `LEMON_CONFIG_DIR` — location of `backend_versions.json` / `user_models.json`.
    pub config_dir: PathBuf,
    /// `LEMON_LOG_LEVEL` — child-process log verbosity, forwarded as an env var.
    pub child_log_level: String,
    pub database_url: String,
    pub enable_swagger: bool,
    pub cors_origins: Vec<String>,
    pub admin_token: Option<String>,
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_bool(key: &str, default: bool) -> bool {
    match std::env::var(key) {
        Ok(v) => matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"),
        Err(_) => default,
    }
}

impl Config {
    pub fn from_env() -> Self {
        let cache_dir = std::env::var("LEMON_CACHE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_cache_dir());
        let config_dir = std::env::var("LEMON_CONFIG_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| cache_dir.join("config"));

        Self {
            bind: env_or("LEMON_BIND", "127.0.0.1:8000"),
            log_filter: env_or("LEMON_LOG", "info"),
            log_json: env_bool("LEMON_LOG_JSON", false),
            cache_dir,
            config_dir,
            child_log_level: env_or("LEMON_LOG_LEVEL", "warn"),
            database_url: env_or("LEMON_DATABASE_URL", "sqlite://lemon.db?mode=rwc"),
            enable_swagger: env_bool("LEMON_ENABLE_SWAGGER", true),
            cors_origins: std::env::var("LEMON_CORS_ORIGINS")
                .map(|v| v.split(',').map(str::trim).map(str::to_string).collect())
                .unwrap_or_default(),
            admin_token: std::env::var("LEMON_ADMIN_TOKEN").ok(),
        }
    }
}

fn default_cache_dir() -> PathBuf {
    dirs_home().join(".lemon")
}

fn dirs_home() -> PathBuf {
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn defaults_are_sane_when_env_unset() {
        let config = Config {
            bind: env_or("LEMON_BIND_TEST_UNUSED", "127.0.0.1:8000"),
            log_filter: "info".to_string(),
            log_json: false,
            cache_dir: default_cache_dir(),
            config_dir: default_cache_dir().join("config"),
            child_log_level: "warn".to_string(),
            database_url: "sqlite://lemon.db?mode=rwc".to_string(),
            enable_swagger: true,
            cors_origins: Vec::new(),
            admin_token: None,
        };
        assert_eq!(config.bind, "127.0.0.1:8000");
        assert!(config.enable_swagger);
    }

    #[test]
    fn cors_origins_split_on_comma() {
        std::env::set_var("LEMON_CORS_ORIGINS_TEST", "http://a,http://b");
        let v: Vec<String> = std::env::var("LEMON_CORS_ORIGINS_TEST")
            .unwrap()
            .split(',')
            .map(str::to_string)
            .collect();
        assert_eq!(v, vec!["http://a", "http://b"]);
        std::env::remove_var("LEMON_CORS_ORIGINS_TEST");
    }
}
