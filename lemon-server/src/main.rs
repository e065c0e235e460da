//! lemon-server – entry point.
//!
//! Startup order:
//! 1. Parse configuration from environment variables.
//! 2. Initialise structured tracing (JSON in production, pretty in dev).
//! 3. Open the SQLite database and run pending migrations.
//! 4. Build the backend manager, model resolver, and orchestrator.
//! 5. Build the Axum router and start the HTTP server with graceful shutdown.

mod config;
mod db;
mod error;
mod middleware;
mod routes;
mod state;
mod wire;

use std::net::SocketAddr;
use std::sync::Arc;

use tracing::{info, warn};

use crate::config::Config;
use crate::db::RequestStore;
use crate::state::AppState;
use lemon_core::{BackendManager, ModelResolver, Orchestrator, TransferRegistry, VersionRegistry};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Configuration ─────────────────────────────────────────────────
    let cfg = Config::from_env();

    // ── 2. Tracing ───────────────────────────────────────────────────────
    let env_filter = match tracing_subscriber::EnvFilter::try_from_default_env() {
        Ok(f) => f,
        Err(_) => match cfg.log_filter.parse::<tracing_subscriber::EnvFilter>() {
            Ok(f) => f,
            Err(e) => {
                eprintln!(
                    "WARN: LEMON_LOG='{}' is not a valid tracing filter ({}); falling back to 'info'",
                    cfg.log_filter, e
                );
                tracing_subscriber::EnvFilter::new("info")
            }
        },
    };

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_thread_ids(true);

    if cfg.log_json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    info!(version = env!("CARGO_PKG_VERSION"), "lemon-server starting");

    // ── 3. Database ──────────────────────────────────────────────────────
    let store = RequestStore::connect(&cfg.database_url).await?;
    info!(database_url = %cfg.database_url, "database ready");

    // ── 4. Runtime state ─────────────────────────────────────────────────
    std::fs::create_dir_all(&cfg.cache_dir)?;
    std::fs::create_dir_all(&cfg.config_dir)?;

    let version_registry = VersionRegistry::load(&cfg.config_dir)?;
    let manager = Arc::new(BackendManager::new(&cfg.cache_dir, version_registry));
    let resolver = Arc::new(ModelResolver::load(&cfg.cache_dir, &cfg.config_dir)?);
    let transfers = Arc::new(TransferRegistry::new());
    let orchestrator = Arc::new(Orchestrator::new(
        manager.clone(),
        resolver.clone(),
        transfers.clone(),
    ));
    info!("backend manager and orchestrator initialised");

    let state = Arc::new(AppState {
        config: Arc::new(cfg.clone()),
        orchestrator,
        manager,
        resolver,
        transfers,
        store: Arc::new(store),
    });

    // ── 5. HTTP server with graceful shutdown ───────────────────────────
    let app = routes::build(Arc::clone(&state));
    let addr: SocketAddr = cfg.bind.parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "HTTP server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("lemon-server stopped");
    Ok(())
}

/// Resolves when SIGINT (Ctrl-C) or SIGTERM is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to install CTRL+C signal handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(e) => warn!(error = %e, "failed to install SIGTERM handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    info!("shutdown signal received; starting graceful shutdown");
}
