use crate::config::Config;
use crate::db::RequestStore;
use lemon_core::{BackendManager, ModelResolver, Orchestrator, TransferRegistry};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub orchestrator: Arc<Orchestrator>,
    pub manager: Arc<BackendManager>,
    pub resolver: Arc<ModelResolver>,
    pub transfers: Arc<TransferRegistry>,
    pub store: Arc<RequestStore>,
}
