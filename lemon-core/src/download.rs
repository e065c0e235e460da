//! Streams model weights from the Hugging Face Hub with SSE-style progress,
//! and supports registration of user-supplied models (C9).

use crate::error::{AbortReason, RuntimeError};
use crate::events::{Frame, ProgressPayload};
use crate::resolver::{ModelInfo, ModelResolver};
use hf_hub::api::tokio::{Api, ApiBuilder, Progress};
use lemon_fetch::ProgressRateLimiter;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferKind {
    Model,
    Backend,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferState {
    Active,
    Paused,
    Cancelled,
    Completed,
    Failed,
}

/// A long-running download job tracked in the process-wide `TransferRegistry`.
pub struct Transfer {
    pub id: String,
    pub display_name: String,
    pub kind: TransferKind,
    state: Mutex<TransferState>,
    bytes_so_far: AtomicU64,
    total_bytes: AtomicU64,
    abort: Arc<AtomicBool>,
    pending_reason: Mutex<Option<AbortReason>>,
    last_error: Mutex<Option<String>>,
}

impl Transfer {
    fn new(id: String, display_name: String, kind: TransferKind) -> Arc<Self> {
        Arc::new(Self {
            id,
            display_name,
            kind,
            state: Mutex::new(TransferState::Active),
            bytes_so_far: AtomicU64::new(0),
            total_bytes: AtomicU64::new(0),
            abort: Arc::new(AtomicBool::new(false)),
            pending_reason: Mutex::new(None),
            last_error: Mutex::new(None),
        })
    }

    pub fn state(&self) -> TransferState {
        *self.state.lock().unwrap()
    }

    pub fn bytes_so_far(&self) -> u64 {
        self.bytes_so_far.load(Ordering::Relaxed)
    }

    pub fn total_bytes(&self) -> u64 {
        self.total_bytes.load(Ordering::Relaxed)
    }

    fn add_known_total(&self, delta: u64) {
        self.total_bytes.fetch_add(delta, Ordering::Relaxed);
    }

    fn add_bytes(&self, delta: u64) {
        self.bytes_so_far.fetch_add(delta, Ordering::Relaxed);
    }

    pub fn is_aborted(&self) -> bool {
        self.abort.load(Ordering::Relaxed)
    }

    /// Invoked from the control channel (§4.11); triggers the cooperative
    /// abort handle. `resume` is handled by re-invoking `pull`, not here.
    pub fn request_abort(&self, reason: AbortReason) {
        *self.pending_reason.lock().unwrap() = Some(reason);
        self.abort.store(true, Ordering::Relaxed);
    }
}

/// Process-wide registry of active Download Transfers.
#[derive(Default)]
pub struct TransferRegistry {
    transfers: Mutex<HashMap<String, Arc<Transfer>>>,
}

impl TransferRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn start(&self, id: &str, display_name: &str, kind: TransferKind) -> Arc<Transfer> {
        let transfer = Transfer::new(id.to_string(), display_name.to_string(), kind);
        self.transfers
            .lock()
            .unwrap()
            .insert(id.to_string(), transfer.clone());
        transfer
    }

    pub fn get(&self, id: &str) -> Option<Arc<Transfer>> {
        self.transfers.lock().unwrap().get(id).cloned()
    }

    pub fn control(&self, id: &str, reason: AbortReason) {
        if let Some(transfer) = self.get(id) {
            transfer.request_abort(reason);
        }
    }

    /// Drop a Transfer once the consumer has acknowledged completion or
    /// cancellation (§3's "destroyed when consumer acknowledges").
    pub fn acknowledge(&self, id: &str) {
        self.transfers.lock().unwrap().remove(id);
    }
}

struct HubProgress<'a> {
    transfer: &'a Transfer,
    limiter: ProgressRateLimiter,
    display_name: String,
    on_frame: &'a mut dyn FnMut(Frame),
}

impl Progress for HubProgress<'_> {
    fn init(&mut self, size: usize, _filename: &str) {
        self.transfer.add_known_total(size as u64);
    }

    fn update(&mut self, size: usize) {
        self.transfer.add_bytes(size as u64);
        if self.limiter.ready() {
            (self.on_frame)(Frame::Progress(ProgressPayload::new(
                self.transfer.bytes_so_far(),
                self.transfer.total_bytes(),
                self.display_name.clone(),
            )));
        }
    }

    fn finish(&mut self) {}
}

/// `started → progress* → (complete | error)` for `model_name` (§4.6).
///
/// `registration` is persisted before the first progress event so a
/// cancelled download still leaves the model registered as not-downloaded.
/// Multi-file checkpoints are downloaded sequentially, each contributing to
/// one running `(bytes_so_far, total_bytes)` pair so the caller sees one
/// continuous stream, not one per file.
pub async fn pull(
    resolver: &ModelResolver,
    registry: &TransferRegistry,
    model_name: &str,
    registration: Option<ModelInfo>,
    mut on_frame: impl FnMut(Frame) + Send,
) -> Result<(), RuntimeError> {
    if let Some(info) = registration {
        resolver.register(info)?;
    }
    let info = resolver.resolve(model_name)?;
    let transfer = registry.start(model_name, model_name, TransferKind::Model);

    info!(model = model_name, "starting model download");

    let api: Api = ApiBuilder::new()
        .build()
        .map_err(|e| RuntimeError::BackendInstallFailed {
            recipe: info.recipe.clone(),
            backend: model_name.to_string(),
            cause: format!("failed to build hub client: {e}"),
        })?;

    let repo_id = info
        .checkpoint
        .split_once(':')
        .map(|(repo, _)| repo)
        .unwrap_or(&info.checkpoint);
    let repo = api.model(repo_id.to_string());

    let mut files: Vec<(String, String)> = vec![("weights".to_string(), info.primary_filename())];
    for (role, filename) in &info.aux_files {
        files.push((role.clone(), filename.clone()));
    }

    let dest_dir = info.checkpoint_dir(resolver.models_root());
    std::fs::create_dir_all(&dest_dir)?;

    for (role, filename) in files {
        if transfer.is_aborted() {
            break;
        }

        let dest_path = dest_dir.join(&filename);
        if dest_path.is_file() {
            // best-effort resume: a shard already on disk is skipped.
            continue;
        }

        let mut progress = HubProgress {
            transfer: &transfer,
            limiter: ProgressRateLimiter::new(),
            display_name: model_name.to_string(),
            on_frame: &mut on_frame,
        };

        let fetched = match repo.download_with_progress(&filename, &mut progress).await {
            Ok(path) => path,
            Err(e) => {
                *transfer.state.lock().unwrap() = TransferState::Failed;
                *transfer.last_error.lock().unwrap() = Some(e.to_string());
                let message = format!("failed to fetch {role} ({filename}): {e}");
                on_frame(Frame::Error(message.clone()));
                return Err(RuntimeError::ModelInvalidated {
                    model: model_name.to_string(),
                });
            }
        };

        if let Err(e) = link_or_copy(&fetched, &dest_path) {
            warn!(error = %e, "failed to place downloaded file into model tree");
        }
    }

    if transfer.is_aborted() {
        let reason = transfer
            .pending_reason
            .lock()
            .unwrap()
            .unwrap_or(AbortReason::Cancelled);
        match reason {
            AbortReason::Cancelled => {
                *transfer.state.lock().unwrap() = TransferState::Cancelled;
                let _ = std::fs::remove_dir_all(&dest_dir);
            }
            AbortReason::Paused => {
                *transfer.state.lock().unwrap() = TransferState::Paused;
            }
        }
        return Err(RuntimeError::DownloadAborted { reason });
    }

    *transfer.state.lock().unwrap() = TransferState::Completed;
    on_frame(Frame::Complete);
    Ok(())
}

fn link_or_copy(src: &std::path::Path, dest: &std::path::Path) -> std::io::Result<()> {
    if dest.exists() {
        return Ok(());
    }
    std::fs::hard_link(src, dest).or_else(|_| std::fs::copy(src, dest).map(|_| ()))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn transfer_starts_active_and_not_aborted() {
        let transfer = Transfer::new("m".to_string(), "m".to_string(), TransferKind::Model);
        assert_eq!(transfer.state(), TransferState::Active);
        assert!(!transfer.is_aborted());
    }

    #[test]
    fn request_abort_sets_flag_and_reason() {
        let transfer = Transfer::new("m".to_string(), "m".to_string(), TransferKind::Model);
        transfer.request_abort(AbortReason::Paused);
        assert!(transfer.is_aborted());
        assert_eq!(*transfer.pending_reason.lock().unwrap(), Some(AbortReason::Paused));
    }

    #[test]
    fn registry_control_is_a_no_op_for_unknown_id() {
        let registry = TransferRegistry::new();
        registry.control("nonexistent", AbortReason::Cancelled);
    }
}
