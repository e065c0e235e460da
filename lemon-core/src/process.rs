//! Child-process lifecycle: spawn, liveness, and graceful-then-forced stop
//! (C5), grounded on `tokio::process::Command` with `.kill_on_drop(true)` as
//! the last-resort safety net used by the `hecrj-llama-server` reference.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tracing::{debug, warn};

const STOP_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Default)]
pub struct SpawnOptions {
    pub cwd: Option<PathBuf>,
    pub env: HashMap<String, String>,
    pub inherit_output: bool,
    /// Suppress child log lines that match the readiness-probe request
    /// pattern, so logs aren't swamped with health-check noise during warmup.
    pub filter_health_logs: bool,
    pub readiness_path: String,
}

/// A running (or recently-stopped) child process.
pub struct ProcessHandle {
    child: Child,
    pid: Option<u32>,
}

impl ProcessHandle {
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Non-blocking liveness check.
    pub fn is_running(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    /// Graceful signal, then a 5 s grace period, then a force-kill.
    /// Idempotent: stopping an already-exited handle is a no-op.
    pub async fn stop(&mut self) {
        if !self.is_running() {
            return;
        }

        send_graceful_signal(&self.child);

        match tokio::time::timeout(STOP_GRACE, self.child.wait()).await {
            Ok(_) => {}
            Err(_) => {
                warn!(pid = ?self.pid, "child did not exit within grace period, force-killing");
                let _ = self.child.kill().await;
            }
        }
    }
}

#[cfg(unix)]
fn send_graceful_signal(child: &Child) {
    if let Some(pid) = child.id() {
        // SAFETY: sending SIGTERM to a PID we own; no memory is touched.
        unsafe {
            libc::kill(pid as libc::pid_t, libc::SIGTERM);
        }
    }
}

#[cfg(not(unix))]
fn send_graceful_signal(child: &Child) {
    // tokio exposes no graceful-signal primitive on non-unix platforms;
    // `start_kill` is the first and only kill attempt here, matching §4.4's
    // "a first `kill()` (others)".
    let mut child = child;
    let _ = child.start_kill();
}

pub fn spawn(exe: &Path, argv: &[String], opts: &SpawnOptions) -> std::io::Result<ProcessHandle> {
    let mut cmd = Command::new(exe);
    cmd.args(argv);
    cmd.kill_on_drop(true);

    if let Some(cwd) = &opts.cwd {
        cmd.current_dir(cwd);
    }
    for (k, v) in &opts.env {
        cmd.env(k, v);
    }

    if opts.inherit_output && !opts.filter_health_logs {
        cmd.stdout(std::process::Stdio::inherit());
        cmd.stderr(std::process::Stdio::inherit());
    } else {
        cmd.stdout(std::process::Stdio::piped());
        cmd.stderr(std::process::Stdio::piped());
    }

    let mut child = cmd.spawn()?;
    let pid = child.id();

    if !opts.inherit_output || opts.filter_health_logs {
        if let Some(stdout) = child.stdout.take() {
            spawn_log_filter(stdout, opts.readiness_path.clone(), opts.filter_health_logs);
        }
        if let Some(stderr) = child.stderr.take() {
            spawn_log_filter(stderr, opts.readiness_path.clone(), opts.filter_health_logs);
        }
    }

    Ok(ProcessHandle { child, pid })
}

fn spawn_log_filter(
    reader: impl tokio::io::AsyncRead + Unpin + Send + 'static,
    readiness_path: String,
    filter_health_logs: bool,
) {
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if filter_health_logs && !readiness_path.is_empty() && line.contains(&readiness_path) {
                continue;
            }
            debug!(target: "lemon_core::engine", "{line}");
        }
    });
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn spawned_process_reports_running_then_stopped() {
        let exe = PathBuf::from("/bin/sleep");
        if !exe.exists() {
            return;
        }
        let opts = SpawnOptions {
            cwd: None,
            env: HashMap::new(),
            inherit_output: false,
            filter_health_logs: false,
            readiness_path: String::new(),
        };
        let mut handle = spawn(&exe, &["5".to_string()], &opts).unwrap();
        assert!(handle.is_running());
        handle.stop().await;
        assert!(!handle.is_running());
    }

    #[tokio::test]
    async fn stop_is_idempotent() {
        let exe = PathBuf::from("/bin/sleep");
        if !exe.exists() {
            return;
        }
        let opts = SpawnOptions {
            cwd: None,
            env: HashMap::new(),
            inherit_output: false,
            filter_health_logs: false,
            readiness_path: String::new(),
        };
        let mut handle = spawn(&exe, &["0".to_string()], &opts).unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;
        handle.stop().await;
        handle.stop().await;
    }
}
