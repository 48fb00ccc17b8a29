// src/host.rs

//! Collaborators the orchestrator consumes from its host.
//!
//! The orchestrator never talks to an editor, a terminal or a settings store
//! directly. It goes through these traits instead:
//! - [`WorkingDirResolver`]: where the build tool runs.
//! - [`ArgSource`]: user arguments per verb kind.
//! - [`OutputSink`]: append-only text stream (banner, passthrough, summary).
//! - [`StatusIndicator`]: busy spinner on/off.
//! - [`UserNotifier`]: one-line user-facing messages.
//!
//! [`Host`] bundles them together with the runtime diagnostics toggle.

use std::future::Future;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{error, info};

use crate::errors::{BuildpipeError, Result};
use crate::types::ArgKind;

/// Boxed future used at the async trait seams of this crate.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Resolves the working directory of the next run.
pub trait WorkingDirResolver: Send + Sync {
    /// Fails with [`BuildpipeError::WorkingDirUnresolved`] when no workspace
    /// context is available.
    fn cwd(&self) -> BoxFuture<'_, Result<PathBuf>>;
}

/// Source of user arguments for the verbs that take them.
pub trait ArgSource: Send + Sync {
    fn args(&self, kind: ArgKind) -> Vec<String>;
}

/// Append-only output stream.
pub trait OutputSink: Send + Sync {
    fn append_line(&self, line: &str);
}

/// Busy indicator.
pub trait StatusIndicator: Send + Sync {
    fn set_busy(&self, busy: bool);
}

/// User-facing messages.
pub trait UserNotifier: Send + Sync {
    fn show_info(&self, message: &str);
    fn show_error(&self, message: &str);
}

/// Runtime switch for diagnostic publishing, shared between the host and
/// the orchestrator.
#[derive(Debug, Clone)]
pub struct DiagnosticsToggle(Arc<AtomicBool>);

impl DiagnosticsToggle {
    pub fn new(enabled: bool) -> Self {
        Self(Arc::new(AtomicBool::new(enabled)))
    }

    pub fn is_enabled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn set(&self, enabled: bool) {
        self.0.store(enabled, Ordering::SeqCst);
    }
}

impl Default for DiagnosticsToggle {
    fn default() -> Self {
        Self::new(true)
    }
}

/// Everything the orchestrator needs from its host.
#[derive(Clone)]
pub struct Host {
    pub working_dir: Arc<dyn WorkingDirResolver>,
    pub args: Arc<dyn ArgSource>,
    pub output: Arc<dyn OutputSink>,
    pub status: Arc<dyn StatusIndicator>,
    pub notifier: Arc<dyn UserNotifier>,
    pub diagnostics_enabled: DiagnosticsToggle,
}

impl std::fmt::Debug for Host {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Host")
            .field("diagnostics_enabled", &self.diagnostics_enabled.is_enabled())
            .finish_non_exhaustive()
    }
}

/// Always resolves to the same directory.
#[derive(Debug, Clone)]
pub struct FixedWorkingDir(pub PathBuf);

impl WorkingDirResolver for FixedWorkingDir {
    fn cwd(&self) -> BoxFuture<'_, Result<PathBuf>> {
        let dir = self.0.clone();
        Box::pin(async move {
            if tokio::fs::metadata(&dir).await.map(|m| m.is_dir()).unwrap_or(false) {
                Ok(dir)
            } else {
                Err(BuildpipeError::WorkingDirUnresolved(format!(
                    "{} is not a directory",
                    dir.display()
                )))
            }
        })
    }
}

const MANIFEST: &str = "Cargo.toml";

/// Walks up from a start directory to the nearest one holding a
/// `Cargo.toml`.
#[derive(Debug, Clone)]
pub struct ManifestDirResolver {
    start: PathBuf,
}

impl ManifestDirResolver {
    pub fn new(start: impl Into<PathBuf>) -> Self {
        Self {
            start: start.into(),
        }
    }
}

async fn find_ancestor_with(start: &Path, marker: &str) -> Option<PathBuf> {
    for dir in start.ancestors() {
        if tokio::fs::metadata(dir.join(marker))
            .await
            .map(|m| m.is_file())
            .unwrap_or(false)
        {
            return Some(dir.to_path_buf());
        }
    }
    None
}

impl WorkingDirResolver for ManifestDirResolver {
    fn cwd(&self) -> BoxFuture<'_, Result<PathBuf>> {
        Box::pin(async move {
            find_ancestor_with(&self.start, MANIFEST)
                .await
                .ok_or_else(|| {
                    BuildpipeError::WorkingDirUnresolved(format!(
                        "no {MANIFEST} found in {} or any parent directory",
                        self.start.display()
                    ))
                })
        })
    }
}

/// Writes output lines to the process stdout.
#[derive(Debug, Clone, Default)]
pub struct StdoutSink;

impl OutputSink for StdoutSink {
    fn append_line(&self, line: &str) {
        let stdout = std::io::stdout();
        let mut lock = stdout.lock();
        let _ = writeln!(lock, "{line}");
    }
}

/// Busy indicator that only logs transitions.
#[derive(Debug, Clone, Default)]
pub struct LogStatus;

impl StatusIndicator for LogStatus {
    fn set_busy(&self, busy: bool) {
        tracing::debug!(busy, "busy indicator");
    }
}

/// Notifier that routes messages to the log and stderr.
#[derive(Debug, Clone, Default)]
pub struct StderrNotifier;

impl UserNotifier for StderrNotifier {
    fn show_info(&self, message: &str) {
        info!("{message}");
        eprintln!("buildpipe: {message}");
    }

    fn show_error(&self, message: &str) {
        error!("{message}");
        eprintln!("buildpipe error: {message}");
    }
}
