// src/exec/backend.rs

//! Pluggable process backend abstraction.
//!
//! The orchestrator talks to a `ProcessBackend` instead of spawning
//! processes itself. This makes it easy to swap in a scripted backend in
//! tests while keeping the production implementation in [`super::runner`].
//!
//! - `RealProcessBackend` is the default implementation. It keeps one
//!   [`ProcessHandle`] per live task and forwards kills to it.
//! - Tests can provide their own `ProcessBackend` that records spawn and
//!   kill requests and emits `ProcessEvent`s on demand.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use tokio::sync::mpsc;
use tracing::debug;

use crate::host::BoxFuture;

use super::runner::{ProcessHandle, ProcessRunner};
use super::{CommandSpec, ProcessEvent, TaskId};

/// Trait abstracting how build-tool processes are run.
pub trait ProcessBackend: Send + Sync {
    /// Start `spec` as task `task`. All outcomes, including spawn failure,
    /// are reported on `events`.
    fn spawn(&self, task: TaskId, spec: CommandSpec, events: mpsc::Sender<ProcessEvent>);

    /// Request termination of `task`. Idempotent; unknown or finished tasks
    /// are ignored.
    fn kill(&self, task: TaskId);

    /// Run an availability check to completion; true means exit code 0.
    fn probe(&self, spec: CommandSpec) -> BoxFuture<'static, bool>;
}

/// Real backend used in production.
#[derive(Debug, Default)]
pub struct RealProcessBackend {
    handles: Mutex<HashMap<TaskId, ProcessHandle>>,
}

impl RealProcessBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn handles(&self) -> MutexGuard<'_, HashMap<TaskId, ProcessHandle>> {
        self.handles
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Number of processes that have not yet emitted their terminal event.
    pub fn live_count(&self) -> usize {
        self.handles().values().filter(|h| !h.is_finished()).count()
    }
}

impl ProcessBackend for RealProcessBackend {
    fn spawn(&self, task: TaskId, spec: CommandSpec, events: mpsc::Sender<ProcessEvent>) {
        let mut handles = self.handles();
        handles.retain(|_, handle| !handle.is_finished());

        if let Some(handle) = ProcessRunner::start(task, &spec, events) {
            handles.insert(task, handle);
        }
    }

    fn kill(&self, task: TaskId) {
        match self.handles().get_mut(&task) {
            Some(handle) => {
                if !handle.kill() {
                    debug!(task = %task, "kill already requested or process already gone");
                }
            }
            None => debug!(task = %task, "kill for unknown task ignored"),
        }
    }

    fn probe(&self, spec: CommandSpec) -> BoxFuture<'static, bool> {
        Box::pin(async move { ProcessRunner::probe(&spec).await })
    }
}
