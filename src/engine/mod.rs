// src/engine/mod.rs

//! Orchestration engine for buildpipe.
//!
//! This module ties together:
//! - the single task slot (at most one build-tool process at a time)
//! - forced restart (kill, await termination, then start the newest request)
//! - the wiring of process output into the diagnostic parser and publisher
//! - run notices for the host (started / finished / rejected)
//!
//! The pure core state machine lives in [`core`]; the async/IO shell is
//! implemented in [`runtime`], and [`handle`] is the cloneable front door.

use std::time::Duration;

use chrono::{DateTime, Local};

use crate::config::ConfigFile;
use crate::diagnostics::DiagnosticsSnapshot;
use crate::exec::{CommandSpec, ProcessEvent, StartError, TaskId};
use crate::types::Verb;

pub mod core;
pub mod event_handlers;
pub mod handle;
pub mod planner;
pub mod runtime;

pub use core::CoreOrchestrator;
pub use event_handlers::{CoreCommand, CoreStep};
pub use handle::OrchestratorHandle;
pub use planner::InvocationPlanner;
pub use runtime::Orchestrator;

/// A high-level request to run a verb.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRequest {
    pub verb: Verb,
    /// Appended after the configured arguments for the verb.
    pub args: Vec<String>,
    /// Kill a task in flight instead of dropping this request.
    pub force: bool,
}

impl RunRequest {
    pub fn new(verb: Verb, args: Vec<String>, force: bool) -> Self {
        Self { verb, args, force }
    }
}

/// A request resolved into a concrete command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub verb: Verb,
    pub spec: CommandSpec,
    /// Whether `--message-format json` was injected.
    pub structured: bool,
}

/// How a task ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    /// Ran to completion. A non-zero code is a normal build failure.
    Completed(i32),
    /// Killed on request (stop or forced restart).
    Cancelled,
    /// Never started.
    StartFailed(StartError),
    /// Ended without an exit code and without a kill request.
    Abnormal,
}

/// Broadcast to subscribers of an [`OrchestratorHandle`].
#[derive(Debug, Clone)]
pub enum RunNotice {
    Started {
        task: TaskId,
        verb: Verb,
        command_line: String,
        started_at: DateTime<Local>,
    },
    Finished {
        task: TaskId,
        verb: Verb,
        outcome: TaskOutcome,
        elapsed: Duration,
        diagnostics: DiagnosticsSnapshot,
    },
    /// A request that never got as far as a process.
    Rejected { reason: String },
}

/// Everything that can drive the core.
#[derive(Debug, Clone)]
pub enum OrchestratorEvent {
    RunRequested(RunRequest),
    StopRequested,
    ShutdownRequested,
    /// Working directory and argument vector are ready for `task`.
    Prepared { task: TaskId, invocation: Invocation },
    /// Working directory could not be resolved for `task`.
    PrepareFailed { task: TaskId, reason: String },
    Process(ProcessEvent),
}

/// Coarse view of the task slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    Idle,
    /// Resolving the invocation or waiting for the process to come up.
    Starting,
    Running,
    /// Kill requested; waiting for the terminal event.
    Stopping,
}

/// Options shared by the core and the async shell.
#[derive(Debug, Clone)]
pub struct OrchestratorOptions {
    pub executable: String,
    /// Copy `rendered` text of structured diagnostics to the output sink.
    pub echo_rendered: bool,
    pub dedupe: bool,
}

impl OrchestratorOptions {
    pub fn from_config(config: &ConfigFile) -> Self {
        Self {
            executable: config.tool.executable.clone(),
            echo_rendered: config.diagnostics.echo_rendered,
            dedupe: config.diagnostics.dedupe,
        }
    }
}

impl Default for OrchestratorOptions {
    fn default() -> Self {
        Self::from_config(&ConfigFile::default())
    }
}
