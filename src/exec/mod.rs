// src/exec/mod.rs

//! Process execution layer.
//!
//! This module is responsible for actually running the build tool, using
//! `tokio::process::Command`, and reporting back to the orchestrator via
//! [`ProcessEvent`]s.
//!
//! - [`decoder`] turns raw byte chunks into lossy UTF-8 lines.
//! - [`runner`] owns one OS process: start, stream, kill, reap.
//! - [`backend`] provides the `ProcessBackend` trait and a concrete
//!   `RealProcessBackend` that the orchestrator uses in production, and
//!   which tests can replace with a scripted implementation.

use std::fmt;
use std::io;
use std::path::PathBuf;
use std::time::Instant;

pub mod backend;
pub mod decoder;
pub mod runner;

pub use backend::{ProcessBackend, RealProcessBackend};
pub use decoder::LineDecoder;
pub use runner::{ProcessHandle, ProcessRunner};

/// Identity of one task instance (one spawned process generation).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskId(pub u64);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Fully resolved command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: PathBuf,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>, args: Vec<String>, cwd: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args,
            cwd: cwd.into(),
        }
    }

    /// Space-joined command line for banners and logs.
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Which pipe a line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stream {
    Stdout,
    Stderr,
}

/// Why a process could not be started.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StartError {
    #[error("`{program}` was not found")]
    NotFound { program: String },

    #[error("permission denied while starting `{program}`")]
    PermissionDenied { program: String },

    #[error("could not start `{program}`: {message}")]
    Other { program: String, message: String },
}

impl StartError {
    pub fn from_io(program: &str, err: &io::Error) -> Self {
        let program = program.to_string();
        match err.kind() {
            io::ErrorKind::NotFound => StartError::NotFound { program },
            io::ErrorKind::PermissionDenied => StartError::PermissionDenied { program },
            _ => StartError::Other {
                program,
                message: err.to_string(),
            },
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StartError::NotFound { .. })
    }
}

/// What happened to a process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessEventKind {
    /// The process is live. Sent at most once, before any line.
    Started { pid: Option<u32> },
    /// One decoded line.
    Line { stream: Stream, text: String },
    /// Terminal: the process ran and was reaped. `code` is `None` when it was
    /// ended by a signal (including our own kill).
    Exited { code: Option<i32> },
    /// Terminal: the process never started.
    Failed { error: StartError },
}

/// Event emitted by a running process, tagged with its task identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessEvent {
    pub task: TaskId,
    pub at: Instant,
    pub kind: ProcessEventKind,
}

impl ProcessEvent {
    pub fn new(task: TaskId, kind: ProcessEventKind) -> Self {
        Self {
            task,
            at: Instant::now(),
            kind,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self.kind,
            ProcessEventKind::Exited { .. } | ProcessEventKind::Failed { .. }
        )
    }
}
