// src/engine/event_handlers.rs

//! Event handling logic for the core orchestrator.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::diagnostics::{DiagnosticParser, FileDiagnostic};
use crate::exec::{ProcessEvent, ProcessEventKind, StartError, Stream, TaskId};
use crate::types::Verb;

use super::{Invocation, RunRequest, SlotState, TaskOutcome};

/// Command produced by the pure core, to be executed by the outer IO shell.
#[derive(Debug, Clone, PartialEq)]
pub enum CoreCommand {
    /// Resolve the working directory and argument vector for `task`.
    Prepare { task: TaskId, request: RunRequest },
    /// Start the process for `task`.
    Spawn { task: TaskId, invocation: Invocation },
    /// Request termination of `task`.
    Kill { task: TaskId },
    /// Empty the published diagnostic set.
    ClearDiagnostics,
    /// Publish one diagnostic, resolving relative paths against `base_dir`.
    Publish {
        diagnostic: FileDiagnostic,
        base_dir: PathBuf,
    },
    /// Append one line to the output sink.
    Output(String),
    SetBusy(bool),
    ShowInfo(String),
    ShowError(String),
    AnnounceStart { task: TaskId, invocation: Invocation },
    AnnounceFinish {
        task: TaskId,
        verb: Verb,
        outcome: TaskOutcome,
        elapsed: Duration,
    },
    AnnounceRejected { reason: String },
}

/// Decision returned by the core after handling a single event.
#[derive(Debug, Clone)]
pub struct CoreStep {
    /// Commands the IO shell should execute, in order.
    pub commands: Vec<CoreCommand>,
    /// Whether the outer loop should keep running.
    pub keep_running: bool,
}

impl CoreStep {
    pub(crate) fn continue_with(commands: Vec<CoreCommand>) -> Self {
        Self {
            commands,
            keep_running: true,
        }
    }
}

/// The single task slot.
#[derive(Debug, Clone)]
pub(crate) enum Slot {
    Idle,
    /// Waiting for `Prepared` / `PrepareFailed`.
    Preparing { task: TaskId, request: RunRequest },
    /// Spawn issued; waiting for `Started` / `Failed`.
    Spawning { task: TaskId, invocation: Invocation },
    Running {
        task: TaskId,
        invocation: Invocation,
        started_at: Instant,
    },
    /// Kill issued; waiting for the terminal event. `pending` is the newest
    /// forced request, started once the old process is gone.
    Stopping {
        task: TaskId,
        verb: Verb,
        started_at: Option<Instant>,
        pending: Option<RunRequest>,
    },
}

impl Slot {
    /// Task whose process events are currently accepted.
    pub(crate) fn live_task(&self) -> Option<TaskId> {
        match self {
            Slot::Idle | Slot::Preparing { .. } => None,
            Slot::Spawning { task, .. }
            | Slot::Running { task, .. }
            | Slot::Stopping { task, .. } => Some(*task),
        }
    }

    pub(crate) fn state(&self) -> SlotState {
        match self {
            Slot::Idle => SlotState::Idle,
            Slot::Preparing { .. } | Slot::Spawning { .. } => SlotState::Starting,
            Slot::Running { .. } => SlotState::Running,
            Slot::Stopping { .. } => SlotState::Stopping,
        }
    }
}

/// Mutable core state. Owned by [`super::CoreOrchestrator`].
#[derive(Debug)]
pub(crate) struct CoreState {
    pub(crate) slot: Slot,
    pub(crate) next_task: u64,
    pub(crate) parser: DiagnosticParser,
    pub(crate) echo_rendered: bool,
}

impl CoreState {
    pub(crate) fn new(echo_rendered: bool) -> Self {
        Self {
            slot: Slot::Idle,
            next_task: 1,
            parser: DiagnosticParser::new(),
            echo_rendered,
        }
    }

    fn allocate_task(&mut self) -> TaskId {
        let task = TaskId(self.next_task);
        self.next_task += 1;
        task
    }

    /// Move an idle slot into `Preparing` for `request`.
    fn begin(&mut self, request: RunRequest) -> CoreCommand {
        let task = self.allocate_task();
        debug!(task = %task, verb = %request.verb, "preparing run");
        self.slot = Slot::Preparing {
            task,
            request: request.clone(),
        };
        CoreCommand::Prepare { task, request }
    }
}

/// Handle a run request.
///
/// - Idle: start preparing it.
/// - Busy and not forced: dropped, the current task continues.
/// - Busy and forced: kill the current task (if there is a process) and keep
///   this request as the pending one. Only the newest pending request is
///   kept.
pub(crate) fn handle_run_request(state: &mut CoreState, request: RunRequest) -> CoreStep {
    if let Err(e) = request.verb.validate() {
        let reason = e.to_string();
        return CoreStep::continue_with(vec![
            CoreCommand::ShowError(reason.clone()),
            CoreCommand::AnnounceRejected { reason },
        ]);
    }

    let slot = std::mem::replace(&mut state.slot, Slot::Idle);
    let (slot, commands) = match slot {
        Slot::Idle => return CoreStep::continue_with(vec![state.begin(request)]),
        busy if !request.force => {
            debug!(verb = %request.verb, state = ?busy.state(), "task in flight; request dropped");
            (busy, Vec::new())
        }
        Slot::Preparing { task, .. } => {
            // Nothing spawned yet: the stale `Prepared` for `task` is
            // ignored when it arrives.
            debug!(task = %task, "superseding run still being prepared");
            return CoreStep::continue_with(vec![state.begin(request)]);
        }
        Slot::Spawning { task, invocation } => (
            Slot::Stopping {
                task,
                verb: invocation.verb,
                started_at: None,
                pending: Some(request),
            },
            vec![CoreCommand::Kill { task }],
        ),
        Slot::Running {
            task,
            invocation,
            started_at,
        } => (
            Slot::Stopping {
                task,
                verb: invocation.verb,
                started_at: Some(started_at),
                pending: Some(request),
            },
            vec![CoreCommand::Kill { task }],
        ),
        Slot::Stopping {
            task,
            verb,
            started_at,
            pending,
        } => {
            if let Some(old) = pending {
                debug!(task = %task, superseded = %old.verb, "replacing pending request");
            }
            (
                Slot::Stopping {
                    task,
                    verb,
                    started_at,
                    pending: Some(request),
                },
                Vec::new(),
            )
        }
    };

    state.slot = slot;
    CoreStep::continue_with(commands)
}

/// Handle a stop request. No-op when idle.
pub(crate) fn handle_stop(state: &mut CoreState) -> CoreStep {
    let slot = std::mem::replace(&mut state.slot, Slot::Idle);
    let (slot, commands) = match slot {
        Slot::Idle => (Slot::Idle, Vec::new()),
        Slot::Preparing { task, request } => (
            Slot::Idle,
            vec![CoreCommand::AnnounceFinish {
                task,
                verb: request.verb,
                outcome: TaskOutcome::Cancelled,
                elapsed: Duration::ZERO,
            }],
        ),
        Slot::Spawning { task, invocation } => (
            Slot::Stopping {
                task,
                verb: invocation.verb,
                started_at: None,
                pending: None,
            },
            vec![CoreCommand::Kill { task }],
        ),
        Slot::Running {
            task,
            invocation,
            started_at,
        } => (
            Slot::Stopping {
                task,
                verb: invocation.verb,
                started_at: Some(started_at),
                pending: None,
            },
            vec![CoreCommand::Kill { task }],
        ),
        Slot::Stopping {
            task,
            verb,
            started_at,
            ..
        } => (
            Slot::Stopping {
                task,
                verb,
                started_at,
                pending: None,
            },
            Vec::new(),
        ),
    };

    state.slot = slot;
    CoreStep::continue_with(commands)
}

/// Handle the result of invocation planning.
pub(crate) fn handle_prepared(state: &mut CoreState, task: TaskId, invocation: Invocation) -> CoreStep {
    match &state.slot {
        Slot::Preparing { task: current, .. } if *current == task => {
            state.slot = Slot::Spawning {
                task,
                invocation: invocation.clone(),
            };
            CoreStep::continue_with(vec![CoreCommand::Spawn { task, invocation }])
        }
        _ => {
            debug!(task = %task, "stale prepared invocation ignored");
            CoreStep::continue_with(Vec::new())
        }
    }
}

/// Handle a failed working-directory resolution. The slot goes back to idle.
pub(crate) fn handle_prepare_failed(state: &mut CoreState, task: TaskId, reason: String) -> CoreStep {
    match &state.slot {
        Slot::Preparing { task: current, .. } if *current == task => {
            state.slot = Slot::Idle;
            CoreStep::continue_with(vec![
                CoreCommand::ShowError(reason.clone()),
                CoreCommand::AnnounceRejected { reason },
            ])
        }
        _ => {
            debug!(task = %task, "stale prepare failure ignored");
            CoreStep::continue_with(Vec::new())
        }
    }
}

/// Handle one event from a process.
///
/// Events of any task other than the live one are discarded, as is output
/// of a task that is being killed.
pub(crate) fn handle_process_event(state: &mut CoreState, event: ProcessEvent) -> CoreStep {
    if state.slot.live_task() != Some(event.task) {
        debug!(task = %event.task, "event from a superseded task discarded");
        return CoreStep::continue_with(Vec::new());
    }

    match event.kind {
        ProcessEventKind::Started { pid } => on_started(state, event.at, pid),
        ProcessEventKind::Line { stream, text } => on_line(state, stream, text),
        ProcessEventKind::Exited { code } => on_exited(state, event.at, code),
        ProcessEventKind::Failed { error } => on_failed(state, error),
    }
}

fn on_started(state: &mut CoreState, at: Instant, pid: Option<u32>) -> CoreStep {
    let slot = std::mem::replace(&mut state.slot, Slot::Idle);
    match slot {
        Slot::Spawning { task, invocation } => {
            debug!(task = %task, ?pid, "process started");
            state.parser.reset();
            state.slot = Slot::Running {
                task,
                invocation: invocation.clone(),
                started_at: at,
            };
            CoreStep::continue_with(vec![
                CoreCommand::ClearDiagnostics,
                CoreCommand::SetBusy(true),
                CoreCommand::AnnounceStart { task, invocation },
            ])
        }
        Slot::Stopping {
            task,
            verb,
            started_at: None,
            pending,
        } => {
            // Killed before it came up; only the clock matters now.
            state.slot = Slot::Stopping {
                task,
                verb,
                started_at: Some(at),
                pending,
            };
            CoreStep::continue_with(Vec::new())
        }
        other => {
            state.slot = other;
            CoreStep::continue_with(Vec::new())
        }
    }
}

fn on_line(state: &mut CoreState, stream: Stream, text: String) -> CoreStep {
    let Slot::Running { invocation, .. } = &state.slot else {
        return CoreStep::continue_with(Vec::new());
    };

    if stream == Stream::Stdout && text.trim_start().starts_with('{') {
        let parsed = state.parser.parse_message(&text);
        if parsed.is_json {
            let mut commands = Vec::new();
            if state.echo_rendered {
                if let Some(rendered) = parsed.rendered {
                    commands.extend(
                        rendered
                            .trim_end()
                            .lines()
                            .map(|line| CoreCommand::Output(line.to_string())),
                    );
                }
            }
            let base_dir = &invocation.spec.cwd;
            commands.extend(
                parsed
                    .diagnostics
                    .into_iter()
                    .map(|diagnostic| CoreCommand::Publish {
                        diagnostic,
                        base_dir: base_dir.clone(),
                    }),
            );
            return CoreStep::continue_with(commands);
        }
    }

    CoreStep::continue_with(vec![CoreCommand::Output(text)])
}

fn on_exited(state: &mut CoreState, at: Instant, code: Option<i32>) -> CoreStep {
    let slot = std::mem::replace(&mut state.slot, Slot::Idle);
    match slot {
        Slot::Running {
            task,
            invocation,
            started_at,
        } => {
            let outcome = match code {
                Some(code) => TaskOutcome::Completed(code),
                None => {
                    debug!(task = %task, "process ended without an exit code");
                    TaskOutcome::Abnormal
                }
            };
            CoreStep::continue_with(vec![
                CoreCommand::SetBusy(false),
                CoreCommand::AnnounceFinish {
                    task,
                    verb: invocation.verb,
                    outcome,
                    elapsed: at.saturating_duration_since(started_at),
                },
            ])
        }
        Slot::Spawning { task, invocation } => CoreStep::continue_with(vec![
            CoreCommand::SetBusy(false),
            CoreCommand::AnnounceFinish {
                task,
                verb: invocation.verb,
                outcome: code.map_or(TaskOutcome::Abnormal, TaskOutcome::Completed),
                elapsed: Duration::ZERO,
            },
        ]),
        Slot::Stopping {
            task,
            verb,
            started_at,
            pending,
        } => {
            let elapsed = started_at
                .map(|s| at.saturating_duration_since(s))
                .unwrap_or_default();
            let mut commands = vec![
                CoreCommand::SetBusy(false),
                CoreCommand::AnnounceFinish {
                    task,
                    verb,
                    outcome: TaskOutcome::Cancelled,
                    elapsed,
                },
            ];
            if let Some(request) = pending {
                commands.push(state.begin(request));
            }
            CoreStep::continue_with(commands)
        }
        other => {
            state.slot = other;
            CoreStep::continue_with(Vec::new())
        }
    }
}

fn on_failed(state: &mut CoreState, error: StartError) -> CoreStep {
    let slot = std::mem::replace(&mut state.slot, Slot::Idle);
    match slot {
        Slot::Spawning { task, invocation } => {
            let notice = if error.is_not_found() {
                CoreCommand::ShowInfo(format!(
                    "`{}` is not installed or not on PATH",
                    invocation.spec.program
                ))
            } else {
                CoreCommand::ShowError(error.to_string())
            };
            // Busy was never switched on for a task that did not start.
            CoreStep::continue_with(vec![
                notice,
                CoreCommand::AnnounceFinish {
                    task,
                    verb: invocation.verb,
                    outcome: TaskOutcome::StartFailed(error),
                    elapsed: Duration::ZERO,
                },
            ])
        }
        Slot::Stopping {
            task,
            verb,
            pending,
            ..
        } => {
            debug!(task = %task, error = %error, "task being stopped never started");
            let mut commands = vec![CoreCommand::AnnounceFinish {
                task,
                verb,
                outcome: TaskOutcome::Cancelled,
                elapsed: Duration::ZERO,
            }];
            if let Some(request) = pending {
                commands.push(state.begin(request));
            }
            CoreStep::continue_with(commands)
        }
        other => {
            state.slot = other;
            CoreStep::continue_with(Vec::new())
        }
    }
}

/// Handle a shutdown request: kill whatever is live and stop the loop.
pub(crate) fn handle_shutdown(state: &mut CoreState) -> CoreStep {
    let mut commands = Vec::new();
    match &mut state.slot {
        Slot::Spawning { task, .. } | Slot::Running { task, .. } => {
            commands.push(CoreCommand::Kill { task: *task });
        }
        Slot::Stopping { pending, .. } => {
            *pending = None;
        }
        Slot::Idle | Slot::Preparing { .. } => {}
    }
    CoreStep {
        commands,
        keep_running: false,
    }
}
