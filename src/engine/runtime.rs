// src/engine/runtime.rs

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use crate::diagnostics::{DiagnosticPublisher, DiagnosticsSink, DiagnosticsSnapshot};
use crate::errors::Result;
use crate::exec::{ProcessBackend, ProcessEvent, TaskId};
use crate::host::Host;
use crate::types::Verb;

use super::core::CoreOrchestrator;
use super::handle::OrchestratorHandle;
use super::planner::InvocationPlanner;
use super::{CoreCommand, OrchestratorEvent, OrchestratorOptions, RunNotice, TaskOutcome};

const REQUEST_CAPACITY: usize = 32;
const PROCESS_EVENT_CAPACITY: usize = 256;
const NOTICE_CAPACITY: usize = 64;

/// How long shutdown waits for a killed process to be reaped.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Drives the core orchestrator in response to requests and process
/// events, and delegates process control to a `ProcessBackend`.
///
/// This is an IO shell around `CoreOrchestrator`, which contains all the
/// slot semantics. It owns the diagnostic publisher, so every mutation of
/// the published set happens on this one task.
pub struct Orchestrator<B: ProcessBackend + 'static> {
    core: CoreOrchestrator,
    host: Host,
    backend: Arc<B>,
    planner: Arc<InvocationPlanner>,
    publisher: DiagnosticPublisher,
    requests: mpsc::Receiver<OrchestratorEvent>,
    internal_tx: mpsc::Sender<OrchestratorEvent>,
    internal_rx: mpsc::Receiver<OrchestratorEvent>,
    process_tx: mpsc::Sender<ProcessEvent>,
    process_rx: mpsc::Receiver<ProcessEvent>,
    notices: broadcast::Sender<RunNotice>,
}

impl<B: ProcessBackend + 'static> fmt::Debug for Orchestrator<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Orchestrator")
            .field("core", &self.core)
            .field("publisher", &self.publisher)
            .finish_non_exhaustive()
    }
}

impl<B: ProcessBackend + 'static> Orchestrator<B> {
    /// Build the orchestrator and the handle that drives it.
    ///
    /// The loop ends on `shutdown()` or once every handle is dropped.
    pub fn new(
        host: Host,
        backend: Arc<B>,
        sink: Arc<dyn DiagnosticsSink>,
        options: OrchestratorOptions,
    ) -> (Self, OrchestratorHandle) {
        let (request_tx, requests) = mpsc::channel(REQUEST_CAPACITY);
        let (internal_tx, internal_rx) = mpsc::channel(REQUEST_CAPACITY);
        let (process_tx, process_rx) = mpsc::channel(PROCESS_EVENT_CAPACITY);
        let (notices, _) = broadcast::channel(NOTICE_CAPACITY);

        let handle = OrchestratorHandle::new(
            request_tx,
            notices.clone(),
            host.diagnostics_enabled.clone(),
        );

        let orchestrator = Self {
            core: CoreOrchestrator::new(&options),
            planner: Arc::new(InvocationPlanner::new(
                options.executable.clone(),
                host.args.clone(),
            )),
            publisher: DiagnosticPublisher::new(sink).with_dedupe(options.dedupe),
            host,
            backend,
            requests,
            internal_tx,
            internal_rx,
            process_tx,
            process_rx,
            notices,
        };

        (orchestrator, handle)
    }

    /// Main event loop.
    ///
    /// - Consumes handle requests, prepare results and process events, in
    ///   that priority order.
    /// - Feeds them into the core.
    /// - Executes the commands returned by the core.
    pub async fn run(mut self) -> Result<()> {
        info!(executable = self.planner.executable(), "buildpipe orchestrator started");

        loop {
            let event = tokio::select! {
                biased;
                request = self.requests.recv() => match request {
                    Some(event) => event,
                    None => {
                        info!("all orchestrator handles dropped; shutting down");
                        OrchestratorEvent::ShutdownRequested
                    }
                },
                Some(event) = self.internal_rx.recv() => event,
                Some(event) = self.process_rx.recv() => OrchestratorEvent::Process(event),
            };

            debug!(?event, "orchestrator received event");

            let step = self.core.step(event);
            for command in step.commands {
                self.execute_command(command);
            }

            if !step.keep_running {
                info!("shutdown requested; stopping orchestrator");
                break;
            }
        }

        if let Some(task) = self.core.live_task() {
            self.await_termination(task).await;
        }

        info!("orchestrator exiting");
        Ok(())
    }

    /// Execute a single command from the core.
    fn execute_command(&mut self, command: CoreCommand) {
        match command {
            CoreCommand::Prepare { task, request } => self.prepare(task, request),
            CoreCommand::Spawn { task, invocation } => {
                debug!(task = %task, cmd = %invocation.spec.command_line(), "spawning");
                self.backend
                    .spawn(task, invocation.spec, self.process_tx.clone());
            }
            CoreCommand::Kill { task } => {
                info!(task = %task, "killing task");
                self.backend.kill(task);
            }
            CoreCommand::ClearDiagnostics => self.publisher.clear(),
            CoreCommand::Publish {
                diagnostic,
                base_dir,
            } => {
                if self.host.diagnostics_enabled.is_enabled() {
                    self.publisher.publish(diagnostic, &base_dir);
                }
            }
            CoreCommand::Output(line) => self.host.output.append_line(&line),
            CoreCommand::SetBusy(busy) => self.host.status.set_busy(busy),
            CoreCommand::ShowInfo(message) => self.host.notifier.show_info(&message),
            CoreCommand::ShowError(message) => self.host.notifier.show_error(&message),
            CoreCommand::AnnounceStart { task, invocation } => {
                let started_at = Local::now();
                let command_line = invocation.spec.command_line();
                info!(task = %task, verb = %invocation.verb, cmd = %command_line, "run started");
                self.host.output.append_line(&format!(
                    "[{}] Running `{}` in {}",
                    started_at.format("%H:%M:%S"),
                    command_line,
                    invocation.spec.cwd.display()
                ));
                self.notify(RunNotice::Started {
                    task,
                    verb: invocation.verb,
                    command_line,
                    started_at,
                });
            }
            CoreCommand::AnnounceFinish {
                task,
                verb,
                outcome,
                elapsed,
            } => {
                let diagnostics = self.publisher.snapshot();
                info!(
                    task = %task,
                    verb = %verb,
                    ?outcome,
                    elapsed_ms = elapsed.as_millis() as u64,
                    diagnostics = %diagnostics.status_string(),
                    "run finished"
                );
                self.host
                    .output
                    .append_line(&summary_line(&verb, &outcome, elapsed, &diagnostics));
                self.notify(RunNotice::Finished {
                    task,
                    verb,
                    outcome,
                    elapsed,
                    diagnostics,
                });
            }
            CoreCommand::AnnounceRejected { reason } => {
                self.notify(RunNotice::Rejected { reason });
            }
        }
    }

    /// Resolve the working directory and plan the invocation off the loop.
    fn prepare(&self, task: TaskId, request: super::RunRequest) {
        let resolver = self.host.working_dir.clone();
        let planner = self.planner.clone();
        let backend = self.backend.clone();
        let tx = self.internal_tx.clone();

        tokio::spawn(async move {
            let event = match resolver.cwd().await {
                Ok(cwd) => OrchestratorEvent::Prepared {
                    task,
                    invocation: planner.plan(backend.as_ref(), &request, cwd).await,
                },
                Err(e) => {
                    warn!(task = %task, error = %e, "working directory unresolved");
                    OrchestratorEvent::PrepareFailed {
                        task,
                        reason: e.to_string(),
                    }
                }
            };
            if tx.send(event).await.is_err() {
                debug!(task = %task, "orchestrator gone before prepare finished");
            }
        });
    }

    fn notify(&self, notice: RunNotice) {
        // No subscribers is fine.
        let _ = self.notices.send(notice);
    }

    /// Wait (bounded) for the terminal event of a task killed on shutdown.
    async fn await_termination(&mut self, task: TaskId) {
        let rx = &mut self.process_rx;
        let waited = tokio::time::timeout(SHUTDOWN_GRACE, async {
            while let Some(event) = rx.recv().await {
                if event.task == task && event.is_terminal() {
                    return;
                }
            }
        })
        .await;

        match waited {
            Ok(()) => debug!(task = %task, "task reaped before shutdown"),
            Err(_) => warn!(task = %task, "task still running at shutdown"),
        }
    }
}

/// One-line run summary written to the output sink.
pub fn summary_line(
    verb: &Verb,
    outcome: &TaskOutcome,
    elapsed: Duration,
    diagnostics: &DiagnosticsSnapshot,
) -> String {
    let secs = elapsed.as_secs_f64();
    let mut line = match outcome {
        TaskOutcome::Completed(code) => {
            format!("{verb} finished with exit code {code} in {secs:.2}s")
        }
        TaskOutcome::Cancelled => format!("{verb} cancelled after {secs:.2}s"),
        TaskOutcome::StartFailed(error) => format!("{verb} could not start: {error}"),
        TaskOutcome::Abnormal => format!("{verb} terminated abnormally after {secs:.2}s"),
    };
    if !diagnostics.is_empty() {
        line.push_str(&format!(" ({})", diagnostics.status_string()));
    }
    line
}
