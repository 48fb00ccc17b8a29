// src/engine/handle.rs

//! Cloneable front door to a running [`super::Orchestrator`].

use tokio::sync::{broadcast, mpsc};

use crate::errors::Result;
use crate::host::DiagnosticsToggle;
use crate::types::Verb;

use super::{OrchestratorEvent, RunNotice, RunRequest};

/// Sends requests to the orchestrator loop and hands out notice
/// subscriptions. Sending fails with `OrchestratorClosed` once the loop
/// has exited.
#[derive(Debug, Clone)]
pub struct OrchestratorHandle {
    tx: mpsc::Sender<OrchestratorEvent>,
    notices: broadcast::Sender<RunNotice>,
    diagnostics: DiagnosticsToggle,
}

impl OrchestratorHandle {
    pub(crate) fn new(
        tx: mpsc::Sender<OrchestratorEvent>,
        notices: broadcast::Sender<RunNotice>,
        diagnostics: DiagnosticsToggle,
    ) -> Self {
        Self {
            tx,
            notices,
            diagnostics,
        }
    }

    /// Request a run of `verb`. Without `force` the request is dropped while
    /// another task is in flight.
    pub async fn run(&self, verb: Verb, args: Vec<String>, force: bool) -> Result<()> {
        self.submit(RunRequest::new(verb, args, force)).await
    }

    pub async fn submit(&self, request: RunRequest) -> Result<()> {
        self.tx.send(OrchestratorEvent::RunRequested(request)).await?;
        Ok(())
    }

    /// Kill the current task, if any.
    pub async fn stop(&self) -> Result<()> {
        self.tx.send(OrchestratorEvent::StopRequested).await?;
        Ok(())
    }

    /// Kill the current task and end the loop.
    pub async fn shutdown(&self) -> Result<()> {
        self.tx.send(OrchestratorEvent::ShutdownRequested).await?;
        Ok(())
    }

    /// Notices sent after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<RunNotice> {
        self.notices.subscribe()
    }

    /// Takes effect for the next diagnostic to arrive.
    pub fn set_diagnostics_enabled(&self, enabled: bool) {
        self.diagnostics.set(enabled);
    }

    pub fn diagnostics_enabled(&self) -> bool {
        self.diagnostics.is_enabled()
    }
}
