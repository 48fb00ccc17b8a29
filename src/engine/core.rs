// src/engine/core.rs

//! Pure core orchestrator state machine.
//!
//! This module contains a synchronous, deterministic "core" that consumes
//! [`OrchestratorEvent`]s and produces:
//! - an updated slot state
//! - a list of commands describing what the IO shell should do next
//!
//! The async/IO-heavy shell (`engine::runtime::Orchestrator`) is responsible
//! for:
//! - reading events from channels
//! - resolving working directories and probing the tool
//! - spawning and killing processes
//! - feeding the diagnostic publisher and host collaborators
//!
//! The core can be tested without Tokio, channels, or processes. Timing
//! comes from the `Instant`s carried by process events.

use crate::engine::event_handlers::{
    handle_prepare_failed, handle_prepared, handle_process_event, handle_run_request,
    handle_shutdown, handle_stop, CoreState, CoreStep,
};
use crate::engine::{OrchestratorEvent, OrchestratorOptions, SlotState};
use crate::exec::TaskId;

/// Pure core orchestrator.
///
/// This owns:
/// - the single task slot
/// - the task id counter (one id per run generation)
/// - the diagnostic parser of the current run
#[derive(Debug)]
pub struct CoreOrchestrator {
    state: CoreState,
}

impl CoreOrchestrator {
    pub fn new(options: &OrchestratorOptions) -> Self {
        Self {
            state: CoreState::new(options.echo_rendered),
        }
    }

    /// Coarse slot state (for tests and status displays).
    pub fn slot_state(&self) -> SlotState {
        self.state.slot.state()
    }

    /// Task whose process events are currently accepted, if any.
    pub fn live_task(&self) -> Option<TaskId> {
        self.state.slot.live_task()
    }

    pub fn is_idle(&self) -> bool {
        self.slot_state() == SlotState::Idle
    }

    /// Handle a single event, updating core state and returning the
    /// resulting commands for the IO shell.
    pub fn step(&mut self, event: OrchestratorEvent) -> CoreStep {
        match event {
            OrchestratorEvent::RunRequested(request) => handle_run_request(&mut self.state, request),
            OrchestratorEvent::StopRequested => handle_stop(&mut self.state),
            OrchestratorEvent::ShutdownRequested => handle_shutdown(&mut self.state),
            OrchestratorEvent::Prepared { task, invocation } => {
                handle_prepared(&mut self.state, task, invocation)
            }
            OrchestratorEvent::PrepareFailed { task, reason } => {
                handle_prepare_failed(&mut self.state, task, reason)
            }
            OrchestratorEvent::Process(event) => handle_process_event(&mut self.state, event),
        }
    }
}
