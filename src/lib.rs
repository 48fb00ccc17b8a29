// src/lib.rs

pub mod cli;
pub mod config;
pub mod diagnostics;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod host;
pub mod logging;
pub mod types;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::cli::CliArgs;
use crate::config::{load_or_default, ConfigFile};
use crate::diagnostics::ConsoleSink;
use crate::engine::{
    InvocationPlanner, Orchestrator, OrchestratorHandle, OrchestratorOptions, RunNotice,
    RunRequest, TaskOutcome,
};
use crate::exec::{RealProcessBackend, StartError};
use crate::host::{
    DiagnosticsToggle, FixedWorkingDir, Host, LogStatus, ManifestDirResolver, StderrNotifier,
    StdoutSink, WorkingDirResolver,
};
use crate::types::Verb;

/// Exit code when the run was cancelled (Ctrl-C).
pub const EXIT_CANCELLED: i32 = 130;
/// Exit code when the build tool is not installed.
pub const EXIT_NOT_FOUND: i32 = 127;
/// Exit code when the build tool exists but could not be started.
pub const EXIT_START_FAILED: i32 = 126;
/// Exit code when the request was rejected before a process existed.
pub const EXIT_REJECTED: i32 = 2;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - verb parsing and config loading
/// - host collaborators (stdout output, stderr notices, console diagnostics)
/// - the orchestrator and its real process backend
/// - Ctrl-C handling (stops the current task)
///
/// Returns the process exit code.
pub async fn run(args: CliArgs) -> Result<i32> {
    let verb: Verb = args.verb.parse()?;
    let start_dir = std::env::current_dir().context("reading current directory")?;

    let working_dir: Arc<dyn WorkingDirResolver> = match &args.cwd {
        Some(dir) => Arc::new(FixedWorkingDir(dir.clone())),
        None => Arc::new(ManifestDirResolver::new(&start_dir)),
    };

    let config_dir = match working_dir.cwd().await {
        Ok(dir) => dir,
        Err(e) => {
            debug!(error = %e, "no project directory yet; looking for config in current directory");
            start_dir.clone()
        }
    };
    let mut config = load_or_default(args.config.as_deref(), &config_dir)?;
    if let Some(executable) = &args.executable {
        config = config.with_executable(executable.clone());
    }

    let request = RunRequest::new(verb, args.args.clone(), false);

    if args.dry_run {
        let cwd = working_dir.cwd().await?;
        print_dry_run(&config, &request, cwd);
        return Ok(0);
    }

    let config = Arc::new(config);
    let host = Host {
        working_dir,
        args: config.clone(),
        output: Arc::new(StdoutSink),
        status: Arc::new(LogStatus),
        notifier: Arc::new(StderrNotifier),
        diagnostics_enabled: DiagnosticsToggle::new(
            config.diagnostics.enabled && !args.no_diagnostics,
        ),
    };

    let (orchestrator, handle) = Orchestrator::new(
        host,
        Arc::new(RealProcessBackend::new()),
        Arc::new(ConsoleSink::new()),
        OrchestratorOptions::from_config(&config),
    );
    let mut notices = handle.subscribe();
    let loop_task = tokio::spawn(orchestrator.run());

    handle.submit(request).await?;
    let end = wait_for_end(&handle, &mut notices).await;

    if let Err(e) = handle.shutdown().await {
        debug!(error = %e, "orchestrator already stopped");
    }
    loop_task.await.context("orchestrator task panicked")??;

    let code = match end {
        RunEnd::Finished(outcome) => exit_code(&outcome),
        RunEnd::Rejected => EXIT_REJECTED,
    };
    info!(exit_code = code, "buildpipe done");
    Ok(code)
}

enum RunEnd {
    Finished(TaskOutcome),
    Rejected,
}

/// Wait for the single run to end; Ctrl-C stops it.
async fn wait_for_end(
    handle: &OrchestratorHandle,
    notices: &mut broadcast::Receiver<RunNotice>,
) -> RunEnd {
    loop {
        tokio::select! {
            notice = notices.recv() => match notice {
                Ok(RunNotice::Finished { outcome, .. }) => return RunEnd::Finished(outcome),
                Ok(RunNotice::Rejected { .. }) => return RunEnd::Rejected,
                Ok(RunNotice::Started { .. }) => {}
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "missed run notices");
                }
                Err(broadcast::error::RecvError::Closed) => return RunEnd::Rejected,
            },
            signal = tokio::signal::ctrl_c() => {
                if let Err(e) = signal {
                    warn!(error = %e, "failed to listen for Ctrl+C");
                    continue;
                }
                info!("Ctrl+C received; stopping current task");
                if handle.stop().await.is_err() {
                    return RunEnd::Finished(TaskOutcome::Cancelled);
                }
            }
        }
    }
}

/// Process exit code for a finished task.
pub fn exit_code(outcome: &TaskOutcome) -> i32 {
    match outcome {
        TaskOutcome::Completed(code) => *code,
        TaskOutcome::Cancelled => EXIT_CANCELLED,
        TaskOutcome::StartFailed(StartError::NotFound { .. }) => EXIT_NOT_FOUND,
        TaskOutcome::StartFailed(_) => EXIT_START_FAILED,
        TaskOutcome::Abnormal => 1,
    }
}

/// Simple dry-run output: the resolved command and where it would run.
fn print_dry_run(config: &ConfigFile, request: &RunRequest, cwd: PathBuf) {
    let planner = InvocationPlanner::new(config.tool.executable.clone(), Arc::new(config.clone()));
    let invocation = planner.plan_unprobed(request, cwd);

    println!("buildpipe dry-run");
    println!("  verb: {}", invocation.verb);
    println!("  cwd: {}", invocation.spec.cwd.display());
    println!("  command: {}", invocation.spec.command_line());
    println!("  argv: {:?}", invocation.spec.args);
    println!("  structured output: {}", invocation.structured);
    if let Some(probe) = invocation.verb.rule().probe {
        println!(
            "  probe: {} {} (fallback: {})",
            config.tool.executable,
            probe.args.join(" "),
            probe.fallback
        );
    }

    debug!("dry-run complete (no execution)");
}
