// src/exec/runner.rs

//! Single-process runner.

use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::decoder::LineDecoder;
use super::{CommandSpec, ProcessEvent, ProcessEventKind, StartError, Stream, TaskId};

/// How long pipes may keep delivering output after the process itself has
/// exited (descendants can hold them open).
const DRAIN_GRACE: Duration = Duration::from_millis(500);

const READ_CHUNK: usize = 8 * 1024;

/// Handle to one started process.
///
/// Dropping the handle without calling [`ProcessHandle::kill`] also
/// terminates the process.
#[derive(Debug)]
pub struct ProcessHandle {
    task: TaskId,
    cancel: Option<oneshot::Sender<()>>,
    supervisor: JoinHandle<()>,
}

impl ProcessHandle {
    pub fn task(&self) -> TaskId {
        self.task
    }

    /// Request termination. Idempotent; a no-op once the process is gone.
    ///
    /// Returns whether this call delivered the request.
    pub fn kill(&mut self) -> bool {
        match self.cancel.take() {
            Some(cancel) => cancel.send(()).is_ok(),
            None => false,
        }
    }

    /// True once the terminal event has been emitted.
    pub fn is_finished(&self) -> bool {
        self.supervisor.is_finished()
    }
}

/// Starts processes and streams their output as [`ProcessEvent`]s.
///
/// Every start ends with exactly one terminal event on `events`:
/// `Exited` if the process ran (whatever its exit code), `Failed` if it
/// never started.
pub struct ProcessRunner;

impl ProcessRunner {
    /// Spawn `spec` for task `task`.
    ///
    /// Returns `None` when the spawn failed; the `Failed` event is still
    /// delivered on `events`.
    pub fn start(
        task: TaskId,
        spec: &CommandSpec,
        events: mpsc::Sender<ProcessEvent>,
    ) -> Option<ProcessHandle> {
        info!(
            task = %task,
            cmd = %spec.command_line(),
            cwd = %spec.cwd.display(),
            "starting process"
        );

        let mut cmd = command_for(spec);
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        // Own process group, so a kill reaches everything the tool spawned.
        #[cfg(unix)]
        cmd.process_group(0);

        match cmd.spawn() {
            Ok(child) => {
                let (cancel_tx, cancel_rx) = oneshot::channel::<()>();
                let supervisor = tokio::spawn(supervise(task, child, events, cancel_rx));
                Some(ProcessHandle {
                    task,
                    cancel: Some(cancel_tx),
                    supervisor,
                })
            }
            Err(e) => {
                report_start_failure(task, spec.clone(), e, events);
                None
            }
        }
    }

    /// Run `spec` to completion with all output discarded.
    ///
    /// Returns true when it exited with code 0. Failing to start counts as
    /// unsupported.
    pub async fn probe(spec: &CommandSpec) -> bool {
        let mut cmd = command_for(spec);
        cmd.stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        match cmd.status().await {
            Ok(status) => {
                debug!(cmd = %spec.command_line(), success = status.success(), "probe finished");
                status.success()
            }
            Err(e) => {
                debug!(cmd = %spec.command_line(), error = %e, "probe could not start");
                false
            }
        }
    }
}

fn command_for(spec: &CommandSpec) -> Command {
    let mut cmd = Command::new(&spec.program);
    cmd.args(&spec.args).current_dir(&spec.cwd);
    cmd
}

/// Spawn fails with `NotFound` for a missing working directory as well as a
/// missing program; tell the two apart before reporting.
fn report_start_failure(
    task: TaskId,
    spec: CommandSpec,
    err: std::io::Error,
    events: mpsc::Sender<ProcessEvent>,
) {
    tokio::spawn(async move {
        let cwd_exists = tokio::fs::metadata(&spec.cwd)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false);
        let error = if cwd_exists {
            StartError::from_io(&spec.program, &err)
        } else {
            StartError::Other {
                program: spec.program.clone(),
                message: format!("working directory {} does not exist", spec.cwd.display()),
            }
        };
        warn!(task = %task, error = %error, "process failed to start");
        let _ = events
            .send(ProcessEvent::new(task, ProcessEventKind::Failed { error }))
            .await;
    });
}

async fn supervise(
    task: TaskId,
    mut child: Child,
    events: mpsc::Sender<ProcessEvent>,
    mut cancel_rx: oneshot::Receiver<()>,
) {
    let pid = child.id();
    if events
        .send(ProcessEvent::new(task, ProcessEventKind::Started { pid }))
        .await
        .is_err()
    {
        debug!(task = %task, "event receiver gone before start; killing process");
        terminate(&mut child);
        let _ = child.wait().await;
        return;
    }

    let mut readers = Vec::with_capacity(2);
    if let Some(stdout) = child.stdout.take() {
        readers.push(tokio::spawn(pump(task, Stream::Stdout, stdout, events.clone())));
    }
    if let Some(stderr) = child.stderr.take() {
        readers.push(tokio::spawn(pump(task, Stream::Stderr, stderr, events.clone())));
    }

    // Either the process exits on its own, or a kill is requested (explicitly
    // or by dropping the handle).
    let mut killed = false;
    let status = tokio::select! {
        status = child.wait() => status,
        cancel = &mut cancel_rx => {
            if cancel.is_ok() {
                info!(task = %task, "kill requested; terminating process group");
            } else {
                debug!(task = %task, "process handle dropped; terminating process group");
            }
            killed = true;
            terminate(&mut child);
            child.wait().await
        }
    };

    if killed {
        // Whatever is still buffered belongs to a cancelled generation.
        for reader in &readers {
            reader.abort();
        }
    } else {
        drain(task, readers).await;
    }

    let code = match status {
        Ok(status) => {
            info!(
                task = %task,
                exit_code = ?status.code(),
                success = status.success(),
                killed,
                "process exited"
            );
            status.code()
        }
        Err(e) => {
            warn!(task = %task, error = %e, "failed to wait for process");
            None
        }
    };

    let _ = events
        .send(ProcessEvent::new(task, ProcessEventKind::Exited { code }))
        .await;
}

async fn drain(task: TaskId, readers: Vec<JoinHandle<()>>) {
    for mut reader in readers {
        match tokio::time::timeout(DRAIN_GRACE, &mut reader).await {
            Ok(_) => {}
            Err(_) => {
                debug!(task = %task, "pipe still open after exit; abandoning remaining output");
                reader.abort();
            }
        }
    }
}

async fn pump<R>(task: TaskId, stream: Stream, mut reader: R, events: mpsc::Sender<ProcessEvent>)
where
    R: AsyncRead + Unpin,
{
    let mut decoder = LineDecoder::new();
    let mut buf = vec![0u8; READ_CHUNK];

    loop {
        match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                for text in decoder.push(&buf[..n]) {
                    if send_line(task, stream, text, &events).await.is_err() {
                        return;
                    }
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => {
                debug!(task = %task, ?stream, error = %e, "pipe read failed");
                break;
            }
        }
    }

    if let Some(text) = decoder.finish() {
        let _ = send_line(task, stream, text, &events).await;
    }
}

async fn send_line(
    task: TaskId,
    stream: Stream,
    text: String,
    events: &mpsc::Sender<ProcessEvent>,
) -> Result<(), mpsc::error::SendError<ProcessEvent>> {
    events
        .send(ProcessEvent::new(task, ProcessEventKind::Line { stream, text }))
        .await
}

/// Kill the child's process group, falling back to the child alone.
fn terminate(child: &mut Child) {
    #[cfg(unix)]
    if let Some(pid) = child.id() {
        // SAFETY: plain syscall; `pid` is the group id of our own child, set
        // up with `process_group(0)` at spawn time.
        let rc = unsafe { libc::killpg(pid as libc::pid_t, libc::SIGKILL) };
        if rc == 0 {
            return;
        }
        debug!(
            pid,
            error = %std::io::Error::last_os_error(),
            "killpg failed; killing child only"
        );
    }

    if let Err(e) = child.start_kill() {
        debug!(error = %e, "start_kill failed (process already gone?)");
    }
}
