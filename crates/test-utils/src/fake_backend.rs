use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use buildpipe::exec::{
    CommandSpec, ProcessBackend, ProcessEvent, ProcessEventKind, StartError, Stream, TaskId,
};
use buildpipe::host::BoxFuture;
use tokio::sync::mpsc;

/// What the fake does when asked to spawn.
#[derive(Debug, Clone)]
pub enum SpawnBehaviour {
    /// Record only; the test drives the task with [`FakeBackend::emit`].
    Manual,
    /// Emit `Started`, the given lines, then `Exited { code }`.
    Complete {
        lines: Vec<(Stream, String)>,
        code: Option<i32>,
    },
    /// Emit `Failed { error }`.
    Fail(StartError),
}

#[derive(Debug, Default)]
struct FakeState {
    spawned: Vec<(TaskId, CommandSpec)>,
    killed: Vec<TaskId>,
    probes: Vec<CommandSpec>,
    senders: HashMap<TaskId, mpsc::Sender<ProcessEvent>>,
}

/// A fake process backend that:
/// - records spawn, kill and probe requests
/// - emits scripted `ProcessEvent`s instead of running anything
/// - answers a kill with `Exited { code: None }`, like a killed process.
#[derive(Debug, Clone)]
pub struct FakeBackend {
    behaviour: SpawnBehaviour,
    probe_results: HashMap<Vec<String>, bool>,
    exit_on_kill: bool,
    state: Arc<Mutex<FakeState>>,
}

impl FakeBackend {
    pub fn new(behaviour: SpawnBehaviour) -> Self {
        Self {
            behaviour,
            probe_results: HashMap::new(),
            exit_on_kill: true,
            state: Arc::new(Mutex::new(FakeState::default())),
        }
    }

    pub fn manual() -> Self {
        Self::new(SpawnBehaviour::Manual)
    }

    /// Answer the probe with these arguments. Unlisted probes succeed.
    pub fn with_probe(mut self, args: &[&str], supported: bool) -> Self {
        self.probe_results
            .insert(args.iter().map(|a| a.to_string()).collect(), supported);
        self
    }

    /// Leave killed tasks hanging until the test emits their exit.
    pub fn without_exit_on_kill(mut self) -> Self {
        self.exit_on_kill = false;
        self
    }

    pub fn spawned(&self) -> Vec<(TaskId, CommandSpec)> {
        self.state.lock().unwrap().spawned.clone()
    }

    pub fn spawn_count(&self) -> usize {
        self.state.lock().unwrap().spawned.len()
    }

    pub fn killed(&self) -> Vec<TaskId> {
        self.state.lock().unwrap().killed.clone()
    }

    pub fn probes(&self) -> Vec<CommandSpec> {
        self.state.lock().unwrap().probes.clone()
    }

    /// Task id of the n-th spawn (0-based).
    pub fn task(&self, n: usize) -> TaskId {
        self.state.lock().unwrap().spawned[n].0
    }

    /// Emit an event for a spawned task.
    pub async fn emit(&self, task: TaskId, kind: ProcessEventKind) {
        let tx = self
            .state
            .lock()
            .unwrap()
            .senders
            .get(&task)
            .cloned()
            .expect("emit for a task that was never spawned");
        tx.send(ProcessEvent::new(task, kind))
            .await
            .expect("orchestrator dropped the process channel");
    }

    pub async fn start(&self, task: TaskId) {
        self.emit(task, ProcessEventKind::Started { pid: Some(4242) }).await;
    }

    pub async fn stdout(&self, task: TaskId, text: impl Into<String>) {
        self.emit(
            task,
            ProcessEventKind::Line {
                stream: Stream::Stdout,
                text: text.into(),
            },
        )
        .await;
    }

    pub async fn stderr(&self, task: TaskId, text: impl Into<String>) {
        self.emit(
            task,
            ProcessEventKind::Line {
                stream: Stream::Stderr,
                text: text.into(),
            },
        )
        .await;
    }

    pub async fn exit(&self, task: TaskId, code: i32) {
        self.emit(task, ProcessEventKind::Exited { code: Some(code) }).await;
    }
}

impl ProcessBackend for FakeBackend {
    fn spawn(&self, task: TaskId, spec: CommandSpec, events: mpsc::Sender<ProcessEvent>) {
        {
            let mut state = self.state.lock().unwrap();
            state.spawned.push((task, spec));
            state.senders.insert(task, events.clone());
        }

        let script: Vec<ProcessEventKind> = match &self.behaviour {
            SpawnBehaviour::Manual => return,
            SpawnBehaviour::Complete { lines, code } => {
                std::iter::once(ProcessEventKind::Started { pid: Some(4242) })
                    .chain(lines.iter().map(|(stream, text)| ProcessEventKind::Line {
                        stream: *stream,
                        text: text.clone(),
                    }))
                    .chain(std::iter::once(ProcessEventKind::Exited { code: *code }))
                    .collect()
            }
            SpawnBehaviour::Fail(error) => vec![ProcessEventKind::Failed {
                error: error.clone(),
            }],
        };

        tokio::spawn(async move {
            for kind in script {
                if events.send(ProcessEvent::new(task, kind)).await.is_err() {
                    return;
                }
            }
        });
    }

    fn kill(&self, task: TaskId) {
        let sender = {
            let mut state = self.state.lock().unwrap();
            state.killed.push(task);
            state.senders.get(&task).cloned()
        };
        if self.exit_on_kill {
            if let Some(tx) = sender {
                let _ = tx.try_send(ProcessEvent::new(task, ProcessEventKind::Exited { code: None }));
            }
        }
    }

    fn probe(&self, spec: CommandSpec) -> BoxFuture<'static, bool> {
        let supported = self.probe_results.get(&spec.args).copied().unwrap_or(true);
        self.state.lock().unwrap().probes.push(spec);
        Box::pin(async move { supported })
    }
}
