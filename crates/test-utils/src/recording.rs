use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use buildpipe::config::ConfigFile;
use buildpipe::host::{
    ArgSource, DiagnosticsToggle, FixedWorkingDir, Host, OutputSink, StatusIndicator,
    UserNotifier, WorkingDirResolver,
};

/// Output sink that keeps every line.
#[derive(Debug, Default)]
pub struct RecordingOutput {
    lines: Mutex<Vec<String>>,
}

impl RecordingOutput {
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap().clone()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.lines.lock().unwrap().iter().any(|l| l.contains(needle))
    }
}

impl OutputSink for RecordingOutput {
    fn append_line(&self, line: &str) {
        self.lines.lock().unwrap().push(line.to_string());
    }
}

/// Busy indicator that keeps every transition.
#[derive(Debug, Default)]
pub struct RecordingStatus {
    transitions: Mutex<Vec<bool>>,
}

impl RecordingStatus {
    pub fn transitions(&self) -> Vec<bool> {
        self.transitions.lock().unwrap().clone()
    }

    pub fn is_busy(&self) -> bool {
        self.transitions.lock().unwrap().last().copied().unwrap_or(false)
    }
}

impl StatusIndicator for RecordingStatus {
    fn set_busy(&self, busy: bool) {
        self.transitions.lock().unwrap().push(busy);
    }
}

/// Notifier that keeps info and error messages apart.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    infos: Mutex<Vec<String>>,
    errors: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn infos(&self) -> Vec<String> {
        self.infos.lock().unwrap().clone()
    }

    pub fn errors(&self) -> Vec<String> {
        self.errors.lock().unwrap().clone()
    }
}

impl UserNotifier for RecordingNotifier {
    fn show_info(&self, message: &str) {
        self.infos.lock().unwrap().push(message.to_string());
    }

    fn show_error(&self, message: &str) {
        self.errors.lock().unwrap().push(message.to_string());
    }
}

/// A [`Host`] wired to recording collaborators.
pub struct TestHost {
    pub host: Host,
    pub output: Arc<RecordingOutput>,
    pub status: Arc<RecordingStatus>,
    pub notifier: Arc<RecordingNotifier>,
}

impl TestHost {
    /// Host running everything in `dir`, with default config arguments.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self::with_parts(
            Arc::new(FixedWorkingDir(dir.into())),
            Arc::new(ConfigFile::default()),
        )
    }

    pub fn with_parts(
        working_dir: Arc<dyn WorkingDirResolver>,
        args: Arc<dyn ArgSource>,
    ) -> Self {
        let output = Arc::new(RecordingOutput::default());
        let status = Arc::new(RecordingStatus::default());
        let notifier = Arc::new(RecordingNotifier::default());
        let host = Host {
            working_dir,
            args,
            output: output.clone(),
            status: status.clone(),
            notifier: notifier.clone(),
            diagnostics_enabled: DiagnosticsToggle::new(true),
        };
        Self {
            host,
            output,
            status,
            notifier,
        }
    }

    pub fn with_args(mut self, args: Arc<dyn ArgSource>) -> Self {
        self.host.args = args;
        self
    }
}
