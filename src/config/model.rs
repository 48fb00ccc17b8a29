// src/config/model.rs

use serde::Deserialize;

use crate::host::ArgSource;
use crate::types::ArgKind;

/// Top-level configuration as read from a TOML file, before validation.
///
/// ```toml
/// [tool]
/// executable = "cargo"
///
/// [diagnostics]
/// enabled = true
/// dedupe = false
///
/// [args]
/// check = ["--all-targets"]
/// test = ["--", "--nocapture"]
/// ```
///
/// All sections are optional and have reasonable defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawConfigFile {
    #[serde(default)]
    pub tool: ToolSection,

    #[serde(default)]
    pub diagnostics: DiagnosticsSection,

    #[serde(default)]
    pub args: ArgsSection,
}

/// `[tool]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ToolSection {
    /// Build tool binary, looked up on `PATH` unless it contains a separator.
    #[serde(default = "default_executable")]
    pub executable: String,
}

fn default_executable() -> String {
    "cargo".to_string()
}

impl Default for ToolSection {
    fn default() -> Self {
        Self {
            executable: default_executable(),
        }
    }
}

/// `[diagnostics]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DiagnosticsSection {
    /// Initial value of the runtime publishing toggle.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Drop a diagnostic already shown for the same file with the same
    /// range, severity and message.
    #[serde(default)]
    pub dedupe: bool,

    /// Copy the tool's pre-rendered diagnostic text to the output sink.
    #[serde(default = "default_true")]
    pub echo_rendered: bool,
}

fn default_true() -> bool {
    true
}

impl Default for DiagnosticsSection {
    fn default() -> Self {
        Self {
            enabled: true,
            dedupe: false,
            echo_rendered: true,
        }
    }
}

/// `[args]` section: user arguments per verb kind.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ArgsSection {
    #[serde(default)]
    pub build: Vec<String>,
    #[serde(default)]
    pub check: Vec<String>,
    #[serde(default)]
    pub lint: Vec<String>,
    #[serde(default)]
    pub run: Vec<String>,
    #[serde(default)]
    pub test: Vec<String>,
}

impl ArgsSection {
    pub fn for_kind(&self, kind: ArgKind) -> &[String] {
        match kind {
            ArgKind::Build => &self.build,
            ArgKind::Check => &self.check,
            ArgKind::Lint => &self.lint,
            ArgKind::Run => &self.run,
            ArgKind::Test => &self.test,
        }
    }

    pub(crate) fn all(&self) -> impl Iterator<Item = (ArgKind, &[String])> {
        [
            ArgKind::Build,
            ArgKind::Check,
            ArgKind::Lint,
            ArgKind::Run,
            ArgKind::Test,
        ]
        .into_iter()
        .map(move |kind| (kind, self.for_kind(kind)))
    }
}

/// Validated configuration. Only obtainable through `TryFrom<RawConfigFile>`.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub tool: ToolSection,
    pub diagnostics: DiagnosticsSection,
    pub args: ArgsSection,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(
        tool: ToolSection,
        diagnostics: DiagnosticsSection,
        args: ArgsSection,
    ) -> Self {
        Self {
            tool,
            diagnostics,
            args,
        }
    }

    /// Override the executable (e.g. from `--executable`).
    pub fn with_executable(mut self, executable: impl Into<String>) -> Self {
        self.tool.executable = executable.into();
        self
    }
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self::new_unchecked(
            ToolSection::default(),
            DiagnosticsSection::default(),
            ArgsSection::default(),
        )
    }
}

impl ArgSource for ConfigFile {
    fn args(&self, kind: ArgKind) -> Vec<String> {
        self.args.for_kind(kind).to_vec()
    }
}
