// src/types.rs

//! Closed set of build-tool verbs and their rule table.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

use crate::errors::BuildpipeError;

/// Prefix used to spell an arbitrary subcommand on the command line.
pub const CUSTOM_PREFIX: &str = "custom:";

/// A build-tool subcommand the orchestrator knows how to run.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Verb {
    Build,
    Check,
    /// `clippy`
    Lint,
    Test,
    Run,
    Bench,
    Doc,
    Update,
    Clean,
    New,
    Init,
    /// Any other subcommand, run with plain text output.
    Custom(String),
}

/// Which user-argument list a verb draws from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArgKind {
    Build,
    Check,
    Lint,
    Run,
    Test,
}

/// Lightweight availability check run before a verb whose preferred
/// subcommand may be missing from the installed tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeRule {
    /// Arguments of the probe invocation; exit code 0 means "supported".
    pub args: &'static [&'static str],
    /// Subcommand used instead when the probe fails.
    pub fallback: &'static str,
}

/// Static properties of a verb.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerbRule {
    pub subcommand: &'static str,
    /// Whether `--message-format json` is injected.
    pub structured_output: bool,
    pub arg_kind: Option<ArgKind>,
    pub probe: Option<ProbeRule>,
}

const fn plain(subcommand: &'static str) -> VerbRule {
    VerbRule {
        subcommand,
        structured_output: false,
        arg_kind: None,
        probe: None,
    }
}

const fn structured(subcommand: &'static str, kind: ArgKind) -> VerbRule {
    VerbRule {
        subcommand,
        structured_output: true,
        arg_kind: Some(kind),
        probe: None,
    }
}

const BUILD: VerbRule = structured("build", ArgKind::Build);
const CHECK: VerbRule = VerbRule {
    probe: Some(ProbeRule {
        args: &["check", "--help"],
        fallback: "build",
    }),
    ..structured("check", ArgKind::Check)
};
const LINT: VerbRule = VerbRule {
    probe: Some(ProbeRule {
        args: &["clippy", "--version"],
        fallback: "check",
    }),
    ..structured("clippy", ArgKind::Lint)
};
const TEST: VerbRule = structured("test", ArgKind::Test);
const RUN: VerbRule = structured("run", ArgKind::Run);

impl Verb {
    /// Rule table entry for this verb.
    ///
    /// `Custom` borrows its subcommand from `self`, so it is returned
    /// separately by [`Verb::subcommand`]; its rule carries an empty name.
    pub fn rule(&self) -> VerbRule {
        match self {
            Verb::Build => BUILD,
            Verb::Check => CHECK,
            Verb::Lint => LINT,
            Verb::Test => TEST,
            Verb::Run => RUN,
            Verb::Bench => plain("bench"),
            Verb::Doc => plain("doc"),
            Verb::Update => plain("update"),
            Verb::Clean => plain("clean"),
            Verb::New => plain("new"),
            Verb::Init => plain("init"),
            Verb::Custom(_) => plain(""),
        }
    }

    /// Preferred subcommand name.
    pub fn subcommand(&self) -> &str {
        match self {
            Verb::Custom(name) => name.as_str(),
            other => other.rule().subcommand,
        }
    }

    pub fn supports_structured_output(&self) -> bool {
        self.rule().structured_output
    }

    /// Reject verbs that cannot be turned into an invocation.
    pub fn validate(&self) -> Result<(), BuildpipeError> {
        match self {
            Verb::Custom(name) if name.trim().is_empty() => Err(BuildpipeError::UnhandledVerb(
                "custom verb needs a subcommand name".to_string(),
            )),
            Verb::Custom(name) if name.starts_with('-') => Err(BuildpipeError::UnhandledVerb(
                format!("custom subcommand '{name}' looks like a flag"),
            )),
            _ => Ok(()),
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verb::Lint => write!(f, "lint"),
            Verb::Custom(name) => write!(f, "{CUSTOM_PREFIX}{name}"),
            other => write!(f, "{}", other.subcommand()),
        }
    }
}

impl FromStr for Verb {
    type Err = BuildpipeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(name) = s.strip_prefix(CUSTOM_PREFIX) {
            let verb = Verb::Custom(name.trim().to_string());
            verb.validate()?;
            return Ok(verb);
        }

        match s.to_lowercase().as_str() {
            "build" => Ok(Verb::Build),
            "check" => Ok(Verb::Check),
            "lint" | "clippy" => Ok(Verb::Lint),
            "test" => Ok(Verb::Test),
            "run" => Ok(Verb::Run),
            "bench" => Ok(Verb::Bench),
            "doc" => Ok(Verb::Doc),
            "update" => Ok(Verb::Update),
            "clean" => Ok(Verb::Clean),
            "new" => Ok(Verb::New),
            "init" => Ok(Verb::Init),
            other => Err(BuildpipeError::UnhandledVerb(format!(
                "unknown verb '{other}' (use {CUSTOM_PREFIX}<subcommand> for others)"
            ))),
        }
    }
}
