// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Command-line arguments for `buildpipe`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "buildpipe",
    version,
    about = "Run a build tool command and collect its diagnostics per source file.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// Default: `Buildpipe.toml` in the working directory. A missing default
    /// file means built-in defaults.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Working directory for the build tool.
    ///
    /// If omitted, the nearest ancestor of the current directory holding a
    /// `Cargo.toml` is used.
    #[arg(long, value_name = "DIR")]
    pub cwd: Option<PathBuf>,

    /// Build tool executable, overriding `[tool].executable`.
    #[arg(long, value_name = "BIN")]
    pub executable: Option<String>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `BUILDPIPE_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Do not publish diagnostics; structured messages are still consumed.
    #[arg(long)]
    pub no_diagnostics: bool,

    /// Resolve and print the argument vector, but don't spawn anything.
    #[arg(long)]
    pub dry_run: bool,

    /// Verb to run: build, check, lint, test, run, bench, doc, update,
    /// clean, new, init, or `custom:<subcommand>`.
    #[arg(value_name = "VERB")]
    pub verb: String,

    /// Extra arguments appended after the configured ones.
    #[arg(value_name = "ARGS", trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
