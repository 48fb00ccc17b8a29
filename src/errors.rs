// src/errors.rs

//! Crate-wide error aliases and helpers.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BuildpipeError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Cannot resolve a working directory: {0}")]
    WorkingDirUnresolved(String),

    #[error("Unhandled verb: {0}")]
    UnhandledVerb(String),

    #[error("orchestrator is no longer running")]
    OrchestratorClosed,
}

impl<T> From<tokio::sync::mpsc::error::SendError<T>> for BuildpipeError {
    fn from(_: tokio::sync::mpsc::error::SendError<T>) -> Self {
        BuildpipeError::OrchestratorClosed
    }
}

pub type Result<T> = std::result::Result<T, BuildpipeError>;
