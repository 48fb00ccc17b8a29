// src/config/validate.rs

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{BuildpipeError, Result};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = BuildpipeError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw.tool, raw.diagnostics, raw.args))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    validate_tool(cfg)?;
    validate_args(cfg)?;
    Ok(())
}

fn validate_tool(cfg: &RawConfigFile) -> Result<()> {
    if cfg.tool.executable.trim().is_empty() {
        return Err(BuildpipeError::ConfigError(
            "[tool].executable must not be empty".to_string(),
        ));
    }
    Ok(())
}

fn validate_args(cfg: &RawConfigFile) -> Result<()> {
    for (kind, args) in cfg.args.all() {
        if let Some(pos) = args.iter().position(|a| a.is_empty()) {
            return Err(BuildpipeError::ConfigError(format!(
                "[args].{} has an empty argument at index {}",
                format!("{kind:?}").to_lowercase(),
                pos
            )));
        }
    }
    Ok(())
}
