// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::Result;

/// Load a configuration file from a given path and return the raw `RawConfigFile`.
///
/// This only performs TOML deserialization; use [`load_and_validate`] for
/// the checked form.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfigFile> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    let config: RawConfigFile = toml::from_str(&contents)?;

    Ok(config)
}

/// Load a configuration file from path and run validation.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<ConfigFile> {
    let raw_config = load_from_path(&path)?;
    let config = ConfigFile::try_from(raw_config)?;
    Ok(config)
}

/// Load an explicitly requested config, or the default file inside `dir`
/// when present, or built-in defaults.
///
/// An explicit path that does not exist is an error; a missing default file
/// is not.
pub fn load_or_default(explicit: Option<&Path>, dir: &Path) -> Result<ConfigFile> {
    if let Some(path) = explicit {
        return load_and_validate(path);
    }

    let candidate = dir.join(default_config_path());
    if candidate.is_file() {
        debug!(path = %candidate.display(), "loading default config file");
        load_and_validate(&candidate)
    } else {
        debug!(dir = %dir.display(), "no config file found; using defaults");
        Ok(ConfigFile::default())
    }
}

/// Name of the config file looked up when `--config` is not given.
pub fn default_config_path() -> PathBuf {
    PathBuf::from("Buildpipe.toml")
}
