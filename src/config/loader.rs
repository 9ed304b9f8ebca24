// src/config/loader.rs

use std::fs;
use std::path::Path;

use crate::config::model::{RawSettings, Settings};
use crate::errors::Result;

/// Load a settings file from a given path without validating it.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawSettings> {
    let contents = fs::read_to_string(path.as_ref())?;
    let raw: RawSettings = toml::from_str(&contents)?;
    Ok(raw)
}

/// Load and validate a settings file.
///
/// Without a path the built-in defaults are used, which is the normal case
/// when the agent launches the executor.
pub fn load_settings(path: Option<&Path>) -> Result<Settings> {
    match path {
        Some(path) => Settings::try_from(load_from_path(path)?),
        None => Ok(Settings::default()),
    }
}
