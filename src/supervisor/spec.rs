// src/supervisor/spec.rs

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Everything the supervisor needs to run one task's process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessSpec {
    /// Process id at the supervisor; always the task id.
    pub id: String,
    pub cmd: String,
    #[serde(default)]
    pub args: Vec<String>,
    /// `KEY=VALUE` entries.
    #[serde(default)]
    pub env: Vec<String>,
    pub dir: PathBuf,
    #[serde(default)]
    pub pid_file: Option<PathBuf>,
    #[serde(default)]
    pub uris: Vec<String>,
    /// Written into the sandbox by the executor before `create`.
    #[serde(default)]
    pub local_files: Vec<LocalFile>,
    #[serde(default)]
    pub stop_cmd: Option<String>,
    /// Seconds between the stop request and a forced kill.
    pub stop_timeout: u64,
    /// Seconds the process may spend starting before it counts as unhealthy.
    #[serde(default)]
    pub start_grace_period: u64,
    #[serde(default)]
    pub resources: ProcessResources,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessResources {
    #[serde(default)]
    pub cpus: Option<f64>,
    #[serde(default)]
    pub mem_mb: Option<f64>,
    #[serde(default)]
    pub disk_mb: Option<f64>,
}

/// A file materialised in the sandbox before the process starts. Secrets are
/// carried the same way with a restrictive default mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalFile {
    /// Absolute path inside the sandbox.
    pub path: PathBuf,
    /// Base64 of the file contents.
    pub content: String,
    #[serde(default)]
    pub mode: Option<u32>,
    /// Owner to `chown` the file to after writing.
    #[serde(default)]
    pub user: Option<String>,
}
