// src/errors.rs

//! Crate-wide error aliases and helpers.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExecutorError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(&'static str),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Agent returned HTTP {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Decode error: {0}")]
    DecodeError(String),

    #[error("Invalid task '{task_id}': {reason}")]
    InvalidTask { task_id: String, reason: String },

    #[error("Process supervisor error: {0}")]
    SupervisorError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ExecutorError {
    pub fn invalid_task(task_id: impl Into<String>, reason: impl Into<String>) -> Self {
        ExecutorError::InvalidTask {
            task_id: task_id.into(),
            reason: reason.into(),
        }
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, ExecutorError>;
