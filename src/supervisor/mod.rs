// src/supervisor/mod.rs

//! Process supervisor abstraction.
//!
//! The executor never forks processes itself. It hands a [`ProcessSpec`] to a
//! [`ProcessSupervisor`] and polls it for status. Production uses
//! [`SupervisorClient`], which talks to the node-local supervisor daemon over a
//! Unix socket; tests substitute an in-memory fake.

pub mod client;
pub mod spec;

pub use client::SupervisorClient;
pub use spec::{LocalFile, ProcessResources, ProcessSpec};

use serde::{Deserialize, Serialize};

use crate::errors::Result;
use crate::types::{BoxFuture, ProcessState};

/// Result of inspecting a managed process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessStatus {
    pub state: ProcessState,
    #[serde(default)]
    pub message: Option<String>,
}

impl ProcessStatus {
    pub fn new(state: ProcessState) -> Self {
        Self {
            state,
            message: None,
        }
    }
}

/// Narrow contract the executor needs from the process supervisor. All
/// operations address a process by the task id it was created with.
pub trait ProcessSupervisor: Send + Sync {
    fn create<'a>(&'a self, spec: &'a ProcessSpec) -> BoxFuture<'a, Result<()>>;

    fn inspect<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<ProcessStatus>>;

    /// Ask the process to stop, escalating after `timeout_secs`.
    fn stop<'a>(&'a self, id: &'a str, timeout_secs: u64) -> BoxFuture<'a, Result<()>>;

    fn delete<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<()>>;

    fn reload<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<()>>;

    fn restart<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<()>>;
}
