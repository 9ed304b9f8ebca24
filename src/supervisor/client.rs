// src/supervisor/client.rs

//! Client for the node-local process supervisor daemon.
//!
//! One request per connection: the client writes a single JSON line and reads
//! a single JSON line back.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tracing::trace;

use crate::errors::{ExecutorError, Result};
use crate::supervisor::{ProcessSpec, ProcessStatus, ProcessSupervisor};
use crate::types::{BoxFuture, ProcessState};

/// Request sent to the supervisor daemon.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SupervisorRequest {
    Create { spec: ProcessSpec },
    Inspect { id: String },
    Stop { id: String, timeout_secs: u64 },
    Delete { id: String },
    Reload { id: String },
    Restart { id: String },
}

impl SupervisorRequest {
    fn name(&self) -> &'static str {
        match self {
            SupervisorRequest::Create { .. } => "create",
            SupervisorRequest::Inspect { .. } => "inspect",
            SupervisorRequest::Stop { .. } => "stop",
            SupervisorRequest::Delete { .. } => "delete",
            SupervisorRequest::Reload { .. } => "reload",
            SupervisorRequest::Restart { .. } => "restart",
        }
    }
}

/// Response from the supervisor daemon.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SupervisorResponse {
    pub ok: bool,
    #[serde(default)]
    pub status: Option<ProcessState>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SupervisorClient {
    socket: PathBuf,
    timeout: Duration,
}

impl SupervisorClient {
    pub fn new(socket: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            socket: socket.into(),
            timeout,
        }
    }

    pub fn socket(&self) -> &Path {
        &self.socket
    }

    async fn request(&self, request: SupervisorRequest) -> Result<SupervisorResponse> {
        let name = request.name();
        let exchange = async {
            let mut stream = UnixStream::connect(&self.socket).await?;

            let mut line = serde_json::to_vec(&request)?;
            line.push(b'\n');
            stream.write_all(&line).await?;
            stream.flush().await?;

            let mut reader = BufReader::new(stream);
            let mut reply = String::new();
            if reader.read_line(&mut reply).await? == 0 {
                return Err(ExecutorError::SupervisorError(format!(
                    "{name}: connection closed without a response"
                )));
            }

            let response: SupervisorResponse = serde_json::from_str(reply.trim())?;
            Ok::<_, ExecutorError>(response)
        };

        let response = tokio::time::timeout(self.timeout, exchange)
            .await
            .map_err(|_| {
                ExecutorError::Timeout(format!(
                    "supervisor {name} request did not complete within {:?}",
                    self.timeout
                ))
            })??;

        trace!(request = name, ?response, "supervisor response");

        if !response.ok {
            return Err(ExecutorError::SupervisorError(format!(
                "{name}: {}",
                response.error.as_deref().unwrap_or("request failed")
            )));
        }
        Ok(response)
    }
}

impl ProcessSupervisor for SupervisorClient {
    fn create<'a>(&'a self, spec: &'a ProcessSpec) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            self.request(SupervisorRequest::Create { spec: spec.clone() })
                .await?;
            Ok(())
        })
    }

    fn inspect<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<ProcessStatus>> {
        Box::pin(async move {
            let response = self
                .request(SupervisorRequest::Inspect { id: id.to_string() })
                .await?;
            let state = response.status.ok_or_else(|| {
                ExecutorError::SupervisorError(format!("inspect {id}: response has no status"))
            })?;
            Ok(ProcessStatus {
                state,
                message: response.message,
            })
        })
    }

    fn stop<'a>(&'a self, id: &'a str, timeout_secs: u64) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            self.request(SupervisorRequest::Stop {
                id: id.to_string(),
                timeout_secs,
            })
            .await?;
            Ok(())
        })
    }

    fn delete<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            self.request(SupervisorRequest::Delete { id: id.to_string() })
                .await?;
            Ok(())
        })
    }

    fn reload<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            self.request(SupervisorRequest::Reload { id: id.to_string() })
                .await?;
            Ok(())
        })
    }

    fn restart<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            self.request(SupervisorRequest::Restart { id: id.to_string() })
                .await?;
            Ok(())
        })
    }
}
