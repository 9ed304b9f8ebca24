// src/transport/connection.rs

//! HTTP connection to the agent's executor API.

use std::time::Duration;

use prost::Message;
use reqwest::header::{ACCEPT, CONNECTION, CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::{Client, Response, StatusCode};
use tracing::{debug, trace};

use crate::config::AgentIdentity;
use crate::errors::{ExecutorError, Result};
use crate::protocol::Call;

/// How long to wait for the TCP/TLS handshake.
pub const DIAL_TIMEOUT: Duration = Duration::from_secs(5);
/// How long to wait for response headers once the request is written.
pub const RESPONSE_HEADER_TIMEOUT: Duration = Duration::from_secs(5);
/// Idle keep-alive before a pooled connection is dropped.
pub const KEEP_ALIVE_TIMEOUT: Duration = Duration::from_secs(30);

pub const CONTENT_TYPE_PROTOBUF: &str = "application/x-protobuf";
pub const CONTENT_TYPE_JSON: &str = "application/json";

/// Sends protobuf-encoded `Call`s to the agent.
///
/// There is no retry here; callers decide what a failure means (the driver
/// resubscribes, status updates are best-effort).
#[derive(Debug, Clone)]
pub struct Connection {
    client: Client,
    url: String,
}

impl Connection {
    pub fn new(identity: &AgentIdentity) -> Result<Self> {
        Self::with_url(identity.executor_api_url())
    }

    pub fn with_url(url: impl Into<String>) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(CONTENT_TYPE_PROTOBUF));
        headers.insert(ACCEPT, HeaderValue::from_static(CONTENT_TYPE_JSON));
        headers.insert(CONNECTION, HeaderValue::from_static("keep-alive"));

        let client = Client::builder()
            .default_headers(headers)
            .connect_timeout(DIAL_TIMEOUT)
            .pool_idle_timeout(KEEP_ALIVE_TIMEOUT)
            .tcp_keepalive(KEEP_ALIVE_TIMEOUT)
            .user_agent(format!("mesos-executor/{}", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// POST `call` to the agent.
    ///
    /// With `keep_stream_open` the successful response is handed back with its
    /// body unread so the caller can stream events from it. Otherwise the body
    /// is dropped and `Ok(None)` is returned.
    pub async fn send(&self, call: &Call, keep_stream_open: bool) -> Result<Option<Response>> {
        let body = call.encode_to_vec();
        trace!(
            call_type = ?call.call_type(),
            bytes = body.len(),
            url = %self.url,
            "sending call"
        );

        let request = self.client.post(&self.url).body(body).send();
        let response = tokio::time::timeout(RESPONSE_HEADER_TIMEOUT, request)
            .await
            .map_err(|_| {
                ExecutorError::Timeout(format!(
                    "no response headers from {} within {:?}",
                    self.url, RESPONSE_HEADER_TIMEOUT
                ))
            })??;

        let status = response.status();
        if status != StatusCode::OK && status != StatusCode::ACCEPTED {
            let body = response.text().await.unwrap_or_default();
            return Err(ExecutorError::UnexpectedStatus {
                status: status.as_u16(),
                body,
            });
        }

        debug!(call_type = ?call.call_type(), %status, "call accepted");

        if keep_stream_open {
            Ok(Some(response))
        } else {
            Ok(None)
        }
    }
}
