//! Minimal stand-in for the agent's executor API.
//!
//! Speaks just enough HTTP/1.1 for the driver: every request body is a
//! protobuf `Call`. `SUBSCRIBE` gets a chunked 200 whose connection is handed
//! to the test as a [`Subscriber`]; everything else gets an empty 202.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use prost::Message;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

use mesos_executor::protocol::recordio::encode_record;
use mesos_executor::protocol::{Call, CallType};

pub struct FakeAgent {
    endpoint: String,
    calls: Arc<Mutex<Vec<Call>>>,
    subscribers: mpsc::UnboundedReceiver<Subscriber>,
}

impl FakeAgent {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let endpoint = listener.local_addr().unwrap().to_string();
        let calls = Arc::new(Mutex::new(Vec::new()));
        let (tx, subscribers) = mpsc::unbounded_channel();

        let accepted_calls = Arc::clone(&calls);
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                tokio::spawn(handle(stream, Arc::clone(&accepted_calls), tx.clone()));
            }
        });

        Self {
            endpoint,
            calls,
            subscribers,
        }
    }

    /// `host:port` to put in `MESOS_AGENT_ENDPOINT`.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_of(&self, kind: CallType) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| c.call_type() == kind)
            .collect()
    }

    /// The next subscribe stream the driver opened.
    pub async fn next_subscriber(&mut self) -> Subscriber {
        tokio::time::timeout(Duration::from_secs(5), self.subscribers.recv())
            .await
            .expect("driver did not subscribe in time")
            .expect("agent stopped")
    }
}

async fn handle(
    mut stream: TcpStream,
    calls: Arc<Mutex<Vec<Call>>>,
    subscribers: mpsc::UnboundedSender<Subscriber>,
) {
    loop {
        let Some(call) = read_call(&mut stream).await else {
            return;
        };
        let kind = call.call_type();
        calls.lock().unwrap().push(call);

        if kind == CallType::Subscribe {
            let head = "HTTP/1.1 200 OK\r\n\
                        Content-Type: application/json\r\n\
                        Transfer-Encoding: chunked\r\n\r\n";
            if stream.write_all(head.as_bytes()).await.is_err() {
                return;
            }
            let _ = subscribers.send(Subscriber { stream });
            return;
        }

        let head = "HTTP/1.1 202 Accepted\r\nContent-Length: 0\r\n\r\n";
        if stream.write_all(head.as_bytes()).await.is_err() {
            return;
        }
    }
}

async fn read_call(stream: &mut TcpStream) -> Option<Call> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    let header_end = loop {
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
        let n = stream.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_lowercase();
    let length: usize = head
        .lines()
        .find_map(|line| line.strip_prefix("content-length:"))
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(0);

    while buf.len() < header_end + length {
        let n = stream.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
    }

    Call::decode(&buf[header_end..header_end + length]).ok()
}

/// The agent end of an open subscribe stream.
pub struct Subscriber {
    stream: TcpStream,
}

impl Subscriber {
    /// Send one JSON event as a RecordIO record in its own chunk.
    pub async fn send(&mut self, event: &str) {
        let record = encode_record(event.as_bytes());
        let mut chunk = format!("{:x}\r\n", record.len()).into_bytes();
        chunk.extend_from_slice(&record);
        chunk.extend_from_slice(b"\r\n");
        self.stream.write_all(&chunk).await.unwrap();
        self.stream.flush().await.unwrap();
    }

    pub async fn subscribed(&mut self, agent_id: &str) {
        self.send(&format!(
            r#"{{"type":"SUBSCRIBED","subscribed":{{"agent_info":{{"id":{{"value":"{agent_id}"}},"hostname":"localhost"}}}}}}"#
        ))
        .await;
    }

    /// End the stream as an agent going away would.
    pub async fn close(mut self) {
        let _ = self.stream.write_all(b"0\r\n\r\n").await;
        let _ = self.stream.shutdown().await;
    }
}
