// src/transport/stream.rs

use reqwest::Response;

use crate::errors::{ExecutorError, Result};
use crate::protocol::{Event, RecordIoDecoder};

/// The open body of a subscribe call, yielding one event per record.
#[derive(Debug)]
pub struct EventStream {
    response: Response,
    decoder: RecordIoDecoder,
}

impl EventStream {
    pub fn new(response: Response) -> Self {
        Self {
            response,
            decoder: RecordIoDecoder::new(),
        }
    }

    /// Read until the next complete event. Any read or decode failure, and
    /// the agent closing the body, means the stream is broken.
    pub async fn next_event(&mut self) -> Result<Event> {
        loop {
            if let Some(record) = self.decoder.next_record()? {
                return Event::from_json(&record);
            }

            match self.response.chunk().await? {
                Some(chunk) => self.decoder.push(&chunk),
                None => {
                    return Err(ExecutorError::DecodeError(
                        "event stream closed by agent".to_string(),
                    ));
                }
            }
        }
    }
}
