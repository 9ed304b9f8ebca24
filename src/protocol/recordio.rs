// src/protocol/recordio.rs

//! RecordIO framing used by the subscribe stream: `<length>\n<bytes>`.

use crate::errors::{ExecutorError, Result};

/// Records above this size are treated as a broken stream.
pub const MAX_RECORD_SIZE: usize = 16 * 1024 * 1024;

/// Incremental decoder. Feed it body chunks as they arrive and pull complete
/// records out.
#[derive(Debug, Default)]
pub struct RecordIoDecoder {
    buffer: Vec<u8>,
}

impl RecordIoDecoder {
    pub fn new() -> Self {
        Self { buffer: Vec::new() }
    }

    pub fn push(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);
    }

    /// Bytes received but not yet returned as part of a record.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Return the next complete record, `Ok(None)` if more bytes are needed.
    pub fn next_record(&mut self) -> Result<Option<Vec<u8>>> {
        let Some(newline) = self.buffer.iter().position(|b| *b == b'\n') else {
            if self.buffer.len() > 20 {
                return Err(ExecutorError::DecodeError(
                    "record length header is too long".to_string(),
                ));
            }
            return Ok(None);
        };

        let header = std::str::from_utf8(&self.buffer[..newline])
            .map_err(|_| ExecutorError::DecodeError("record length is not UTF-8".to_string()))?;
        let length: usize = header.trim().parse().map_err(|_| {
            ExecutorError::DecodeError(format!("invalid record length: {header:?}"))
        })?;

        if length > MAX_RECORD_SIZE {
            return Err(ExecutorError::DecodeError(format!(
                "record of {length} bytes exceeds limit of {MAX_RECORD_SIZE}"
            )));
        }

        let start = newline + 1;
        if self.buffer.len() < start + length {
            return Ok(None);
        }

        let record = self.buffer[start..start + length].to_vec();
        self.buffer.drain(..start + length);
        Ok(Some(record))
    }
}

/// Frame a single record. Used by tests and fake agents.
pub fn encode_record(payload: &[u8]) -> Vec<u8> {
    let mut out = format!("{}\n", payload.len()).into_bytes();
    out.extend_from_slice(payload);
    out
}
