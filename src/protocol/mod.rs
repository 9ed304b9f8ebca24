// src/protocol/mod.rs

//! The agent's executor HTTP API.
//!
//! - [`call`]: protobuf-encoded requests (`SUBSCRIBE`, `UPDATE`).
//! - [`event`]: JSON events read from the subscribe stream.
//! - [`recordio`]: the length-prefixed framing of that stream.

pub mod call;
pub mod event;
pub mod recordio;

pub use call::{Call, CallType, IdValue, TaskStatus, WireTaskState};
pub use event::{Acknowledged, Event, EventType, TaskInfo};
pub use recordio::RecordIoDecoder;
