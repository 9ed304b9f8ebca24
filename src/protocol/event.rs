// src/protocol/event.rs

//! Inbound events, decoded from the JSON records of the subscribe stream.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

use crate::errors::{ExecutorError, Result};
use crate::protocol::call::IdValue;

/// Event kinds this executor understands. Anything else decodes to `Unknown`
/// and is dropped by the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    Subscribed,
    LaunchGroup,
    Shutdown,
    Acknowledged,
    #[default]
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Event {
    #[serde(rename = "type", default)]
    pub kind: EventType,

    #[serde(default)]
    pub subscribed: Option<Subscribed>,

    #[serde(default)]
    pub launch_group: Option<LaunchGroup>,

    #[serde(default)]
    pub acknowledged: Option<Acknowledged>,
}

impl Event {
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes)
            .map_err(|e| ExecutorError::DecodeError(format!("invalid event record: {e}")))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Subscribed {
    #[serde(default)]
    pub agent_info: Option<AgentInfo>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AgentInfo {
    #[serde(default)]
    pub id: Option<IdValue>,
    #[serde(default)]
    pub hostname: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LaunchGroup {
    pub task_group: TaskGroupInfo,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskGroupInfo {
    #[serde(default)]
    pub tasks: Vec<TaskInfo>,
}

/// Task descriptor as handed over by the scheduler.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskInfo {
    #[serde(default)]
    pub name: String,
    pub task_id: IdValue,
    #[serde(default)]
    pub resources: Vec<Resource>,
    #[serde(default)]
    pub command: Option<CommandInfo>,
    /// Base64 of the JSON task data blob.
    #[serde(default)]
    pub data: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Resource {
    pub name: String,
    #[serde(default)]
    pub scalar: Option<Scalar>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Scalar {
    pub value: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommandInfo {
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub arguments: Vec<String>,
    #[serde(default)]
    pub environment: Option<Environment>,
    #[serde(default)]
    pub uris: Vec<CommandUri>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Environment {
    #[serde(default)]
    pub variables: Vec<Variable>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Variable {
    pub name: String,
    #[serde(default)]
    pub value: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommandUri {
    pub value: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Acknowledged {
    pub task_id: IdValue,
    /// Base64 of the correlation token we attached to the update.
    pub uuid: String,
}

impl Acknowledged {
    pub fn token(&self) -> Result<Vec<u8>> {
        STANDARD
            .decode(self.uuid.trim())
            .map_err(|e| ExecutorError::DecodeError(format!("invalid acknowledgement uuid: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_launch_group() {
        let json = br#"{
            "type": "LAUNCH_GROUP",
            "launch_group": {
                "task_group": {
                    "tasks": [{
                        "name": "web",
                        "task_id": {"value": "web.1"},
                        "resources": [{"name": "cpus", "type": "SCALAR", "scalar": {"value": 0.5}}],
                        "command": {"value": "./serve"}
                    }]
                }
            }
        }"#;

        let event = Event::from_json(json).unwrap();
        assert_eq!(event.kind, EventType::LaunchGroup);
        let tasks = event.launch_group.unwrap().task_group.tasks;
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].task_id.value, "web.1");
        assert_eq!(tasks[0].resources[0].scalar.unwrap().value, 0.5);
    }

    #[test]
    fn decodes_acknowledgement_token() {
        let json = br#"{"type":"ACKNOWLEDGED","acknowledged":{"task_id":{"value":"t"},"uuid":"AQIDBA=="}}"#;
        let event = Event::from_json(json).unwrap();
        let ack = event.acknowledged.unwrap();
        assert_eq!(ack.task_id.value, "t");
        assert_eq!(ack.token().unwrap(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn unrecognised_type_is_unknown_not_an_error() {
        let event = Event::from_json(br#"{"type":"HEARTBEAT"}"#).unwrap();
        assert_eq!(event.kind, EventType::Unknown);
    }

    #[test]
    fn garbage_is_a_decode_error() {
        assert!(matches!(
            Event::from_json(b"{not json"),
            Err(ExecutorError::DecodeError(_))
        ));
    }
}
