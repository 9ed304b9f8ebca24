// src/protocol/call.rs

//! Outbound `Call` messages, encoded as protobuf.
//!
//! Only the subset of the executor API this executor sends is modelled. Tags
//! and enum values follow the agent's `executor.proto`/`mesos.proto`.

use prost::{Enumeration, Message};
use serde::{Deserialize, Serialize};

use crate::types::TaskState;

/// `{ value: string }` wrapper used for every id in the protocol
/// (task, agent, framework, executor).
#[derive(Clone, PartialEq, Eq, Hash, Message, Serialize, Deserialize)]
pub struct IdValue {
    #[prost(string, required, tag = "1")]
    pub value: String,
}

impl IdValue {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Enumeration)]
#[repr(i32)]
pub enum CallType {
    Unknown = 0,
    Subscribe = 1,
    Update = 2,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Enumeration)]
#[repr(i32)]
pub enum WireTaskState {
    TaskStarting = 0,
    TaskRunning = 1,
    TaskFinished = 2,
    TaskFailed = 3,
    TaskKilled = 4,
    TaskLost = 5,
    TaskStaging = 6,
    TaskError = 7,
    TaskKilling = 8,
}

impl From<TaskState> for WireTaskState {
    fn from(state: TaskState) -> Self {
        match state {
            TaskState::Staging => WireTaskState::TaskStaging,
            TaskState::Starting => WireTaskState::TaskStarting,
            TaskState::Running => WireTaskState::TaskRunning,
            TaskState::Killing => WireTaskState::TaskKilling,
            TaskState::Finished => WireTaskState::TaskFinished,
            TaskState::Failed => WireTaskState::TaskFailed,
            TaskState::Error => WireTaskState::TaskError,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Enumeration)]
#[repr(i32)]
pub enum StatusSource {
    SourceMaster = 0,
    SourceSlave = 1,
    SourceExecutor = 2,
}

/// A task status update as sent to the agent.
#[derive(Clone, PartialEq, Message)]
pub struct TaskStatus {
    #[prost(message, optional, tag = "1")]
    pub task_id: Option<IdValue>,
    #[prost(enumeration = "WireTaskState", required, tag = "2")]
    pub state: i32,
    #[prost(string, optional, tag = "4")]
    pub message: Option<String>,
    #[prost(message, optional, tag = "5")]
    pub agent_id: Option<IdValue>,
    #[prost(double, optional, tag = "6")]
    pub timestamp: Option<f64>,
    #[prost(message, optional, tag = "7")]
    pub executor_id: Option<IdValue>,
    #[prost(enumeration = "StatusSource", optional, tag = "9")]
    pub source: Option<i32>,
    #[prost(bytes = "vec", optional, tag = "11")]
    pub uuid: Option<Vec<u8>>,
}

impl TaskStatus {
    /// Build an executor-sourced status for `task_id`.
    pub fn new(task_id: &str, state: TaskState, message: Option<String>) -> Self {
        Self {
            task_id: Some(IdValue::new(task_id)),
            state: WireTaskState::from(state) as i32,
            message,
            source: Some(StatusSource::SourceExecutor as i32),
            ..Default::default()
        }
    }

    pub fn task_id_value(&self) -> &str {
        self.task_id.as_ref().map(|id| id.value.as_str()).unwrap_or("")
    }

    /// The lifecycle state carried, if it is one this executor emits.
    pub fn task_state(&self) -> Option<TaskState> {
        match WireTaskState::try_from(self.state).ok()? {
            WireTaskState::TaskStaging => Some(TaskState::Staging),
            WireTaskState::TaskStarting => Some(TaskState::Starting),
            WireTaskState::TaskRunning => Some(TaskState::Running),
            WireTaskState::TaskKilling => Some(TaskState::Killing),
            WireTaskState::TaskFinished => Some(TaskState::Finished),
            WireTaskState::TaskFailed => Some(TaskState::Failed),
            WireTaskState::TaskError => Some(TaskState::Error),
            WireTaskState::TaskKilled | WireTaskState::TaskLost => None,
        }
    }
}

#[derive(Clone, PartialEq, Message)]
pub struct Update {
    #[prost(message, optional, tag = "1")]
    pub status: Option<TaskStatus>,
}

#[derive(Clone, PartialEq, Message)]
pub struct Subscribe {
    #[prost(message, repeated, tag = "2")]
    pub unacknowledged_updates: Vec<Update>,
}

/// Top-level request body.
#[derive(Clone, PartialEq, Message)]
pub struct Call {
    #[prost(message, optional, tag = "1")]
    pub executor_id: Option<IdValue>,
    #[prost(message, optional, tag = "2")]
    pub framework_id: Option<IdValue>,
    #[prost(enumeration = "CallType", optional, tag = "3")]
    pub r#type: Option<i32>,
    #[prost(message, optional, tag = "4")]
    pub subscribe: Option<Subscribe>,
    #[prost(message, optional, tag = "5")]
    pub update: Option<Update>,
}

impl Call {
    pub fn subscribe(
        executor_id: &str,
        framework_id: &str,
        unacknowledged_updates: Vec<TaskStatus>,
    ) -> Self {
        Self {
            executor_id: Some(IdValue::new(executor_id)),
            framework_id: Some(IdValue::new(framework_id)),
            r#type: Some(CallType::Subscribe as i32),
            subscribe: Some(Subscribe {
                unacknowledged_updates: unacknowledged_updates
                    .into_iter()
                    .map(|status| Update {
                        status: Some(status),
                    })
                    .collect(),
            }),
            update: None,
        }
    }

    pub fn update(executor_id: &str, framework_id: &str, status: TaskStatus) -> Self {
        Self {
            executor_id: Some(IdValue::new(executor_id)),
            framework_id: Some(IdValue::new(framework_id)),
            r#type: Some(CallType::Update as i32),
            subscribe: None,
            update: Some(Update {
                status: Some(status),
            }),
        }
    }

    pub fn call_type(&self) -> CallType {
        self.r#type
            .and_then(|t| CallType::try_from(t).ok())
            .unwrap_or(CallType::Unknown)
    }
}
