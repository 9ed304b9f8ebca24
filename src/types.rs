use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Boxed future returned by the collaborator traits (`ProcessSupervisor`,
/// `StatusReporter`), so they stay object safe.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Process-wide executor lifecycle.
///
/// `Unknown -> Launching -> Running -> Shutdown -> Finish`. A failed launch
/// goes straight from `Launching` to `Shutdown`; an agent `SHUTDOWN` may
/// arrive in any state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ExecutorStatus {
    Unknown,
    Launching,
    Running,
    Shutdown,
    Finish,
}

impl ExecutorStatus {
    /// Shutdown has started (or completed).
    pub fn is_shutting_down(self) -> bool {
        matches!(self, ExecutorStatus::Shutdown | ExecutorStatus::Finish)
    }
}

impl fmt::Display for ExecutorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExecutorStatus::Unknown => "unknown",
            ExecutorStatus::Launching => "launching",
            ExecutorStatus::Running => "running",
            ExecutorStatus::Shutdown => "shutdown",
            ExecutorStatus::Finish => "finish",
        };
        f.write_str(s)
    }
}

/// Status of a managed process as reported by the process supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessState {
    Staging,
    Starting,
    Running,
    Stopping,
    Stopped,
}

impl FromStr for ProcessState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "staging" => Ok(ProcessState::Staging),
            "starting" => Ok(ProcessState::Starting),
            "running" => Ok(ProcessState::Running),
            "stopping" => Ok(ProcessState::Stopping),
            "stopped" => Ok(ProcessState::Stopped),
            other => Err(format!("invalid process state: {other}")),
        }
    }
}

/// Orchestrator-facing state of a single task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    Staging,
    Starting,
    Running,
    Killing,
    Finished,
    Failed,
    Error,
}

impl TaskState {
    /// The task will not make further progress.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskState::Finished | TaskState::Failed | TaskState::Error
        )
    }

    /// Position in the lifecycle walk; all terminal states share the last rank.
    pub fn rank(self) -> u8 {
        match self {
            TaskState::Staging => 0,
            TaskState::Starting => 1,
            TaskState::Running => 2,
            TaskState::Killing => 3,
            TaskState::Finished | TaskState::Failed | TaskState::Error => 4,
        }
    }

    /// Move to `next` unless that would walk the lifecycle backwards. A
    /// terminal state is never left.
    pub fn advance(self, next: TaskState) -> TaskState {
        if self.is_terminal() || next.rank() < self.rank() {
            self
        } else {
            next
        }
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskState::Staging => "staging",
            TaskState::Starting => "starting",
            TaskState::Running => "running",
            TaskState::Killing => "killing",
            TaskState::Finished => "finished",
            TaskState::Failed => "failed",
            TaskState::Error => "error",
        };
        f.write_str(s)
    }
}

/// Map a supervisor process state onto the task lifecycle.
///
/// A stopped process only counts as `Finished` when the executor was asked to
/// shut down; otherwise it died on its own and the task `Failed`.
pub fn task_state_from_process(state: ProcessState, asked_shutdown: bool) -> TaskState {
    match state {
        ProcessState::Staging => TaskState::Staging,
        ProcessState::Starting => TaskState::Starting,
        ProcessState::Running => TaskState::Running,
        ProcessState::Stopping => TaskState::Killing,
        ProcessState::Stopped if asked_shutdown => TaskState::Finished,
        ProcessState::Stopped => TaskState::Failed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mapping_table_covers_every_supervisor_state() {
        let cases = [
            (ProcessState::Staging, false, TaskState::Staging),
            (ProcessState::Staging, true, TaskState::Staging),
            (ProcessState::Starting, false, TaskState::Starting),
            (ProcessState::Starting, true, TaskState::Starting),
            (ProcessState::Running, false, TaskState::Running),
            (ProcessState::Running, true, TaskState::Running),
            (ProcessState::Stopping, false, TaskState::Killing),
            (ProcessState::Stopping, true, TaskState::Killing),
            (ProcessState::Stopped, false, TaskState::Failed),
            (ProcessState::Stopped, true, TaskState::Finished),
        ];

        for (process, asked, expected) in cases {
            assert_eq!(
                task_state_from_process(process, asked),
                expected,
                "{process:?} (asked_shutdown={asked})"
            );
        }
    }

    #[test]
    fn advance_never_walks_backwards() {
        assert_eq!(TaskState::Running.advance(TaskState::Starting), TaskState::Running);
        assert_eq!(TaskState::Running.advance(TaskState::Killing), TaskState::Killing);
        assert_eq!(TaskState::Killing.advance(TaskState::Finished), TaskState::Finished);
        assert_eq!(TaskState::Failed.advance(TaskState::Finished), TaskState::Failed);
        assert_eq!(TaskState::Staging.advance(TaskState::Staging), TaskState::Staging);
    }

    #[test]
    fn process_state_parses_case_insensitively() {
        assert_eq!("Running".parse::<ProcessState>(), Ok(ProcessState::Running));
        assert_eq!(" stopped ".parse::<ProcessState>(), Ok(ProcessState::Stopped));
        assert!("exploded".parse::<ProcessState>().is_err());
    }

    #[test]
    fn executor_status_orders_shutdown_before_finish() {
        assert!(ExecutorStatus::Shutdown < ExecutorStatus::Finish);
        assert!(ExecutorStatus::Shutdown.is_shutting_down());
        assert!(!ExecutorStatus::Running.is_shutting_down());
    }
}
