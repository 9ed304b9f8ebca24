use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};

use mesos_executor::errors::{ExecutorError, Result};
use mesos_executor::executor::{Executor, StatusReporter};
use mesos_executor::protocol::TaskStatus;
use mesos_executor::types::{BoxFuture, TaskState};

/// Status reporter that keeps every update it is handed.
///
/// With [`RecordingReporter::acknowledge_for`] it also plays the agent and
/// acknowledges each update right away.
#[derive(Debug, Default)]
pub struct RecordingReporter {
    updates: Mutex<Vec<TaskStatus>>,
    acknowledger: Mutex<Option<Weak<Executor>>>,
    failing: AtomicBool,
}

impl RecordingReporter {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn acknowledge_for(&self, executor: &Arc<Executor>) {
        *self.acknowledger.lock().unwrap() = Some(Arc::downgrade(executor));
    }

    /// Make every subsequent send fail, as if the agent were unreachable.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn updates(&self) -> Vec<TaskStatus> {
        self.updates.lock().unwrap().clone()
    }

    /// States reported for `task_id`, in order.
    pub fn states_for(&self, task_id: &str) -> Vec<TaskState> {
        self.updates
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.task_id_value() == task_id)
            .filter_map(|s| s.task_state())
            .collect()
    }

    /// Same as `states_for`, with consecutive repeats collapsed.
    pub fn transitions_for(&self, task_id: &str) -> Vec<TaskState> {
        let mut states = self.states_for(task_id);
        states.dedup();
        states
    }
}

impl StatusReporter for RecordingReporter {
    fn update_task_status(&self, status: TaskStatus) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            self.updates.lock().unwrap().push(status.clone());

            if self.failing.load(Ordering::SeqCst) {
                return Err(ExecutorError::Timeout("agent unreachable".into()));
            }

            let executor = self
                .acknowledger
                .lock()
                .unwrap()
                .as_ref()
                .and_then(Weak::upgrade);
            if let (Some(executor), Some(token)) = (executor, status.uuid.as_deref()) {
                executor.acknowledge(status.task_id_value(), token);
            }
            Ok(())
        })
    }
}
