// src/executor/pending.rs

//! Bookkeeping of status updates the agent has not acknowledged yet.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::{debug, trace};

use crate::protocol::TaskStatus;

/// At most one unacknowledged update per task; a newer update replaces the
/// older one. Waiters are woken when the map becomes empty.
#[derive(Debug, Default)]
pub struct PendingUpdates {
    updates: Mutex<HashMap<String, TaskStatus>>,
    drained: Notify,
}

impl PendingUpdates {
    pub fn new() -> Self {
        Self::default()
    }

    fn updates(&self) -> MutexGuard<'_, HashMap<String, TaskStatus>> {
        self.updates.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn record(&self, task_id: &str, status: TaskStatus) {
        if self.updates().insert(task_id.to_string(), status).is_some() {
            trace!(task_id, "replaced unacknowledged update");
        }
    }

    /// Clear the pending update for `task_id` if `token` is exactly the one
    /// it carries. Returns whether an entry was removed.
    pub fn acknowledge(&self, task_id: &str, token: &[u8]) -> bool {
        let mut updates = self.updates();
        let matches = updates
            .get(task_id)
            .and_then(|status| status.uuid.as_deref())
            .is_some_and(|pending| pending == token);

        if !matches {
            debug!(task_id, "ignoring acknowledgement for unknown or stale update");
            return false;
        }

        updates.remove(task_id);
        if updates.is_empty() {
            self.drained.notify_waiters();
        }
        true
    }

    pub fn len(&self) -> usize {
        self.updates().len()
    }

    pub fn is_empty(&self) -> bool {
        self.updates().is_empty()
    }

    pub fn contains(&self, task_id: &str) -> bool {
        self.updates().contains_key(task_id)
    }

    /// Copy of every unacknowledged update.
    pub fn snapshot(&self) -> Vec<TaskStatus> {
        self.updates().values().cloned().collect()
    }

    /// Wait until every update has been acknowledged, at most `timeout`.
    /// Returns `true` if the map drained in time.
    pub async fn wait_drained(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            let notified = self.drained.notified();
            tokio::pin!(notified);
            // Register before checking so a drain in between is not missed.
            notified.as_mut().enable();

            if self.is_empty() {
                return true;
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return self.is_empty();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::types::TaskState;

    fn status_with_token(task_id: &str, token: &[u8]) -> TaskStatus {
        let mut status = TaskStatus::new(task_id, TaskState::Running, None);
        status.uuid = Some(token.to_vec());
        status
    }

    #[test]
    fn exact_token_clears_and_mismatch_does_not() {
        let pending = PendingUpdates::new();
        pending.record("t1", status_with_token("t1", b"aaaa"));

        assert!(!pending.acknowledge("t1", b"bbbb"));
        assert!(pending.contains("t1"));

        assert!(!pending.acknowledge("other", b"aaaa"));
        assert!(pending.acknowledge("t1", b"aaaa"));
        assert!(pending.is_empty());

        // Duplicate acknowledgement is harmless.
        assert!(!pending.acknowledge("t1", b"aaaa"));
    }

    #[test]
    fn newer_update_replaces_older_one() {
        let pending = PendingUpdates::new();
        pending.record("t1", status_with_token("t1", b"old"));
        pending.record("t1", status_with_token("t1", b"new"));

        assert_eq!(pending.len(), 1);
        assert!(!pending.acknowledge("t1", b"old"));
        assert!(pending.acknowledge("t1", b"new"));
    }

    #[tokio::test]
    async fn wait_returns_immediately_when_empty() {
        let pending = PendingUpdates::new();
        assert!(pending.wait_drained(Duration::from_millis(10)).await);
    }

    #[tokio::test]
    async fn wait_wakes_on_last_acknowledgement() {
        let pending = Arc::new(PendingUpdates::new());
        pending.record("t1", status_with_token("t1", b"tok"));

        let acker = Arc::clone(&pending);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            acker.acknowledge("t1", b"tok");
        });

        assert!(pending.wait_drained(Duration::from_secs(5)).await);
    }

    #[tokio::test]
    async fn wait_gives_up_after_timeout() {
        let pending = PendingUpdates::new();
        pending.record("t1", status_with_token("t1", b"tok"));
        assert!(!pending.wait_drained(Duration::from_millis(30)).await);
        assert_eq!(pending.len(), 1);
    }
}
