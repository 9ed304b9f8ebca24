// src/executor/lifecycle.rs

//! Inspection and shutdown loops.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::time::{Instant, MissedTickBehavior, interval, interval_at};
use tracing::{debug, info, warn};

use super::Executor;
use crate::types::{ExecutorStatus, TaskState, task_state_from_process};

impl Executor {
    /// Move `task_id` towards `observed`. Returns `(previous, current)` when
    /// the task exists; `current == previous` means nothing changed.
    pub(crate) fn transition(
        &self,
        task_id: &str,
        observed: TaskState,
    ) -> Option<(TaskState, TaskState)> {
        let mut state = self.state();
        let task = state.tasks.iter_mut().find(|t| t.id == task_id)?;
        let previous = task.state;
        task.state = previous.advance(observed);
        Some((previous, task.state))
    }

    /// Poll every task while the executor is `Running`, reporting
    /// transitions and refreshing the agent's view every
    /// `refresh_every_ticks` ticks. Hands over to shutdown once any task has
    /// finished or failed.
    pub(crate) async fn inspection_loop(self: Arc<Self>) {
        let period = self.options.inspect_interval;
        let refresh_every = self.options.refresh_every_ticks.max(1);
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut ticks: u64 = 0;

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    debug!("inspection loop cancelled");
                    return;
                }
                _ = ticker.tick() => {}
            }

            ticks += 1;
            let refresh = ticks % refresh_every == 0;
            let mut ended = false;

            for task in self.tasks() {
                if self.status() != ExecutorStatus::Running {
                    debug!("executor no longer running; inspection loop exits");
                    return;
                }

                let process = match self.supervisor.inspect(&task.id).await {
                    Ok(process) => process,
                    Err(err) => {
                        warn!(task_id = %task.id, error = %err, "failed to inspect task process");
                        continue;
                    }
                };

                let observed = task_state_from_process(process.state, self.asked_shutdown());
                let Some((previous, current)) = self.transition(&task.id, observed) else {
                    continue;
                };

                if current != previous {
                    info!(task_id = %task.id, from = %previous, to = %current, "task state changed");
                    self.report(&task.id, current, process.message).await;
                } else if refresh {
                    self.report(&task.id, current, process.message).await;
                }

                if matches!(current, TaskState::Finished | TaskState::Failed) {
                    ended = true;
                }
            }

            if ended {
                info!("a task has ended; shutting down executor");
                self.shutdown_in_background();
                return;
            }
        }
    }

    /// Stop and delete every process, wait for the final updates to be
    /// acknowledged and move to `Finish`. Only the first caller does any
    /// work.
    pub async fn run_shutdown(&self) {
        {
            let mut state = self.state();
            if state.status.is_shutting_down() {
                debug!(status = %state.status, "shutdown already in progress");
                return;
            }
            state.status = ExecutorStatus::Shutdown;
        }
        info!("executor shutting down");

        let deadline = self.options.grace_period.map(|grace| Instant::now() + grace);
        let mut ticker = interval(self.options.shutdown_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut down: HashSet<String> = HashSet::new();
        let mut stop_sent: HashSet<String> = HashSet::new();

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    debug!("shutdown loop cancelled");
                    return;
                }
                _ = ticker.tick() => {}
            }

            let tasks = self.tasks();
            for task in &tasks {
                if down.contains(&task.id) {
                    continue;
                }
                if task.creating {
                    debug!(task_id = %task.id, "waiting for in-flight create");
                    continue;
                }
                if !task.created {
                    self.settle(&task.id).await;
                    down.insert(task.id.clone());
                    continue;
                }

                let process = match self.supervisor.inspect(&task.id).await {
                    Ok(process) => process,
                    Err(err) => {
                        warn!(task_id = %task.id, error = %err, "failed to inspect task during shutdown");
                        continue;
                    }
                };

                let observed = task_state_from_process(process.state, self.asked_shutdown());
                if let Some((previous, current)) = self.transition(&task.id, observed) {
                    if current != previous {
                        info!(task_id = %task.id, from = %previous, to = %current, "task state changed");
                        self.report(&task.id, current, process.message).await;
                    }
                }

                match observed {
                    TaskState::Starting | TaskState::Running => {
                        if stop_sent.contains(&task.id) {
                            continue;
                        }
                        match self.supervisor.stop(&task.id, task.spec.stop_timeout).await {
                            Ok(()) => {
                                debug!(task_id = %task.id, timeout_secs = task.spec.stop_timeout, "stop requested");
                                stop_sent.insert(task.id.clone());
                            }
                            Err(err) => {
                                warn!(task_id = %task.id, error = %err, "failed to stop task process")
                            }
                        }
                    }
                    TaskState::Killing => {
                        debug!(task_id = %task.id, "waiting for task process to stop");
                    }
                    _ => {
                        if let Err(err) = self.supervisor.delete(&task.id).await {
                            warn!(task_id = %task.id, error = %err, "failed to delete task process");
                        }
                        self.settle(&task.id).await;
                        down.insert(task.id.clone());
                    }
                }
            }

            if down.len() >= tasks.len() {
                info!(tasks = tasks.len(), "all task processes are down");
                break;
            }

            if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                let stragglers: Vec<&str> = tasks
                    .iter()
                    .filter(|t| !down.contains(&t.id))
                    .map(|t| t.id.as_str())
                    .collect();
                warn!(?stragglers, "shutdown grace period expired");
                break;
            }
        }

        if !self.pending.wait_drained(self.options.ack_wait).await {
            warn!(
                unacknowledged = self.pending.len(),
                "finishing without acknowledgement of every status update"
            );
        }

        self.state().status = ExecutorStatus::Finish;
        info!("executor finished");
    }

    /// A task is down; make sure the agent has seen a terminal state for it.
    async fn settle(&self, task_id: &str) {
        let terminal = if self.asked_shutdown() {
            TaskState::Finished
        } else {
            TaskState::Failed
        };
        if let Some((previous, current)) = self.transition(task_id, terminal) {
            if current != previous {
                info!(task_id, from = %previous, to = %current, "task state changed");
                self.report(task_id, current, None).await;
            }
        }
    }
}
