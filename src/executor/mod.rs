// src/executor/mod.rs

//! Task lifecycle state machine.
//!
//! The executor accepts exactly one task group, hands each task to the
//! process supervisor, polls the supervisor for process state, maps it onto
//! task state and reports every transition to the agent. When a task ends (or
//! the agent asks) it stops and deletes all processes, waits briefly for the
//! agent to acknowledge the final updates and then reaches `Finish`.
//!
//! - [`task`]: building a [`ProcessTask`] from a task descriptor.
//! - [`pending`]: unacknowledged-update bookkeeping and the ack barrier.
//! - [`lifecycle`]: the inspection and shutdown loops.

pub mod lifecycle;
pub mod pending;
pub mod task;

pub use pending::PendingUpdates;
pub use task::{ProcessTask, TaskData};

use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::{AgentIdentity, Settings};
use crate::errors::Result;
use crate::fs::FileSystem;
use crate::protocol::{TaskInfo, TaskStatus};
use crate::supervisor::ProcessSupervisor;
use crate::types::{BoxFuture, ExecutorStatus, TaskState};

/// Where status updates go. In production this is the driver's
/// `UpdateSender`; tests record them.
pub trait StatusReporter: Send + Sync {
    fn update_task_status(&self, status: TaskStatus) -> BoxFuture<'_, Result<()>>;
}

/// Timing and placement knobs for the executor.
#[derive(Debug, Clone)]
pub struct ExecutorOptions {
    pub sandbox: PathBuf,
    pub inspect_interval: Duration,
    pub refresh_every_ticks: u64,
    pub shutdown_interval: Duration,
    pub ack_wait: Duration,
    /// Bound on the shutdown loop, if any.
    pub grace_period: Option<Duration>,
}

impl ExecutorOptions {
    pub fn new(identity: &AgentIdentity, settings: &Settings) -> Self {
        let grace_period = (settings.enforce_grace_period
            && !identity.shutdown_grace_period.is_zero())
        .then_some(identity.shutdown_grace_period);

        Self {
            sandbox: identity.sandbox.clone(),
            inspect_interval: settings.inspect_interval,
            refresh_every_ticks: settings.refresh_every_ticks,
            shutdown_interval: settings.shutdown_interval,
            ack_wait: settings.ack_wait,
            grace_period,
        }
    }

    /// Defaults rooted at `sandbox`.
    pub fn with_sandbox(sandbox: impl Into<PathBuf>) -> Self {
        let settings = Settings::default();
        Self {
            sandbox: sandbox.into(),
            inspect_interval: settings.inspect_interval,
            refresh_every_ticks: settings.refresh_every_ticks,
            shutdown_interval: settings.shutdown_interval,
            ack_wait: settings.ack_wait,
            grace_period: None,
        }
    }
}

/// A task group recorded by [`Executor::accept_task_group`], waiting for its
/// processes to be created.
#[derive(Debug)]
pub struct LaunchPlan {
    tasks: Vec<ProcessTask>,
    invalid: Option<(String, String)>,
}

#[derive(Debug)]
struct ExecutorState {
    status: ExecutorStatus,
    asked_shutdown: bool,
    tasks: Vec<ProcessTask>,
}

pub struct Executor {
    supervisor: Arc<dyn ProcessSupervisor>,
    reporter: Arc<dyn StatusReporter>,
    fs: Arc<dyn FileSystem>,
    options: ExecutorOptions,
    state: Mutex<ExecutorState>,
    // Separate lock: acknowledgements arrive on the driver's receive loop
    // while reporting happens on the executor's loops.
    pending: PendingUpdates,
    cancel: CancellationToken,
}

impl std::fmt::Debug for Executor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Executor")
            .field("options", &self.options)
            .field("state", &self.state)
            .field("pending", &self.pending.len())
            .finish_non_exhaustive()
    }
}

impl Executor {
    pub fn new(
        supervisor: Arc<dyn ProcessSupervisor>,
        reporter: Arc<dyn StatusReporter>,
        fs: Arc<dyn FileSystem>,
        options: ExecutorOptions,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            supervisor,
            reporter,
            fs,
            options,
            state: Mutex::new(ExecutorState {
                status: ExecutorStatus::Unknown,
                asked_shutdown: false,
                tasks: Vec::new(),
            }),
            pending: PendingUpdates::new(),
            cancel,
        }
    }

    fn state(&self) -> MutexGuard<'_, ExecutorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn status(&self) -> ExecutorStatus {
        self.state().status
    }

    pub fn asked_shutdown(&self) -> bool {
        self.state().asked_shutdown
    }

    /// Copy of every tracked task.
    pub fn tasks(&self) -> Vec<ProcessTask> {
        self.state().tasks.clone()
    }

    pub fn task_state(&self, task_id: &str) -> Option<TaskState> {
        self.state()
            .tasks
            .iter()
            .find(|t| t.id == task_id)
            .map(|t| t.state)
    }

    pub fn pending(&self) -> &PendingUpdates {
        &self.pending
    }

    /// Updates the agent has not acknowledged; resent on resubscribe.
    pub fn unacknowledged_updates(&self) -> Vec<TaskStatus> {
        self.pending.snapshot()
    }

    fn set_task_state(&self, task_id: &str, state: TaskState) {
        if let Some(task) = self.state().tasks.iter_mut().find(|t| t.id == task_id) {
            task.state = state;
        }
    }

    /// Claim `task_id` for a `create` call. Refused once shutdown has begun,
    /// so the shutdown loop either sees the task in flight or never sees it
    /// launched at all.
    fn begin_create(&self, task_id: &str) -> bool {
        let mut state = self.state();
        if state.status.is_shutting_down() {
            return false;
        }
        match state.tasks.iter_mut().find(|t| t.id == task_id) {
            Some(task) => {
                task.creating = true;
                true
            }
            None => false,
        }
    }

    fn finish_create(&self, task_id: &str, created: bool) {
        if let Some(task) = self.state().tasks.iter_mut().find(|t| t.id == task_id) {
            task.creating = false;
            task.created = created;
        }
    }

    /// Accept the task group and start its processes. Only the first call
    /// while the executor is still `Unknown` has any effect.
    pub async fn launch_task_group(self: &Arc<Self>, infos: Vec<TaskInfo>) {
        if let Some(plan) = self.accept_task_group(infos) {
            self.start_task_group(plan).await;
        }
    }

    /// Record the task group and move to `Launching` without touching the
    /// supervisor. Returns `None` when the executor has already launched or
    /// is shutting down.
    pub fn accept_task_group(&self, infos: Vec<TaskInfo>) -> Option<LaunchPlan> {
        let sandbox = &self.options.sandbox;
        let mut tasks = Vec::with_capacity(infos.len());
        let mut invalid = None;
        for info in &infos {
            if invalid.is_some() {
                tasks.push(ProcessTask::unlaunchable(info, sandbox, TaskState::Staging));
                continue;
            }
            match ProcessTask::from_task_info(info, sandbox) {
                Ok(task) => tasks.push(task),
                Err(err) => {
                    error!(task_id = %info.task_id.value, error = %err, "invalid task specification");
                    tasks.push(ProcessTask::unlaunchable(info, sandbox, TaskState::Error));
                    invalid = Some((info.task_id.value.clone(), err.to_string()));
                }
            }
        }

        let mut state = self.state();
        if state.status != ExecutorStatus::Unknown {
            warn!(status = %state.status, "ignoring task group launch: executor already launched");
            return None;
        }
        state.status = ExecutorStatus::Launching;
        state.tasks = tasks.clone();
        info!(tasks = tasks.len(), "launching task group");

        Some(LaunchPlan { tasks, invalid })
    }

    /// Create the processes of an accepted group, then hand over to the
    /// inspection loop.
    pub async fn start_task_group(self: &Arc<Self>, plan: LaunchPlan) {
        if let Some((task_id, reason)) = plan.invalid {
            self.report(&task_id, TaskState::Error, Some(reason)).await;
            self.shutdown_in_background();
            return;
        }

        for task in &plan.tasks {
            if !self.begin_create(&task.id) {
                info!(task_id = %task.id, "shutdown requested during launch; not starting remaining tasks");
                return;
            }

            let started = self.start_process(task).await;
            self.finish_create(&task.id, started.is_ok());
            if let Err(err) = started {
                error!(task_id = %task.id, error = %err, "failed to start task process");
                self.set_task_state(&task.id, TaskState::Failed);
                self.report(&task.id, TaskState::Failed, Some(err.to_string()))
                    .await;
                self.shutdown_in_background();
                return;
            }
        }

        {
            let mut state = self.state();
            if state.status != ExecutorStatus::Launching {
                debug!(status = %state.status, "executor left launching state during launch");
                return;
            }
            state.status = ExecutorStatus::Running;
        }

        info!("task group running");
        let this = Arc::clone(self);
        tokio::spawn(async move { this.inspection_loop().await });
    }

    async fn start_process(&self, task: &ProcessTask) -> Result<()> {
        task::materialize_local_files(self.fs.as_ref(), &task.spec)?;
        self.supervisor.create(&task.spec).await?;
        debug!(task_id = %task.id, "process created");
        Ok(())
    }

    /// Report `state` for `task_id` to the agent.
    ///
    /// The update is recorded as pending before it is sent so an
    /// acknowledgement can never race ahead of the bookkeeping. Send failures
    /// are logged; the next inspection tick reports again if still relevant.
    pub async fn report(&self, task_id: &str, state: TaskState, message: Option<String>) {
        let mut status = TaskStatus::new(task_id, state, message);
        status.uuid = Some(Uuid::new_v4().as_bytes().to_vec());
        status.timestamp = Some(
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs_f64())
                .unwrap_or_default(),
        );

        self.pending.record(task_id, status.clone());

        match self.reporter.update_task_status(status).await {
            Ok(()) => debug!(task_id, %state, "reported task status"),
            Err(err) => warn!(task_id, %state, error = %err, "failed to send task status update"),
        }
    }

    /// Handle an acknowledgement from the agent.
    pub fn acknowledge(&self, task_id: &str, token: &[u8]) {
        if self.pending.acknowledge(task_id, token) {
            debug!(task_id, remaining = self.pending.len(), "status update acknowledged");
        }
    }

    /// Shutdown requested by the agent. Processes stopped from here on count
    /// as finished rather than failed.
    pub async fn shutdown(self: &Arc<Self>) {
        self.state().asked_shutdown = true;
        info!("shutdown requested by agent");
        self.run_shutdown().await;
    }

    /// Start the shutdown sequence on its own task.
    pub fn shutdown_in_background(self: &Arc<Self>) {
        let this = Arc::clone(self);
        tokio::spawn(async move { this.run_shutdown().await });
    }

    /// Ask the supervisor to reload every task. Stops at the first failure.
    pub async fn reload_tasks(&self) -> Result<()> {
        for task in self.tasks() {
            self.supervisor.reload(&task.id).await?;
            info!(task_id = %task.id, "task reloaded");
        }
        Ok(())
    }

    /// Ask the supervisor to restart every task. Stops at the first failure.
    pub async fn restart_tasks(&self) -> Result<()> {
        for task in self.tasks() {
            self.supervisor.restart(&task.id).await?;
            info!(task_id = %task.id, "task restarted");
        }
        Ok(())
    }
}
