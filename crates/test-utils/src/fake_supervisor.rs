use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use mesos_executor::errors::{ExecutorError, Result};
use mesos_executor::supervisor::{ProcessSpec, ProcessStatus, ProcessSupervisor};
use mesos_executor::types::{BoxFuture, ProcessState};

/// One call the executor made.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SupervisorCall {
    Create(String),
    Inspect(String),
    Stop(String, u64),
    Delete(String),
    Reload(String),
    Restart(String),
}

#[derive(Debug, Default)]
struct FakeState {
    created: Vec<ProcessSpec>,
    scripts: HashMap<String, VecDeque<ProcessState>>,
    calls: Vec<SupervisorCall>,
    failing_create: HashSet<String>,
    failing_reload: HashSet<String>,
    ignoring_stop: HashSet<String>,
    create_delays: HashMap<String, Duration>,
}

/// In-memory supervisor that:
/// - records every call
/// - answers `inspect` from a per-task script, repeating the last entry
/// - moves a task to `Stopping` then `Stopped` when asked to stop
#[derive(Debug, Clone, Default)]
pub struct FakeSupervisor {
    state: Arc<Mutex<FakeState>>,
}

impl FakeSupervisor {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    /// States `inspect` returns for `id`, one per call. The last one sticks.
    /// Tasks without a script report `Running`.
    pub fn script(&self, id: &str, states: &[ProcessState]) {
        self.lock()
            .scripts
            .insert(id.to_string(), states.iter().copied().collect());
    }

    /// `create` for `id` takes `delay` before it answers.
    pub fn slow_create(&self, id: &str, delay: Duration) {
        self.lock().create_delays.insert(id.to_string(), delay);
    }

    pub fn fail_create(&self, id: &str) {
        self.lock().failing_create.insert(id.to_string());
    }

    /// `stop` leaves this task in `Stopping` forever.
    pub fn ignore_stop(&self, id: &str) {
        self.lock().ignoring_stop.insert(id.to_string());
    }

    pub fn fail_reload(&self, id: &str) {
        self.lock().failing_reload.insert(id.to_string());
    }

    pub fn calls(&self) -> Vec<SupervisorCall> {
        self.lock().calls.clone()
    }

    pub fn created(&self) -> Vec<ProcessSpec> {
        self.lock().created.clone()
    }

    pub fn count(&self, matches: impl Fn(&SupervisorCall) -> bool) -> usize {
        self.lock().calls.iter().filter(|c| matches(c)).count()
    }

    fn record(&self, call: SupervisorCall) {
        self.lock().calls.push(call);
    }

    fn next_state(&self, id: &str) -> ProcessState {
        let mut state = self.lock();
        match state.scripts.get_mut(id) {
            Some(script) if script.len() > 1 => script.pop_front().unwrap_or(ProcessState::Running),
            Some(script) => script.front().copied().unwrap_or(ProcessState::Running),
            None => ProcessState::Running,
        }
    }
}

impl ProcessSupervisor for FakeSupervisor {
    fn create<'a>(&'a self, spec: &'a ProcessSpec) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            self.record(SupervisorCall::Create(spec.id.clone()));
            let delay = self.lock().create_delays.get(&spec.id).copied();
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            let mut state = self.lock();
            if state.failing_create.contains(&spec.id) {
                return Err(ExecutorError::SupervisorError(format!(
                    "cannot create process {}",
                    spec.id
                )));
            }
            state.created.push(spec.clone());
            Ok(())
        })
    }

    fn inspect<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<ProcessStatus>> {
        Box::pin(async move {
            self.record(SupervisorCall::Inspect(id.to_string()));
            Ok(ProcessStatus::new(self.next_state(id)))
        })
    }

    fn stop<'a>(&'a self, id: &'a str, timeout_secs: u64) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            self.record(SupervisorCall::Stop(id.to_string(), timeout_secs));
            if self.lock().ignoring_stop.contains(id) {
                self.script(id, &[ProcessState::Stopping]);
            } else {
                self.script(id, &[ProcessState::Stopping, ProcessState::Stopped]);
            }
            Ok(())
        })
    }

    fn delete<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            self.record(SupervisorCall::Delete(id.to_string()));
            Ok(())
        })
    }

    fn reload<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            self.record(SupervisorCall::Reload(id.to_string()));
            if self.lock().failing_reload.contains(id) {
                return Err(ExecutorError::SupervisorError(format!("cannot reload {id}")));
            }
            Ok(())
        })
    }

    fn restart<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            self.record(SupervisorCall::Restart(id.to_string()));
            Ok(())
        })
    }
}
