// src/driver/mod.rs

//! Executor side of the agent's HTTP executor API.
//!
//! The driver subscribes once (failure is fatal), reads events off the open
//! subscribe stream and dispatches them to the [`Executor`]. When the stream
//! breaks it resubscribes on a fixed interval. Status updates go out as
//! separate `UPDATE` calls through [`UpdateSender`].

mod receive;
mod resubscribe;
pub mod session;

pub use session::{DriverSession, SubscriptionState};

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use crate::config::{AgentIdentity, ResubscribePolicy, Settings};
use crate::errors::{ExecutorError, Result};
use crate::executor::{Executor, StatusReporter};
use crate::protocol::{Call, IdValue, TaskStatus};
use crate::transport::EventStream;
use crate::types::BoxFuture;

#[derive(Debug, Clone)]
pub struct DriverOptions {
    pub resubscribe_interval: Duration,
    pub resubscribe_policy: ResubscribePolicy,
    /// Only enforced with [`ResubscribePolicy::RecoveryTimeout`]; zero means
    /// unbounded.
    pub recovery_timeout: Duration,
}

impl DriverOptions {
    pub fn new(identity: &AgentIdentity, settings: &Settings) -> Self {
        Self {
            resubscribe_interval: settings.resubscribe_interval,
            resubscribe_policy: settings.resubscribe_policy,
            recovery_timeout: identity.recovery_timeout,
        }
    }
}

impl Default for DriverOptions {
    fn default() -> Self {
        Self {
            resubscribe_interval: Duration::from_secs(1),
            resubscribe_policy: ResubscribePolicy::Forever,
            recovery_timeout: Duration::ZERO,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExecutorDriver {
    session: Arc<DriverSession>,
    executor: Arc<Executor>,
    options: DriverOptions,
}

impl ExecutorDriver {
    pub fn new(session: Arc<DriverSession>, executor: Arc<Executor>, options: DriverOptions) -> Self {
        Self {
            session,
            executor,
            options,
        }
    }

    pub fn session(&self) -> &Arc<DriverSession> {
        &self.session
    }

    pub fn executor(&self) -> &Arc<Executor> {
        &self.executor
    }

    pub fn is_connected(&self) -> bool {
        self.session.is_connected()
    }

    pub fn subscription_state(&self) -> SubscriptionState {
        self.session.subscription_state()
    }

    /// Perform the first subscription. An error here means the executor
    /// cannot run at all.
    pub async fn start(&self) -> Result<()> {
        info!(url = %self.session.connection().url(), "subscribing to agent");
        self.subscribe().await
    }

    /// Send `SUBSCRIBE` with the stream kept open and start reading events
    /// from it. Unacknowledged updates ride along so the agent can
    /// reconcile.
    pub async fn subscribe(&self) -> Result<()> {
        self.session.begin_subscribe();

        let identity = self.session.identity();
        let unacknowledged: Vec<TaskStatus> = self
            .executor
            .unacknowledged_updates()
            .into_iter()
            .map(|status| self.stamp(status))
            .collect();
        debug!(unacknowledged = unacknowledged.len(), "sending subscribe call");

        let call = Call::subscribe(&identity.executor_id, &identity.framework_id, unacknowledged);
        let response = self
            .session
            .connection()
            .send(&call, true)
            .await?
            .ok_or_else(|| ExecutorError::DecodeError("subscribe returned no event stream".into()))?;

        self.spawn_receive(EventStream::new(response));
        Ok(())
    }

    /// Fill in the agent and executor ids the agent expects on an update.
    fn stamp(&self, mut status: TaskStatus) -> TaskStatus {
        let agent_id = self.session.agent_id();
        if !agent_id.is_empty() {
            status.agent_id = Some(IdValue::new(agent_id));
        }
        status.executor_id = Some(IdValue::new(&self.session.identity().executor_id));
        status
    }

    fn spawn_receive(&self, stream: EventStream) {
        let driver = self.clone();
        tokio::spawn(async move { driver.receive_loop(stream).await });
    }

    fn spawn_resubscribe(&self) {
        let driver = self.clone();
        tokio::spawn(async move { driver.resubscribe_loop().await });
    }
}

/// Sends status updates to the agent as standalone `UPDATE` calls.
#[derive(Debug, Clone)]
pub struct UpdateSender {
    session: Arc<DriverSession>,
}

impl UpdateSender {
    pub fn new(session: Arc<DriverSession>) -> Self {
        Self { session }
    }
}

impl StatusReporter for UpdateSender {
    fn update_task_status(&self, mut status: TaskStatus) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            let identity = self.session.identity();
            let agent_id = self.session.agent_id();
            if !agent_id.is_empty() {
                status.agent_id = Some(IdValue::new(agent_id));
            }
            status.executor_id = Some(IdValue::new(&identity.executor_id));

            let task_id = status.task_id_value().to_string();
            let call = Call::update(&identity.executor_id, &identity.framework_id, status);
            self.session.connection().send(&call, false).await?;
            debug!(task_id = %task_id, "status update sent");
            Ok(())
        })
    }
}
