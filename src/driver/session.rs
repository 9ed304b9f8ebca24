// src/driver/session.rs

use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::config::AgentIdentity;
use crate::transport::Connection;

/// Where the driver stands with the agent.
///
/// `NotSubscribed -> Subscribing -> Subscribed`, then on a broken stream
/// `Resubscribing -> Subscribed` or, when recovery is bounded and runs out,
/// `Terminated`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionState {
    NotSubscribed,
    Subscribing,
    Subscribed,
    Resubscribing,
    Terminated,
}

impl fmt::Display for SubscriptionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SubscriptionState::NotSubscribed => "not_subscribed",
            SubscriptionState::Subscribing => "subscribing",
            SubscriptionState::Subscribed => "subscribed",
            SubscriptionState::Resubscribing => "resubscribing",
            SubscriptionState::Terminated => "terminated",
        };
        f.write_str(s)
    }
}

#[derive(Debug)]
struct SessionState {
    connected: bool,
    subscription: SubscriptionState,
    agent_id: String,
    /// When the last confirmed subscription was lost.
    lost_at: Option<Instant>,
}

/// Identity, connection and connection status shared by the driver's loops
/// and the update sender.
#[derive(Debug)]
pub struct DriverSession {
    identity: AgentIdentity,
    connection: Connection,
    state: Mutex<SessionState>,
    cancel: CancellationToken,
}

impl DriverSession {
    pub fn new(identity: AgentIdentity, connection: Connection, cancel: CancellationToken) -> Self {
        let agent_id = identity.agent_id.clone();
        Self {
            identity,
            connection,
            state: Mutex::new(SessionState {
                connected: false,
                subscription: SubscriptionState::NotSubscribed,
                agent_id,
                lost_at: None,
            }),
            cancel,
        }
    }

    fn state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn identity(&self) -> &AgentIdentity {
        &self.identity
    }

    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_connected(&self) -> bool {
        self.state().connected
    }

    pub fn subscription_state(&self) -> SubscriptionState {
        self.state().subscription
    }

    /// Agent id to stamp on outgoing updates; empty until known.
    pub fn agent_id(&self) -> String {
        self.state().agent_id.clone()
    }

    pub(crate) fn begin_subscribe(&self) {
        let mut state = self.state();
        if state.subscription == SubscriptionState::NotSubscribed {
            state.subscription = SubscriptionState::Subscribing;
        }
    }

    /// The agent confirmed the subscription.
    pub(crate) fn subscribed(&self, agent_id: Option<&str>) {
        let mut state = self.state();
        state.connected = true;
        state.subscription = SubscriptionState::Subscribed;
        state.lost_at = None;
        if let Some(id) = agent_id.filter(|id| !id.is_empty()) {
            state.agent_id = id.to_string();
        }
    }

    /// Time since the agent last confirmed a subscription, if it is gone.
    pub fn disconnected_for(&self) -> Option<std::time::Duration> {
        self.state().lost_at.map(|at| at.elapsed())
    }

    /// The event stream broke.
    pub(crate) fn disconnected(&self) {
        let mut state = self.state();
        state.connected = false;
        state.lost_at.get_or_insert_with(Instant::now);
        if state.subscription != SubscriptionState::Terminated {
            state.subscription = SubscriptionState::Resubscribing;
        }
    }

    pub(crate) fn terminate(&self) {
        let mut state = self.state();
        state.connected = false;
        state.subscription = SubscriptionState::Terminated;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AgentIdentity;

    fn session() -> DriverSession {
        let identity = AgentIdentity::from_lookup(|key| match key {
            "MESOS_SLAVE_PID" => Some("slave(1)@127.0.0.1:5051".into()),
            "MESOS_FRAMEWORK_ID" => Some("framework-1".into()),
            "MESOS_EXECUTOR_ID" => Some("executor-1".into()),
            "MESOS_SANDBOX" => Some("/sandbox".into()),
            "MESOS_AGENT_ENDPOINT" => Some("127.0.0.1:5051".into()),
            _ => None,
        })
        .unwrap();
        let connection = Connection::new(&identity).unwrap();
        DriverSession::new(identity, connection, CancellationToken::new())
    }

    #[test]
    fn walks_through_subscription_states() {
        let session = session();
        assert_eq!(session.subscription_state(), SubscriptionState::NotSubscribed);

        session.begin_subscribe();
        assert_eq!(session.subscription_state(), SubscriptionState::Subscribing);
        assert!(!session.is_connected());

        session.subscribed(Some("agent-3"));
        assert!(session.is_connected());
        assert_eq!(session.agent_id(), "agent-3");
        assert!(session.disconnected_for().is_none());

        session.disconnected();
        session.begin_subscribe();
        assert_eq!(session.subscription_state(), SubscriptionState::Resubscribing);
        assert!(session.disconnected_for().is_some());

        session.terminate();
        session.disconnected();
        assert_eq!(session.subscription_state(), SubscriptionState::Terminated);
    }

    #[test]
    fn empty_agent_id_does_not_overwrite_known_one() {
        let session = session();
        session.subscribed(Some("agent-3"));
        session.subscribed(Some(""));
        session.subscribed(None);
        assert_eq!(session.agent_id(), "agent-3");
    }
}
