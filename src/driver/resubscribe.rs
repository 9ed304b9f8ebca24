// src/driver/resubscribe.rs

use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{debug, error, info, warn};

use super::{ExecutorDriver, SubscriptionState};
use crate::config::ResubscribePolicy;

impl ExecutorDriver {
    /// Retry `subscribe` on a fixed interval until it succeeds, the driver is
    /// cancelled, or (with a bounded policy) the agent has not confirmed a
    /// subscription for longer than the recovery timeout.
    pub(super) async fn resubscribe_loop(self) {
        let cancel = self.session.cancel_token().clone();
        let period = self.options.resubscribe_interval;
        let give_up_after = match self.options.resubscribe_policy {
            ResubscribePolicy::RecoveryTimeout if !self.options.recovery_timeout.is_zero() => {
                Some(self.options.recovery_timeout)
            }
            _ => None,
        };

        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut attempt: u64 = 0;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("resubscribe loop cancelled");
                    return;
                }
                _ = ticker.tick() => {}
            }

            if self.session.subscription_state() == SubscriptionState::Terminated {
                return;
            }
            if let Some(limit) = give_up_after {
                if self.session.disconnected_for().is_some_and(|gone| gone >= limit) {
                    error!(
                        recovery_timeout = ?limit,
                        attempts = attempt,
                        "agent did not come back within the recovery timeout; shutting down"
                    );
                    self.session.terminate();
                    self.executor.shutdown_in_background();
                    return;
                }
            }

            attempt += 1;
            match self.subscribe().await {
                Ok(()) => {
                    info!(attempt, "resubscribed to agent");
                    return;
                }
                Err(err) => warn!(attempt, error = %err, "resubscribe failed"),
            }
        }
    }
}
