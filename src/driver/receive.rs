// src/driver/receive.rs

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::ExecutorDriver;
use crate::protocol::{Event, EventType};
use crate::transport::EventStream;

impl ExecutorDriver {
    /// Read events until cancelled or the stream breaks. A broken stream
    /// hands over to the resubscribe loop.
    pub(super) async fn receive_loop(self, mut stream: EventStream) {
        let cancel = self.session.cancel_token().clone();
        loop {
            let next = tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("receive loop cancelled");
                    return;
                }
                next = stream.next_event() => next,
            };

            match next {
                Ok(event) => self.dispatch(event),
                Err(err) => {
                    warn!(error = %err, "event stream broken; resubscribing");
                    self.session.disconnected();
                    self.spawn_resubscribe();
                    return;
                }
            }
        }
    }

    fn dispatch(&self, event: Event) {
        match event.kind {
            EventType::Subscribed => {
                let agent_id = event
                    .subscribed
                    .as_ref()
                    .and_then(|s| s.agent_info.as_ref())
                    .and_then(|info| info.id.as_ref())
                    .map(|id| id.value.as_str());
                self.session.subscribed(agent_id);
                info!(agent_id = ?agent_id, "subscribed to agent");
            }
            EventType::LaunchGroup => {
                let Some(launch) = event.launch_group else {
                    warn!("LAUNCH_GROUP event without a task group");
                    return;
                };
                let tasks = launch.task_group.tasks;
                info!(tasks = tasks.len(), "received task group");
                // Recorded inline so a later SHUTDOWN on this stream sees it.
                let Some(plan) = self.executor.accept_task_group(tasks) else {
                    return;
                };
                let executor = Arc::clone(&self.executor);
                tokio::spawn(async move { executor.start_task_group(plan).await });
            }
            EventType::Shutdown => {
                info!("received shutdown from agent");
                let executor = Arc::clone(&self.executor);
                tokio::spawn(async move { executor.shutdown().await });
            }
            EventType::Acknowledged => {
                let Some(ack) = event.acknowledged else {
                    warn!("ACKNOWLEDGED event without payload");
                    return;
                };
                match ack.token() {
                    Ok(token) => self.executor.acknowledge(&ack.task_id.value, &token),
                    Err(err) => {
                        warn!(task_id = %ack.task_id.value, error = %err, "undecodable acknowledgement token")
                    }
                }
            }
            EventType::Unknown => debug!("dropping unknown event"),
        }
    }
}
