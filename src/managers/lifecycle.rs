use std::fmt;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

use crate::managers::coordinator::RecoveryCoordinator;

#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SuspendReason {
    Background,
    Terminating,
}

/// Process state transitions reported by the host. The host cannot reliably
/// tell "going to background" from "about to be killed", so both arrive as
/// `Suspending`.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(tag = "event", content = "reason", rename_all = "snake_case")]
pub enum LifecycleEvent {
    Suspending(SuspendReason),
    Resumed,
    Launch,
}

impl fmt::Display for LifecycleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifecycleEvent::Suspending(SuspendReason::Background) => write!(f, "background"),
            LifecycleEvent::Suspending(SuspendReason::Terminating) => write!(f, "terminating"),
            LifecycleEvent::Resumed => write!(f, "resumed"),
            LifecycleEvent::Launch => write!(f, "launch"),
        }
    }
}

pub type LifecycleReceiver = UnboundedReceiver<LifecycleEvent>;

/// Relay from the host's lifecycle callbacks to the coordinator.
///
/// Sending never blocks, so a finalize that is still retrying cannot stop
/// later transitions from being observed; they queue up in order.
#[derive(Clone)]
pub struct LifecycleMonitor {
    sender: UnboundedSender<LifecycleEvent>,
}

impl LifecycleMonitor {
    pub fn channel() -> (Self, LifecycleReceiver) {
        let (sender, receiver) = unbounded_channel();
        (Self { sender }, receiver)
    }

    pub fn on_suspending(&self, reason: SuspendReason) {
        self.notify(LifecycleEvent::Suspending(reason));
    }

    pub fn on_resumed(&self) {
        self.notify(LifecycleEvent::Resumed);
    }

    pub fn on_launch(&self) {
        self.notify(LifecycleEvent::Launch);
    }

    pub fn notify(&self, event: LifecycleEvent) {
        if self.sender.send(event).is_err() {
            tracing::warn!("Lifecycle event {} dropped - monitor loop is not running", event);
        }
    }

    /// Drains `receiver` until every monitor handle is dropped. Finalizations
    /// started by an event keep running on their own tasks.
    pub async fn run(mut receiver: LifecycleReceiver, coordinator: RecoveryCoordinator) {
        while let Some(event) = receiver.recv().await {
            tracing::debug!("Lifecycle event: {}", event);

            match coordinator.handle_lifecycle(event).await {
                Ok(Some(_finalizing)) => {
                    tracing::info!("Finalization started after {} event", event);
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::error!("Failed to handle {} event: {}", event, e);
                }
            }
        }

        tracing::info!("Lifecycle monitor stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suspending_covers_background_and_termination() {
        let (monitor, mut rx) = LifecycleMonitor::channel();

        monitor.on_suspending(SuspendReason::Background);
        monitor.on_suspending(SuspendReason::Terminating);
        monitor.on_resumed();
        monitor.on_launch();

        assert_eq!(rx.try_recv().unwrap(), LifecycleEvent::Suspending(SuspendReason::Background));
        assert_eq!(rx.try_recv().unwrap(), LifecycleEvent::Suspending(SuspendReason::Terminating));
        assert_eq!(rx.try_recv().unwrap(), LifecycleEvent::Resumed);
        assert_eq!(rx.try_recv().unwrap(), LifecycleEvent::Launch);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn sending_after_the_loop_is_gone_does_not_panic() {
        let (monitor, rx) = LifecycleMonitor::channel();
        drop(rx);
        monitor.on_resumed();
    }
}
