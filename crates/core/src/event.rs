//! Runtime events, for observing agents without coupling to them.
//!
//! The runtime publishes an event whenever an agent starts or stops, a
//! behavior ends, or a state machine enters a state. Operators and tests
//! subscribe and filter for what they care about.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::identity::AgentId;

/// All runtime events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RuntimeEvent {
    /// An agent connected and its behaviors began running
    AgentStarted {
        agent: AgentId,
        behaviors: usize,
        timestamp: DateTime<Utc>,
    },

    /// An agent stopped; `reason` is the rendered exit reason
    AgentStopped {
        agent: AgentId,
        reason: String,
        timestamp: DateTime<Utc>,
    },

    /// A behavior returned normally
    BehaviorFinished {
        agent: AgentId,
        behavior: String,
        timestamp: DateTime<Utc>,
    },

    /// A behavior returned an error
    BehaviorFailed {
        agent: AgentId,
        behavior: String,
        error_kind: String,
        error_message: String,
        fatal: bool,
        timestamp: DateTime<Utc>,
    },

    /// A state machine entered a state
    StateEntered {
        agent: AgentId,
        machine: String,
        state: String,
        timestamp: DateTime<Utc>,
    },
}

/// A broadcast-based event bus for runtime events.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub.
pub struct EventBus {
    sender: broadcast::Sender<Arc<RuntimeEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: RuntimeEvent) {
        // No subscribers is fine
        let _ = self.sender.send(Arc::new(event));
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<RuntimeEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn event_bus_publish_subscribe() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        bus.publish(RuntimeEvent::StateEntered {
            agent: AgentId::new("rescue_agent@localhost"),
            machine: "rescue".into(),
            state: "MONITORING".into(),
            timestamp: Utc::now(),
        });

        let event = rx.recv().await.unwrap();
        match event.as_ref() {
            RuntimeEvent::StateEntered { state, machine, .. } => {
                assert_eq!(state, "MONITORING");
                assert_eq!(machine, "rescue");
            }
            _ => panic!("Expected StateEntered event"),
        }
    }

    #[test]
    fn event_bus_no_subscribers_doesnt_panic() {
        let bus = EventBus::new(16);
        bus.publish(RuntimeEvent::AgentStopped {
            agent: AgentId::new("sensor_agent@localhost"),
            reason: "stopped".into(),
            timestamp: Utc::now(),
        });
    }
}
