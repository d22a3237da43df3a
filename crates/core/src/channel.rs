//! Transport traits: the boundary to whatever relays messages.
//!
//! A [`Transport`] turns an identity plus credentials into a connected
//! [`MessageChannel`]. The channel delivers messages to other identities and
//! hands out the next message addressed to its own identity, waiting at most
//! a bounded time. Session establishment, presence, and the relay server
//! itself live behind these traits.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::ChannelError;
use crate::identity::{AgentId, Credentials};
use crate::message::Message;

/// Outcome of a bounded wait on the inbox.
#[derive(Debug, Clone)]
pub enum Received {
    Message(Message),
    /// Nothing arrived in time. Not an error.
    Timeout,
}

impl Received {
    pub fn into_message(self) -> Option<Message> {
        match self {
            Received::Message(message) => Some(message),
            Received::Timeout => None,
        }
    }
}

/// Establishes sessions on a message bus.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Connect `identity` to the bus.
    ///
    /// Failures are fatal to the caller's startup; retrying is the
    /// transport's business, not the agent's.
    async fn connect(
        &self,
        identity: &AgentId,
        credentials: &Credentials,
    ) -> Result<Box<dyn MessageChannel>, ChannelError>;
}

/// A connected session for one identity.
#[async_trait]
pub trait MessageChannel: Send + Sync {
    /// The identity this session speaks for.
    fn identity(&self) -> &AgentId;

    /// Deliver `message` to its recipient's inbox. Best-effort.
    async fn send(&self, message: Message) -> Result<(), ChannelError>;

    /// Wait up to `timeout` for the next message addressed to this identity.
    async fn receive(&self, timeout: Duration) -> Result<Received, ChannelError>;

    /// Release the identity. Calling it twice is harmless.
    async fn disconnect(&self) -> Result<(), ChannelError> {
        Ok(())
    }

    /// Whether the session is still connected.
    fn is_connected(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Performative;

    #[test]
    fn timeout_has_no_message() {
        assert!(Received::Timeout.into_message().is_none());
    }

    #[test]
    fn received_message_unwraps() {
        let msg = Message::raw(
            AgentId::new("a@localhost"),
            AgentId::new("b@localhost"),
            Performative::Inform,
            "{}",
        );
        let id = msg.id.clone();
        let unwrapped = Received::Message(msg).into_message().unwrap();
        assert_eq!(unwrapped.id, id);
    }
}
