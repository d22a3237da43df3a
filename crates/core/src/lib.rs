//! # Agora Core
//!
//! Domain types, traits, and error definitions for the Agora multi-agent
//! testbed. This crate uses nothing from `tokio` beyond `tokio::sync`;
//! it defines the vocabulary every other crate speaks.
//!
//! ## Design Philosophy
//!
//! Agents never share memory. Everything they know about each other arrives
//! as a [`Message`]: an immutable envelope with a speech-act tag
//! ([`Performative`]) and a typed [`Payload`]. The transport that carries
//! messages is a trait ([`Transport`] / [`MessageChannel`]) so the in-process
//! bus can be swapped for a networked one without touching agent logic.

pub mod channel;
pub mod error;
pub mod event;
pub mod identity;
pub mod message;
pub mod message_log;
pub mod payload;

// Re-export key types at crate root for ergonomics
pub use channel::{MessageChannel, Received, Transport};
pub use error::{ChannelError, Error, ErrorKind, PayloadError, ProtocolError, Result};
pub use event::{EventBus, RuntimeEvent};
pub use identity::{AgentId, Credentials};
pub use message::{Message, Performative};
pub use message_log::{LogSink, MessageLog, MessageLogEntry, TracingSink};
pub use payload::{HeatReport, HeatStatus, MessageKind, Payload, TargetReport, ValueTier};
