//! Error types for the Agora domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum; [`Error`] wraps them all.

use thiserror::Error;

use crate::identity::AgentId;
use crate::payload::MessageKind;

/// The top-level error type for all Agora operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Transport errors ---
    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    // --- FSM / protocol errors ---
    #[error("Protocol violation: {0}")]
    Protocol(#[from] ProtocolError),

    // --- Payload errors ---
    #[error("Malformed payload: {0}")]
    Payload(#[from] PayloadError),

    // --- Lifecycle ---
    #[error("Agent {0} was already started")]
    AlreadyStarted(AgentId),

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse classification used when reporting a failed agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Connection,
    Protocol,
    MalformedPayload,
    Lifecycle,
    Internal,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorKind::Connection => "connection",
            ErrorKind::Protocol => "protocol",
            ErrorKind::MalformedPayload => "malformed_payload",
            ErrorKind::Lifecycle => "lifecycle",
            ErrorKind::Internal => "internal",
        };
        f.write_str(name)
    }
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Channel(_) => ErrorKind::Connection,
            Error::Protocol(_) => ErrorKind::Protocol,
            Error::Payload(_) => ErrorKind::MalformedPayload,
            Error::AlreadyStarted(_) => ErrorKind::Lifecycle,
            Error::Serialization(_) | Error::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Fatal errors stop the owning agent instead of just the failing behavior.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Protocol(_))
    }
}

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ChannelError {
    #[error("Connection failed for {identity}: {reason}")]
    ConnectionFailed { identity: AgentId, reason: String },

    #[error("Identity already connected: {0}")]
    AlreadyConnected(AgentId),

    #[error("Session for {0} is not connected")]
    NotConnected(AgentId),

    #[error("Recipient unavailable: {0}")]
    RecipientUnavailable(AgentId),

    #[error("Message delivery failed to {recipient}: {reason}")]
    DeliveryFailed { recipient: AgentId, reason: String },

    #[error("Channel connection lost: {0}")]
    ConnectionLost(AgentId),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("Invalid transition: {from} -> {to} is not declared")]
    InvalidTransition { from: String, to: String },

    #[error("Unknown state: {0}")]
    UnknownState(String),

    #[error("State declared twice: {0}")]
    DuplicateState(String),

    #[error("Cannot mark {attempted} as initial, {existing} already is")]
    MultipleInitialStates { existing: String, attempted: String },

    #[error("State machine {0} has no initial state")]
    NoInitialState(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PayloadError {
    #[error("{0}")]
    Malformed(String),

    #[error("{kind} must be sent as {expected}, got {actual}")]
    PerformativeMismatch {
        kind: MessageKind,
        expected: String,
        actual: String,
    },

    #[error("{field} out of range: {value}")]
    OutOfRange { field: &'static str, value: i64 },
}
