//! The message envelope exchanged between agents.
//!
//! A message is built by the sender, moved through the transport, and
//! consumed by the recipient. The body travels as JSON text so that a
//! recipient can detect (and survive) payloads it cannot parse.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::PayloadError;
use crate::identity::AgentId;
use crate::payload::Payload;

/// The speech act a message performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Performative {
    /// Share a fact.
    Inform,
    /// Ask the recipient to do something.
    Request,
}

impl std::fmt::Display for Performative {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Performative::Inform => f.write_str("INFORM"),
            Performative::Request => f.write_str("REQUEST"),
        }
    }
}

/// An immutable envelope addressed from one agent to another.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Unique message ID
    pub id: String,

    pub sender: AgentId,

    pub recipient: AgentId,

    pub performative: Performative,

    /// JSON-encoded payload
    pub body: String,

    /// Groups a request with its replies
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,

    /// ID of the message this one answers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_reply_to: Option<String>,

    pub sent_at: DateTime<Utc>,
}

impl Message {
    /// Build a message carrying an encoded payload.
    pub fn encode(
        sender: AgentId,
        recipient: AgentId,
        performative: Performative,
        payload: &Payload,
    ) -> Result<Self, serde_json::Error> {
        let body = serde_json::to_string(payload)?;
        Ok(Self::raw(sender, recipient, performative, body))
    }

    /// Build a message with an arbitrary body.
    pub fn raw(
        sender: AgentId,
        recipient: AgentId,
        performative: Performative,
        body: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            sender,
            recipient,
            performative,
            body: body.into(),
            conversation_id: None,
            in_reply_to: None,
            sent_at: Utc::now(),
        }
    }

    /// Attach a conversation ID.
    pub fn with_conversation(mut self, conversation_id: impl Into<String>) -> Self {
        self.conversation_id = Some(conversation_id.into());
        self
    }

    /// Build the answer to this message, addressed back to its sender.
    pub fn reply(
        &self,
        performative: Performative,
        payload: &Payload,
    ) -> Result<Self, serde_json::Error> {
        let mut reply = Self::encode(
            self.recipient.clone(),
            self.sender.clone(),
            performative,
            payload,
        )?;
        reply.in_reply_to = Some(self.id.clone());
        reply.conversation_id = self.conversation_id.clone();
        Ok(reply)
    }

    /// Parse and validate the body.
    ///
    /// Fails if the body is not a known payload, if a value is out of range,
    /// or if the payload kind may not travel under this performative.
    pub fn decode(&self) -> Result<Payload, PayloadError> {
        let payload: Payload = serde_json::from_str(&self.body)
            .map_err(|e| PayloadError::Malformed(e.to_string()))?;

        let kind = payload.kind();
        if kind.performative() != self.performative {
            return Err(PayloadError::PerformativeMismatch {
                kind,
                expected: kind.performative().to_string(),
                actual: self.performative.to_string(),
            });
        }

        if let Payload::HeatStatus(report) = &payload {
            if report.heat_level > 100 {
                return Err(PayloadError::OutOfRange {
                    field: "heat_level",
                    value: i64::from(report.heat_level),
                });
            }
        }

        Ok(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::{HeatReport, HeatStatus, TargetReport, ValueTier};

    fn ids() -> (AgentId, AgentId) {
        (AgentId::new("recon@localhost"), AgentId::new("main_hacker@localhost"))
    }

    #[test]
    fn target_discovered_survives_the_wire() {
        let (from, to) = ids();
        let payload = Payload::TargetDiscovered(TargetReport {
            target_name: "GovServer-42".into(),
            vulnerability_type: "Unpatched CVE".into(),
            value_tier: ValueTier::Critical,
        });
        let msg = Message::encode(from, to, Performative::Inform, &payload).unwrap();
        assert_eq!(msg.decode().unwrap(), payload);
    }

    #[test]
    fn check_heat_level_survives_the_wire() {
        let (from, to) = ids();
        let payload = Payload::CheckHeatLevel {
            target_name: "FinanceCorp SQL".into(),
        };
        let msg = Message::encode(from, to, Performative::Request, &payload).unwrap();
        assert_eq!(msg.decode().unwrap(), payload);
    }

    #[test]
    fn heat_status_survives_the_wire() {
        let (from, to) = ids();
        let payload = Payload::HeatStatus(HeatReport {
            heat_level: 85,
            status: HeatStatus::Critical,
        });
        let msg = Message::encode(from, to, Performative::Inform, &payload).unwrap();
        assert_eq!(msg.decode().unwrap(), payload);
    }

    #[test]
    fn garbage_body_is_malformed() {
        let (from, to) = ids();
        let msg = Message::raw(from, to, Performative::Inform, "{not json");
        assert!(matches!(msg.decode(), Err(PayloadError::Malformed(_))));
    }

    #[test]
    fn unknown_action_is_malformed() {
        let (from, to) = ids();
        let msg = Message::raw(from, to, Performative::Inform, r#"{"action":"self_destruct"}"#);
        assert!(matches!(msg.decode(), Err(PayloadError::Malformed(_))));
    }

    #[test]
    fn wrong_performative_is_rejected() {
        let (from, to) = ids();
        let payload = Payload::CheckHeatLevel {
            target_name: "Corp-WiFi".into(),
        };
        let msg = Message::encode(from, to, Performative::Inform, &payload).unwrap();
        assert!(matches!(
            msg.decode(),
            Err(PayloadError::PerformativeMismatch { .. })
        ));
    }

    #[test]
    fn heat_above_one_hundred_is_out_of_range() {
        let (from, to) = ids();
        let body = r#"{"action":"heat_status","heat_level":140,"status":"CRITICAL"}"#;
        let msg = Message::raw(from, to, Performative::Inform, body);
        assert_eq!(
            msg.decode(),
            Err(PayloadError::OutOfRange {
                field: "heat_level",
                value: 140
            })
        );
    }

    #[test]
    fn reply_is_correlated() {
        let (from, to) = ids();
        let request = Message::encode(
            from.clone(),
            to.clone(),
            Performative::Request,
            &Payload::CheckHeatLevel {
                target_name: "AdminPanel".into(),
            },
        )
        .unwrap()
        .with_conversation("op-7");

        let reply = request
            .reply(
                Performative::Inform,
                &Payload::HeatStatus(HeatReport::from_level(30)),
            )
            .unwrap();

        assert_eq!(reply.sender, to);
        assert_eq!(reply.recipient, from);
        assert_eq!(reply.in_reply_to.as_deref(), Some(request.id.as_str()));
        assert_eq!(reply.conversation_id.as_deref(), Some("op-7"));
        assert_ne!(reply.id, request.id);
    }

    #[test]
    fn performative_serializes_upper_case() {
        assert_eq!(serde_json::to_string(&Performative::Inform).unwrap(), "\"INFORM\"");
        assert_eq!(Performative::Request.to_string(), "REQUEST");
    }
}
