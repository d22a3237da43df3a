//! Message log: an append-only record of every message sent during a run.
//!
//! One log is created at the start of a run, shared by every agent through an
//! `Arc`, and read back when the run ends. Appends are atomic; reads return a
//! snapshot.

use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::identity::AgentId;
use crate::message::{Message, Performative};

/// A single log entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageLogEntry {
    pub timestamp: DateTime<Utc>,
    pub from: AgentId,
    pub to: AgentId,
    pub performative: Performative,
    pub summary: String,
}

impl MessageLogEntry {
    /// Summarize a message. Undecodable bodies are logged as such.
    pub fn from_message(message: &Message) -> Self {
        let summary = match message.decode() {
            Ok(payload) => payload.summary(),
            Err(_) => "Unparseable payload".to_string(),
        };
        Self {
            timestamp: message.sent_at,
            from: message.sender.clone(),
            to: message.recipient.clone(),
            performative: message.performative,
            summary,
        }
    }
}

/// Where log entries are forwarded as they are appended.
pub trait LogSink: Send + Sync {
    fn record(&self, entry: &MessageLogEntry);
}

/// Process-wide message log shared by all agents of a run.
pub struct MessageLog {
    entries: Mutex<Vec<MessageLogEntry>>,
    sinks: Vec<Box<dyn LogSink>>,
}

impl std::fmt::Debug for MessageLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageLog")
            .field("entry_count", &self.count())
            .field("sink_count", &self.sinks.len())
            .finish()
    }
}

impl Default for MessageLog {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageLog {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            sinks: Vec::new(),
        }
    }

    pub fn with_sinks(sinks: Vec<Box<dyn LogSink>>) -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            sinks,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<MessageLogEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append a sent message.
    pub fn record(&self, message: &Message) {
        let entry = MessageLogEntry::from_message(message);
        self.lock().push(entry.clone());

        for sink in &self.sinks {
            sink.record(&entry);
        }
    }

    /// Snapshot of all entries, in append order.
    pub fn entries(&self) -> Vec<MessageLogEntry> {
        self.lock().clone()
    }

    pub fn entries_by_performative(&self, performative: Performative) -> Vec<MessageLogEntry> {
        self.lock()
            .iter()
            .filter(|e| e.performative == performative)
            .cloned()
            .collect()
    }

    pub fn count(&self) -> usize {
        self.lock().len()
    }
}

/// Writes every entry as a `tracing` event.
pub struct TracingSink;

impl LogSink for TracingSink {
    fn record(&self, entry: &MessageLogEntry) {
        tracing::info!(
            from = %entry.from,
            to = %entry.to,
            performative = %entry.performative,
            summary = %entry.summary,
            "ACL"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::{HeatReport, Payload};
    use std::sync::Arc;

    fn heat_message(level: u8) -> Message {
        Message::encode(
            AgentId::new("watchdog@localhost"),
            AgentId::new("main_hacker@localhost"),
            Performative::Inform,
            &Payload::HeatStatus(HeatReport::from_level(level)),
        )
        .unwrap()
    }

    #[test]
    fn record_and_read_back() {
        let log = MessageLog::new();
        log.record(&heat_message(42));
        log.record(&heat_message(90));

        let entries = log.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].summary, "Heat level: 42% - SAFE");
        assert_eq!(entries[1].summary, "Heat level: 90% - CRITICAL");
        assert_eq!(entries[0].from.local_part(), "watchdog");
    }

    #[test]
    fn unparseable_body_is_still_logged() {
        let log = MessageLog::new();
        log.record(&Message::raw(
            AgentId::new("a@localhost"),
            AgentId::new("b@localhost"),
            Performative::Inform,
            "???",
        ));
        assert_eq!(log.entries()[0].summary, "Unparseable payload");
    }

    #[test]
    fn filter_by_performative() {
        let log = MessageLog::new();
        log.record(&heat_message(10));
        log.record(
            &Message::encode(
                AgentId::new("main_hacker@localhost"),
                AgentId::new("watchdog@localhost"),
                Performative::Request,
                &Payload::CheckHeatLevel {
                    target_name: "Corp-WiFi".into(),
                },
            )
            .unwrap(),
        );

        assert_eq!(log.entries_by_performative(Performative::Request).len(), 1);
        assert_eq!(log.entries_by_performative(Performative::Inform).len(), 1);
    }

    #[test]
    fn concurrent_appends_are_not_lost() {
        let log = Arc::new(MessageLog::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let log = log.clone();
                std::thread::spawn(move || {
                    for level in 0..50 {
                        log.record(&heat_message(level));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(log.count(), 400);
    }

    #[test]
    fn custom_sink_receives_entries() {
        struct Collect(Arc<Mutex<Vec<String>>>);

        impl LogSink for Collect {
            fn record(&self, entry: &MessageLogEntry) {
                self.0.lock().unwrap().push(entry.summary.clone());
            }
        }

        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = MessageLog::with_sinks(vec![Box::new(Collect(seen.clone()))]);
        log.record(&heat_message(55));

        assert_eq!(*seen.lock().unwrap(), vec!["Heat level: 55% - ELEVATED".to_string()]);
    }

    #[test]
    fn debug_format() {
        let log = MessageLog::default();
        let debug_str = format!("{log:?}");
        assert!(debug_str.contains("MessageLog"));
        assert!(debug_str.contains("entry_count"));
    }
}
