//! Typed message payloads.
//!
//! The set of things agents can say to each other is closed: every payload is
//! one variant of [`Payload`], tagged on the wire by its `action` field.

use serde::{Deserialize, Serialize};

use crate::message::Performative;

/// How valuable a discovered target is. Ordered from least to most valuable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueTier {
    Low,
    Medium,
    High,
    Critical,
}

impl std::fmt::Display for ValueTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ValueTier::Low => "low",
            ValueTier::Medium => "medium",
            ValueTier::High => "high",
            ValueTier::Critical => "critical",
        };
        f.write_str(name)
    }
}

/// Threat classification attached to a heat level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HeatStatus {
    Safe,
    Elevated,
    Critical,
}

impl HeatStatus {
    /// `< 50` is safe, `< 70` elevated, anything else critical.
    pub fn from_level(level: u8) -> Self {
        match level {
            0..50 => HeatStatus::Safe,
            50..70 => HeatStatus::Elevated,
            _ => HeatStatus::Critical,
        }
    }
}

impl std::fmt::Display for HeatStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            HeatStatus::Safe => "SAFE",
            HeatStatus::Elevated => "ELEVATED",
            HeatStatus::Critical => "CRITICAL",
        };
        f.write_str(name)
    }
}

/// Intel about a vulnerable system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetReport {
    pub target_name: String,
    pub vulnerability_type: String,
    pub value_tier: ValueTier,
}

/// Security heat reading. `heat_level` is a percentage (0–100).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeatReport {
    pub heat_level: u8,
    pub status: HeatStatus,
}

impl HeatReport {
    /// Build a report whose status is derived from the level.
    pub fn from_level(heat_level: u8) -> Self {
        Self {
            heat_level,
            status: HeatStatus::from_level(heat_level),
        }
    }
}

/// Every payload an agent can send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Payload {
    /// Recon found something worth attacking.
    TargetDiscovered(TargetReport),

    /// Ask the watchdog how hot things are.
    CheckHeatLevel { target_name: String },

    /// The watchdog's answer.
    HeatStatus(HeatReport),
}

/// Discriminant of [`Payload`], used as the dispatch key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    TargetDiscovered,
    CheckHeatLevel,
    HeatStatus,
}

impl MessageKind {
    /// The only performative this kind of payload may travel under.
    pub fn performative(self) -> Performative {
        match self {
            MessageKind::TargetDiscovered | MessageKind::HeatStatus => Performative::Inform,
            MessageKind::CheckHeatLevel => Performative::Request,
        }
    }
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            MessageKind::TargetDiscovered => "target_discovered",
            MessageKind::CheckHeatLevel => "check_heat_level",
            MessageKind::HeatStatus => "heat_status",
        };
        f.write_str(name)
    }
}

impl Payload {
    pub fn kind(&self) -> MessageKind {
        match self {
            Payload::TargetDiscovered(_) => MessageKind::TargetDiscovered,
            Payload::CheckHeatLevel { .. } => MessageKind::CheckHeatLevel,
            Payload::HeatStatus(_) => MessageKind::HeatStatus,
        }
    }

    /// One-line human summary, as written to the message log.
    pub fn summary(&self) -> String {
        match self {
            Payload::TargetDiscovered(target) => {
                format!("Target discovered: {}", target.target_name)
            }
            Payload::CheckHeatLevel { target_name } => {
                format!("Check heat level for {target_name}")
            }
            Payload::HeatStatus(report) => {
                format!("Heat level: {}% - {}", report.heat_level, report.status)
            }
        }
    }
}
