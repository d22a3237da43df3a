//! The systems recon can stumble upon.

use agora_core::{TargetReport, ValueTier};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Target {
    pub kind: &'static str,
    pub name: &'static str,
    pub vulnerability: &'static str,
    pub value: ValueTier,
}

impl Target {
    pub fn report(&self) -> TargetReport {
        TargetReport {
            target_name: self.name.to_string(),
            vulnerability_type: self.vulnerability.to_string(),
            value_tier: self.value,
        }
    }
}

pub static CATALOG: [Target; 5] = [
    Target {
        kind: "database",
        name: "FinanceCorp SQL",
        vulnerability: "SQL Injection",
        value: ValueTier::High,
    },
    Target {
        kind: "server",
        name: "GovServer-42",
        vulnerability: "Unpatched CVE",
        value: ValueTier::Critical,
    },
    Target {
        kind: "network",
        name: "Corp-WiFi",
        vulnerability: "Weak encryption",
        value: ValueTier::Medium,
    },
    Target {
        kind: "api",
        name: "PaymentAPI",
        vulnerability: "Auth bypass",
        value: ValueTier::High,
    },
    Target {
        kind: "webapp",
        name: "AdminPanel",
        vulnerability: "Default creds",
        value: ValueTier::Low,
    },
];

/// Look a target up by name.
pub fn find(name: &str) -> Option<&'static Target> {
    CATALOG.iter().find(|t| t.name == name)
}
