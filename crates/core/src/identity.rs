//! Agent identities and connection credentials.

use serde::{Deserialize, Serialize};

/// Unique address of an agent on the message bus (e.g. `watchdog@localhost`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentId(String);

impl AgentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Build `name@domain`.
    pub fn at(name: &str, domain: &str) -> Self {
        Self(format!("{name}@{domain}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The part before `@`, or the whole identity if there is none.
    pub fn local_part(&self) -> &str {
        self.0.split_once('@').map_or(self.0.as_str(), |(local, _)| local)
    }

    /// The part after `@`, if any.
    pub fn domain(&self) -> Option<&str> {
        self.0.split_once('@').map(|(_, domain)| domain)
    }
}

impl std::fmt::Display for AgentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for AgentId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Secret presented when an identity connects to the bus.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    password: String,
}

impl Credentials {
    pub fn new(password: impl Into<String>) -> Self {
        Self {
            password: password.into(),
        }
    }

    pub fn password(&self) -> &str {
        &self.password
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("password", &"[REDACTED]")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_part_and_domain() {
        let id = AgentId::at("main_hacker", "localhost");
        assert_eq!(id.as_str(), "main_hacker@localhost");
        assert_eq!(id.local_part(), "main_hacker");
        assert_eq!(id.domain(), Some("localhost"));
    }

    #[test]
    fn bare_identity_has_no_domain() {
        let id = AgentId::new("loner");
        assert_eq!(id.local_part(), "loner");
        assert_eq!(id.domain(), None);
    }

    #[test]
    fn credentials_debug_is_redacted() {
        let creds = Credentials::new("hunter2");
        let debug = format!("{creds:?}");
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("REDACTED"));
    }

    #[test]
    fn agent_id_serializes_as_plain_string() {
        let json = serde_json::to_string(&AgentId::new("recon@localhost")).unwrap();
        assert_eq!(json, "\"recon@localhost\"");
    }
}
