//! Configuration loading, validation, and management for Agora.
//!
//! Loads configuration from `~/.agora/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use agora_core::{AgentId, Credentials, ValueTier};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// The root configuration structure.
///
/// Maps directly to `~/.agora/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Seed for every simulated random source (unset = fresh entropy)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,

    /// Message bus settings
    #[serde(default)]
    pub bus: BusConfig,

    /// Periodic disaster sensor
    #[serde(default)]
    pub sensor: SensorConfig,

    /// Rescue state machine
    #[serde(default)]
    pub rescue: RescueConfig,

    /// Recon / coordinator / watchdog collective
    #[serde(default)]
    pub collective: CollectiveConfig,
}

fn default_true() -> bool {
    true
}

#[derive(Clone, Serialize, Deserialize)]
pub struct BusConfig {
    /// Domain every identity on this bus belongs to
    #[serde(default = "default_domain")]
    pub domain: String,

    /// Register unknown identities on first connect
    #[serde(default = "default_true")]
    pub auto_register: bool,

    /// Messages an inbox holds before further sends are dropped
    #[serde(default = "default_inbox_capacity")]
    pub inbox_capacity: usize,

    /// Password every agent presents
    #[serde(default = "default_password")]
    pub password: String,
}

fn default_domain() -> String {
    "localhost".into()
}
fn default_inbox_capacity() -> usize {
    64
}
fn default_password() -> String {
    "password".into()
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            domain: default_domain(),
            auto_register: true,
            inbox_capacity: default_inbox_capacity(),
            password: default_password(),
        }
    }
}

impl std::fmt::Debug for BusConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BusConfig")
            .field("domain", &self.domain)
            .field("auto_register", &self.auto_register)
            .field("inbox_capacity", &self.inbox_capacity)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

impl BusConfig {
    /// Identity for an agent name on this bus.
    pub fn identity(&self, name: &str) -> AgentId {
        AgentId::at(name, &self.domain)
    }

    pub fn credentials(&self) -> Credentials {
        Credentials::new(self.password.clone())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorConfig {
    #[serde(default = "default_sensor_name")]
    pub name: String,

    /// Time between percepts
    #[serde(default = "default_sensor_period_ms")]
    pub period_ms: u64,

    /// Severity level (0–4) at or above which an alert is raised
    #[serde(default = "default_alert_level")]
    pub alert_level: u8,

    /// How long the `sensor` command lets the agent run
    #[serde(default = "default_sensor_run_secs")]
    pub run_secs: u64,
}

fn default_sensor_name() -> String {
    "sensor_agent".into()
}
fn default_sensor_period_ms() -> u64 {
    3000
}
fn default_alert_level() -> u8 {
    3
}
fn default_sensor_run_secs() -> u64 {
    20
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            name: default_sensor_name(),
            period_ms: default_sensor_period_ms(),
            alert_level: default_alert_level(),
            run_secs: default_sensor_run_secs(),
        }
    }
}

impl SensorConfig {
    pub fn period(&self) -> Duration {
        Duration::from_millis(self.period_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RescueConfig {
    #[serde(default = "default_rescue_name")]
    pub name: String,

    /// Completed missions after which the agent shuts down
    #[serde(default = "default_max_missions")]
    pub max_missions: u32,

    /// Severity level (0–4) that triggers a rescue
    #[serde(default = "default_alert_level")]
    pub alert_level: u8,

    /// Number of zones a disaster can be reported in
    #[serde(default = "default_zones")]
    pub zones: u32,

    /// Multiplier applied to every simulated delay (0 = no delays)
    #[serde(default = "default_time_scale")]
    pub time_scale: f64,
}

fn default_rescue_name() -> String {
    "rescue_agent".into()
}
fn default_max_missions() -> u32 {
    2
}
fn default_zones() -> u32 {
    5
}
/// Upper bound for `rescue.time_scale`.
pub const MAX_TIME_SCALE: f64 = 1000.0;

fn default_time_scale() -> f64 {
    1.0
}

impl Default for RescueConfig {
    fn default() -> Self {
        Self {
            name: default_rescue_name(),
            max_missions: default_max_missions(),
            alert_level: default_alert_level(),
            zones: default_zones(),
            time_scale: default_time_scale(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectiveConfig {
    #[serde(default = "default_recon_name")]
    pub recon: String,

    #[serde(default = "default_coordinator_name")]
    pub coordinator: String,

    #[serde(default = "default_watchdog_name")]
    pub watchdog: String,

    /// How long the `collective` command lets the agents run
    #[serde(default = "default_collective_run_secs")]
    pub run_secs: u64,

    /// Bounded wait on each receive
    #[serde(default = "default_receive_timeout_ms")]
    pub receive_timeout_ms: u64,

    #[serde(default = "default_scan_delay_min_ms")]
    pub scan_delay_min_ms: u64,

    #[serde(default = "default_scan_delay_max_ms")]
    pub scan_delay_max_ms: u64,

    /// Lowest value tier worth a heat check
    #[serde(default = "default_escalate_at")]
    pub escalate_at: ValueTier,

    /// Operations proceed only while heat is strictly below this
    #[serde(default = "default_proceed_below")]
    pub proceed_below: u8,

    /// Heat at or above this raises an alert
    #[serde(default = "default_alert_at")]
    pub alert_at: u8,

    /// Chance that a launched operation succeeds
    #[serde(default = "default_success_probability")]
    pub success_probability: f64,

    /// Time the watchdog spends before answering
    #[serde(default = "default_analysis_delay_ms")]
    pub analysis_delay_ms: u64,

    #[serde(default = "default_heat_min")]
    pub heat_min: u8,

    #[serde(default = "default_heat_max")]
    pub heat_max: u8,

    /// Log every message to the process-wide message log
    #[serde(default = "default_true")]
    pub log_messages: bool,
}

fn default_recon_name() -> String {
    "recon".into()
}
fn default_coordinator_name() -> String {
    "main_hacker".into()
}
fn default_watchdog_name() -> String {
    "watchdog".into()
}
fn default_collective_run_secs() -> u64 {
    40
}
fn default_receive_timeout_ms() -> u64 {
    10_000
}
fn default_scan_delay_min_ms() -> u64 {
    3000
}
fn default_scan_delay_max_ms() -> u64 {
    6000
}
fn default_escalate_at() -> ValueTier {
    ValueTier::High
}
fn default_proceed_below() -> u8 {
    70
}
fn default_alert_at() -> u8 {
    85
}
fn default_success_probability() -> f64 {
    0.75
}
fn default_analysis_delay_ms() -> u64 {
    1000
}
fn default_heat_min() -> u8 {
    20
}
fn default_heat_max() -> u8 {
    95
}

impl Default for CollectiveConfig {
    fn default() -> Self {
        Self {
            recon: default_recon_name(),
            coordinator: default_coordinator_name(),
            watchdog: default_watchdog_name(),
            run_secs: default_collective_run_secs(),
            receive_timeout_ms: default_receive_timeout_ms(),
            scan_delay_min_ms: default_scan_delay_min_ms(),
            scan_delay_max_ms: default_scan_delay_max_ms(),
            escalate_at: default_escalate_at(),
            proceed_below: default_proceed_below(),
            alert_at: default_alert_at(),
            success_probability: default_success_probability(),
            analysis_delay_ms: default_analysis_delay_ms(),
            heat_min: default_heat_min(),
            heat_max: default_heat_max(),
            log_messages: true,
        }
    }
}

impl CollectiveConfig {
    pub fn receive_timeout(&self) -> Duration {
        Duration::from_millis(self.receive_timeout_ms)
    }

    pub fn analysis_delay(&self) -> Duration {
        Duration::from_millis(self.analysis_delay_ms)
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.agora/config.toml).
    ///
    /// Environment variables override file values:
    /// - `AGORA_DOMAIN`
    /// - `AGORA_PASSWORD`
    /// - `AGORA_SEED`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        Self::load_from(&config_path)
    }

    /// Load configuration from a specific file path, then apply env overrides.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::read_file(path)?;
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    fn read_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Apply overrides from an environment lookup.
    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        if let Some(domain) = lookup("AGORA_DOMAIN") {
            self.bus.domain = domain;
        }
        if let Some(password) = lookup("AGORA_PASSWORD") {
            self.bus.password = password;
        }
        if let Some(seed) = lookup("AGORA_SEED") {
            let seed = seed.parse().map_err(|_| {
                ConfigError::ValidationError(format!("AGORA_SEED is not a number: {seed}"))
            })?;
            self.seed = Some(seed);
        }
        Ok(())
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".agora")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bus.domain.trim().is_empty() {
            return Err(ConfigError::ValidationError("bus.domain must not be empty".into()));
        }
        if self.bus.inbox_capacity == 0 {
            return Err(ConfigError::ValidationError(
                "bus.inbox_capacity must be > 0".into(),
            ));
        }
        if self.sensor.period_ms == 0 {
            return Err(ConfigError::ValidationError("sensor.period_ms must be > 0".into()));
        }
        if self.sensor.alert_level > 4 || self.rescue.alert_level > 4 {
            return Err(ConfigError::ValidationError(
                "alert_level must be between 0 and 4".into(),
            ));
        }
        if self.rescue.max_missions == 0 {
            return Err(ConfigError::ValidationError(
                "rescue.max_missions must be at least 1".into(),
            ));
        }
        if self.rescue.zones == 0 {
            return Err(ConfigError::ValidationError("rescue.zones must be at least 1".into()));
        }
        if !(0.0..=MAX_TIME_SCALE).contains(&self.rescue.time_scale) {
            return Err(ConfigError::ValidationError(format!(
                "rescue.time_scale must be between 0.0 and {MAX_TIME_SCALE}"
            )));
        }

        let c = &self.collective;
        if !(0.0..=1.0).contains(&c.success_probability) {
            return Err(ConfigError::ValidationError(
                "collective.success_probability must be between 0.0 and 1.0".into(),
            ));
        }
        if c.heat_min > c.heat_max || c.heat_max > 100 {
            return Err(ConfigError::ValidationError(
                "collective.heat_min <= heat_max <= 100 must hold".into(),
            ));
        }
        if c.proceed_below > 100 || c.alert_at > 100 {
            return Err(ConfigError::ValidationError(
                "collective heat thresholds must be <= 100".into(),
            ));
        }
        if c.scan_delay_min_ms > c.scan_delay_max_ms {
            return Err(ConfigError::ValidationError(
                "collective.scan_delay_min_ms must not exceed scan_delay_max_ms".into(),
            ));
        }
        if c.receive_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "collective.receive_timeout_ms must be > 0".into(),
            ));
        }
        let names = [&c.recon, &c.coordinator, &c.watchdog];
        if names.iter().enumerate().any(|(i, a)| names[i + 1..].contains(a)) {
            return Err(ConfigError::ValidationError(
                "collective agent names must be distinct".into(),
            ));
        }

        Ok(())
    }

    /// Generate a default config TOML string (for the `init` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
