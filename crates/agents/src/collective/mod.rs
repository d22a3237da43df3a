//! The collective: recon, a coordinator, and a watchdog talking over the bus.
//!
//! # Message flow
//!
//! ```text
//! recon ──INFORM target_discovered──► coordinator
//!                                        │ value >= escalate_at
//!                                        ▼
//!                 coordinator ──REQUEST check_heat_level──► watchdog
//!                 coordinator ◄──INFORM heat_status──────── watchdog
//!                      │
//!                      ├─ heat >= alert_at      → heat alert
//!                      ├─ heat <  proceed_below → execute (success / failure)
//!                      └─ otherwise             → abort
//! ```

pub mod coordinator;
pub mod probe;
pub mod recon;
pub mod targets;
pub mod watchdog;

use std::sync::Arc;
use std::time::Duration;

use agora_config::{AppConfig, CollectiveConfig};
use agora_core::{EventBus, MessageKind, MessageLog, Result, TargetReport, Transport};
use agora_runtime::{AgentRuntime, Cyclic, Dispatcher};
use rand::Rng;
use serde::Serialize;
use tracing::info;

use crate::percept::{self, Sense};
pub use coordinator::{CoordinatorStats, HeatPolicy, OnHeat, OnTarget};
pub use probe::{HeatProbe, ProbeState, probe_agent};
pub use recon::{ReconState, Scan};
pub use watchdog::{OnHeatCheck, WatchdogStats};

/// Every source of chance in a collective run.
pub struct CollectiveSenses {
    pub scan_delay: Box<dyn Sense<Duration>>,
    pub target: Box<dyn Sense<TargetReport>>,
    pub heat: Box<dyn Sense<u8>>,
    pub outcome: Box<dyn Sense<bool>>,
}

impl CollectiveSenses {
    /// Random senses within the configured ranges. Reproducible when
    /// `seed` is set.
    pub fn random(config: &CollectiveConfig, seed: Option<u64>) -> Self {
        let (delay_min, delay_max) = (config.scan_delay_min_ms, config.scan_delay_max_ms);
        let (heat_min, heat_max) = (config.heat_min, config.heat_max);
        let success_probability = config.success_probability;

        let mut delay_rng = percept::rng(seed, 1);
        let mut target_rng = percept::rng(seed, 2);
        let mut heat_rng = percept::rng(seed, 3);
        let mut outcome_rng = percept::rng(seed, 4);

        Self {
            scan_delay: Box::new(move || {
                Duration::from_millis(delay_rng.random_range(delay_min..=delay_max))
            }),
            target: Box::new(move || {
                targets::CATALOG[target_rng.random_range(0..targets::CATALOG.len())].report()
            }),
            heat: Box::new(move || heat_rng.random_range(heat_min..=heat_max)),
            outcome: Box::new(move || outcome_rng.random_bool(success_probability)),
        }
    }
}

/// End-of-run numbers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OperationSummary {
    pub targets_scanned: u64,
    pub coordinator: CoordinatorStats,
    pub watchdog: WatchdogStats,
    pub total_messages: usize,
}

/// The three collective agents, wired to each other.
pub struct Collective {
    pub recon: AgentRuntime<ReconState>,
    pub coordinator: AgentRuntime<CoordinatorStats>,
    pub watchdog: AgentRuntime<WatchdogStats>,
    message_log: Option<Arc<MessageLog>>,
}

impl Collective {
    pub fn new(
        config: &AppConfig,
        senses: CollectiveSenses,
        events: Option<Arc<EventBus>>,
        message_log: Option<Arc<MessageLog>>,
    ) -> Result<Self> {
        let c = &config.collective;
        let coordinator_id = config.bus.identity(&c.coordinator);
        let watchdog_id = config.bus.identity(&c.watchdog);
        let policy = HeatPolicy {
            proceed_below: c.proceed_below,
            alert_at: c.alert_at,
        };

        let mut recon = AgentRuntime::new(
            config.bus.identity(&c.recon),
            config.bus.credentials(),
            ReconState::default(),
        );
        recon.add_behavior(Cyclic::new(Scan::new(
            coordinator_id.clone(),
            senses.scan_delay,
            senses.target,
        )))?;

        let mut coordinator =
            AgentRuntime::new(coordinator_id, config.bus.credentials(), CoordinatorStats::default());
        coordinator.add_behavior(Cyclic::new(
            Dispatcher::new("coordinate", c.receive_timeout())
                .on(
                    MessageKind::TargetDiscovered,
                    OnTarget::new(watchdog_id.clone(), c.escalate_at),
                )
                .on(MessageKind::HeatStatus, OnHeat::new(policy, senses.outcome)),
        ))?;

        let mut watchdog =
            AgentRuntime::new(watchdog_id, config.bus.credentials(), WatchdogStats::default());
        watchdog.add_behavior(Cyclic::new(
            Dispatcher::new("watch", c.receive_timeout()).on(
                MessageKind::CheckHeatLevel,
                OnHeatCheck::new(senses.heat, c.analysis_delay(), c.alert_at),
            ),
        ))?;

        Ok(Self {
            recon: attach(recon, &events, &message_log),
            coordinator: attach(coordinator, &events, &message_log),
            watchdog: attach(watchdog, &events, &message_log),
            message_log,
        })
    }

    /// Start the listeners first so recon's first report has somewhere to go.
    /// If any agent fails to connect, the ones already running are stopped.
    pub async fn start(&mut self, transport: &dyn Transport) -> Result<()> {
        self.watchdog.start(transport).await?;
        if let Err(e) = self.coordinator.start(transport).await {
            self.watchdog.stop().await;
            return Err(e);
        }
        if let Err(e) = self.recon.start(transport).await {
            self.coordinator.stop().await;
            self.watchdog.stop().await;
            return Err(e);
        }
        info!("Collective operational");
        Ok(())
    }

    /// Stop recon first, then the agents it talks to.
    pub async fn stop(&mut self) {
        self.recon.stop().await;
        self.coordinator.stop().await;
        self.watchdog.stop().await;
        info!("Collective offline");
    }

    pub fn summary(&self) -> OperationSummary {
        OperationSummary {
            targets_scanned: self.recon.with_state(|s| s.scans),
            coordinator: self.coordinator.with_state(|s| s.clone()),
            watchdog: self.watchdog.with_state(|s| s.clone()),
            total_messages: self.message_log.as_ref().map_or(0, |log| log.count()),
        }
    }

    pub fn message_log(&self) -> Option<&Arc<MessageLog>> {
        self.message_log.as_ref()
    }
}

fn attach<S: Send + 'static>(
    agent: AgentRuntime<S>,
    events: &Option<Arc<EventBus>>,
    message_log: &Option<Arc<MessageLog>>,
) -> AgentRuntime<S> {
    let agent = match events {
        Some(events) => agent.with_events(events.clone()),
        None => agent,
    };
    match message_log {
        Some(log) => agent.with_message_log(log.clone()),
        None => agent,
    }
}
