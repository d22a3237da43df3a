//! Rescue agent driven by a finite state machine.
//!
//! ```text
//! IDLE ─► MONITORING ─┬─► ALERT ─► RESPONDING ─► RESCUE ─► COMPLETED
//!            ▲   │    │                                        │
//!            └───┘    └────────────────────────────────────────┘
//! ```
//!
//! MONITORING loops on itself until a severe enough disaster is sensed.
//! COMPLETED counts the mission and either goes back to MONITORING or, once
//! `max_missions` is reached, ends the machine and the agent with it.

use std::time::Duration;

use agora_config::{AppConfig, RescueConfig};
use agora_core::{ProtocolError, Result};
use agora_runtime::{AgentContext, AgentRuntime, FsmHooks, Next, State, StateMachine};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::percept::{Sense, Severity};

pub const IDLE: &str = "IDLE";
pub const MONITORING: &str = "MONITORING";
pub const ALERT: &str = "ALERT";
pub const RESPONDING: &str = "RESPONDING";
pub const RESCUE: &str = "RESCUE";
pub const COMPLETED: &str = "COMPLETED";

pub const STATES: [&str; 6] = [IDLE, MONITORING, ALERT, RESPONDING, RESCUE, COMPLETED];

const RESCUE_OPERATIONS: [&str; 4] = [
    "Evacuating victims",
    "Providing medical aid",
    "Securing perimeter",
    "Clearing debris",
];

/// A disaster noticed while monitoring.
#[derive(Debug, Clone, PartialEq)]
pub struct DisasterEvent {
    pub severity: Severity,
    pub zone: String,
    pub detected_at: DateTime<Utc>,
}

/// Fields of the rescue agent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RescueState {
    pub current_event: Option<DisasterEvent>,
    pub missions_completed: u32,
    pub max_missions: u32,
}

impl RescueState {
    pub fn new(max_missions: u32) -> Self {
        Self {
            max_missions,
            ..Self::default()
        }
    }

    fn zone(&self) -> String {
        self.current_event
            .as_ref()
            .map_or_else(|| "unknown zone".to_string(), |e| e.zone.clone())
    }
}

/// Scales the simulated durations of every state.
#[derive(Debug, Clone, Copy)]
struct Pace {
    scale: f64,
}

impl Pace {
    /// Saturates instead of overflowing for scales that skipped validation.
    fn secs(self, secs: f64) -> Duration {
        Duration::try_from_secs_f64(secs * self.scale).unwrap_or(Duration::MAX)
    }
}

struct Idle {
    pace: Pace,
}

#[async_trait]
impl State<RescueState> for Idle {
    async fn run(&mut self, ctx: &AgentContext<RescueState>) -> Result<Next> {
        info!(agent = %ctx.id(), "Agent is idle, awaiting activation");
        ctx.sleep(self.pace.secs(1.0)).await;
        Ok(Next::go(MONITORING))
    }
}

struct Monitoring {
    severity: Box<dyn Sense<Severity>>,
    zone: Box<dyn Sense<u32>>,
    alert_level: u8,
    pace: Pace,
}

#[async_trait]
impl State<RescueState> for Monitoring {
    async fn run(&mut self, ctx: &AgentContext<RescueState>) -> Result<Next> {
        info!(agent = %ctx.id(), "Monitoring disaster zones");

        let severity = self.severity.sense();
        let event = DisasterEvent {
            severity,
            zone: format!("Zone-{}", self.zone.sense()),
            detected_at: Utc::now(),
        };
        info!(
            agent = %ctx.id(),
            severity = %severity,
            level = severity.level(),
            zone = %event.zone,
            "Sensor report"
        );
        ctx.with_state(|s| s.current_event = Some(event));

        ctx.sleep(self.pace.secs(2.0)).await;

        if severity.level() >= self.alert_level {
            warn!(agent = %ctx.id(), severity = %severity, "Event triggered: high severity detected");
            Ok(Next::go(ALERT))
        } else {
            Ok(Next::go(MONITORING))
        }
    }
}

struct Alert {
    pace: Pace,
}

#[async_trait]
impl State<RescueState> for Alert {
    async fn run(&mut self, ctx: &AgentContext<RescueState>) -> Result<Next> {
        let zone = ctx.with_state(|s| s.zone());
        warn!(agent = %ctx.id(), zone = %zone, "Emergency, goal activated: initiate rescue operation");
        ctx.sleep(self.pace.secs(1.0)).await;
        Ok(Next::go(RESPONDING))
    }
}

struct Responding {
    pace: Pace,
}

#[async_trait]
impl State<RescueState> for Responding {
    async fn run(&mut self, ctx: &AgentContext<RescueState>) -> Result<Next> {
        let zone = ctx.with_state(|s| s.zone());
        info!(agent = %ctx.id(), zone = %zone, "Dispatching");
        for leg in 1..=3 {
            ctx.sleep(self.pace.secs(1.0)).await;
            info!(agent = %ctx.id(), "En route ({leg}/3)");
        }
        info!(agent = %ctx.id(), zone = %zone, "Arrived");
        Ok(Next::go(RESCUE))
    }
}

struct Rescue {
    pace: Pace,
}

#[async_trait]
impl State<RescueState> for Rescue {
    async fn run(&mut self, ctx: &AgentContext<RescueState>) -> Result<Next> {
        let zone = ctx.with_state(|s| s.zone());
        info!(agent = %ctx.id(), zone = %zone, "Performing rescue operation");
        for operation in RESCUE_OPERATIONS {
            ctx.sleep(self.pace.secs(1.5)).await;
            info!(agent = %ctx.id(), "{operation}...");
        }
        info!(agent = %ctx.id(), zone = %zone, "Rescue operation successful");
        Ok(Next::go(COMPLETED))
    }
}

struct Completed {
    pace: Pace,
}

#[async_trait]
impl State<RescueState> for Completed {
    async fn run(&mut self, ctx: &AgentContext<RescueState>) -> Result<Next> {
        info!(agent = %ctx.id(), "Mission completed, goal achieved");
        ctx.sleep(self.pace.secs(2.0)).await;

        let (done, max) = ctx.with_state(|s| {
            s.missions_completed += 1;
            (s.missions_completed, s.max_missions)
        });

        if done >= max {
            info!(agent = %ctx.id(), missions = done, "Maximum missions reached, shutting down");
            Ok(Next::Terminal)
        } else {
            info!(agent = %ctx.id(), missions = done, "Returning to monitoring");
            Ok(Next::go(MONITORING))
        }
    }
}

struct RescueHooks;

#[async_trait]
impl FsmHooks<RescueState> for RescueHooks {
    async fn on_start(&mut self, ctx: &AgentContext<RescueState>) {
        let max = ctx.with_state(|s| s.max_missions);
        info!(
            agent = %ctx.id(),
            states = ?STATES,
            max_missions = max,
            "Rescue FSM starting: monitor zones, respond to high severity, complete missions"
        );
    }

    async fn on_end(&mut self, ctx: &AgentContext<RescueState>) {
        let missions = ctx.with_state(|s| s.missions_completed);
        info!(agent = %ctx.id(), missions, "FSM execution complete");
    }
}

/// The rescue state machine, with its transition table.
pub fn rescue_machine(
    config: &RescueConfig,
    severity: impl Sense<Severity> + 'static,
    zone: impl Sense<u32> + 'static,
) -> std::result::Result<StateMachine<RescueState>, ProtocolError> {
    let pace = Pace {
        scale: config.time_scale,
    };

    let mut fsm = StateMachine::new("rescue").with_hooks(RescueHooks);
    fsm.add_state(IDLE, Idle { pace }, true)?;
    fsm.add_state(
        MONITORING,
        Monitoring {
            severity: Box::new(severity),
            zone: Box::new(zone),
            alert_level: config.alert_level,
            pace,
        },
        false,
    )?;
    fsm.add_state(ALERT, Alert { pace }, false)?;
    fsm.add_state(RESPONDING, Responding { pace }, false)?;
    fsm.add_state(RESCUE, Rescue { pace }, false)?;
    fsm.add_state(COMPLETED, Completed { pace }, false)?;

    for (from, to) in [
        (IDLE, MONITORING),
        (MONITORING, MONITORING),
        (MONITORING, ALERT),
        (ALERT, RESPONDING),
        (RESPONDING, RESCUE),
        (RESCUE, COMPLETED),
        (COMPLETED, MONITORING),
    ] {
        fsm.add_transition(from, to)?;
    }
    Ok(fsm)
}

/// Build the rescue agent described by `config.rescue`.
pub fn rescue_agent(
    config: &AppConfig,
    severity: impl Sense<Severity> + 'static,
    zone: impl Sense<u32> + 'static,
) -> Result<AgentRuntime<RescueState>> {
    let rescue = &config.rescue;
    let mut agent = AgentRuntime::new(
        config.bus.identity(&rescue.name),
        config.bus.credentials(),
        RescueState::new(rescue.max_missions),
    );
    agent.add_behavior(rescue_machine(rescue, severity, zone)?)?;
    Ok(agent)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::percept::Scripted;
    use agora_bus::LocalBus;
    use agora_core::{EventBus, RuntimeEvent};
    use agora_runtime::ExitReason;
    use std::sync::Arc;

    #[test]
    fn transition_table_matches_the_diagram() {
        let fsm = rescue_machine(
            &RescueConfig::default(),
            Scripted::new([], Severity::Normal),
            Scripted::new([], 1),
        )
        .unwrap();

        assert!(fsm.can_transition(MONITORING, MONITORING));
        assert!(fsm.can_transition(COMPLETED, MONITORING));
        assert!(!fsm.can_transition(ALERT, COMPLETED));
        assert!(!fsm.can_transition(IDLE, ALERT));
        assert!(!fsm.can_transition(COMPLETED, IDLE));
    }

    #[tokio::test(start_paused = true)]
    async fn single_mission_when_max_is_one() {
        let mut config = AppConfig::default();
        config.rescue.max_missions = 1;
        let bus = LocalBus::new(config.bus.clone());
        let events = Arc::new(EventBus::default());
        let mut rx = events.subscribe();

        let mut agent = rescue_agent(
            &config,
            Scripted::new([Severity::Catastrophic], Severity::Normal),
            Scripted::new([4], 1),
        )
        .unwrap()
        .with_events(events);
        agent.start(&bus).await.unwrap();

        assert_eq!(agent.join().await, Some(ExitReason::Completed));
        let state = agent.with_state(|s| s.clone());
        assert_eq!(state.missions_completed, 1);
        let event = state.current_event.unwrap();
        assert_eq!(event.zone, "Zone-4");
        assert_eq!(event.severity, Severity::Catastrophic);

        let mut path = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let RuntimeEvent::StateEntered { state, .. } = event.as_ref() {
                path.push(state.clone());
            }
        }
        assert_eq!(path, vec![IDLE, MONITORING, ALERT, RESPONDING, RESCUE, COMPLETED]);
    }

    #[test]
    fn huge_scales_saturate() {
        assert_eq!(Pace { scale: 1e300 }.secs(1.0), Duration::MAX);
        assert_eq!(Pace { scale: 0.5 }.secs(3.0), Duration::from_millis(1500));
    }

    #[tokio::test(start_paused = true)]
    async fn durations_follow_time_scale() {
        let mut config = AppConfig::default();
        config.rescue.max_missions = 1;
        config.rescue.time_scale = 0.5;
        let bus = LocalBus::new(config.bus.clone());

        let mut agent = rescue_agent(
            &config,
            Scripted::new([], Severity::High),
            Scripted::new([], 2),
        )
        .unwrap();

        let started = tokio::time::Instant::now();
        agent.start(&bus).await.unwrap();
        agent.join().await;

        // 1 + 2 + 1 + 3 + 6 + 2 seconds at half speed
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(7500), "{elapsed:?}");
        assert!(elapsed < Duration::from_millis(7600), "{elapsed:?}");
    }
}
