//! Periodic disaster sensor.

use agora_config::{AppConfig, SensorConfig};
use agora_core::Result;
use agora_runtime::{AgentContext, AgentRuntime, Cyclic, CyclicBehavior, Flow};
use async_trait::async_trait;
use tracing::{info, warn};

use crate::percept::{Sense, Severity};

/// What the sensor has seen so far.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SensorState {
    pub percepts: u64,
    pub alerts: u64,
    pub last: Option<Severity>,
}

/// Reads a severity every period and raises an alert when it is high.
pub struct MonitorDisaster {
    sense: Box<dyn Sense<Severity>>,
    alert_level: u8,
}

impl MonitorDisaster {
    pub fn new(sense: impl Sense<Severity> + 'static, alert_level: u8) -> Self {
        Self {
            sense: Box::new(sense),
            alert_level,
        }
    }
}

#[async_trait]
impl CyclicBehavior<SensorState> for MonitorDisaster {
    fn name(&self) -> &str {
        "monitor-disaster"
    }

    async fn tick(&mut self, ctx: &AgentContext<SensorState>) -> Result<Flow> {
        let severity = self.sense.sense();
        let level = severity.level();
        info!(agent = %ctx.id(), severity = %severity, level, "Percept received");

        let alert = level >= self.alert_level;
        ctx.with_state(|s| {
            s.percepts += 1;
            s.last = Some(severity);
            if alert {
                s.alerts += 1;
            }
        });

        if alert {
            warn!(agent = %ctx.id(), severity = %severity, "High severity detected, initializing emergency protocol");
        }
        Ok(Flow::Continue)
    }
}

/// Build the sensor agent described by `config.sensor`.
pub fn sensor_agent(
    config: &AppConfig,
    sense: impl Sense<Severity> + 'static,
) -> Result<AgentRuntime<SensorState>> {
    let SensorConfig {
        name,
        alert_level,
        ..
    } = &config.sensor;

    let mut agent = AgentRuntime::new(
        config.bus.identity(name),
        config.bus.credentials(),
        SensorState::default(),
    );
    agent.add_behavior(Cyclic::every(
        MonitorDisaster::new(sense, *alert_level),
        config.sensor.period(),
    ))?;
    Ok(agent)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::percept::Scripted;
    use agora_bus::LocalBus;
    use agora_runtime::ExitReason;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn alerts_on_high_and_catastrophic_only() {
        let config = AppConfig::default();
        let bus = LocalBus::new(config.bus.clone());
        let script = Scripted::new(
            [
                Severity::Normal,
                Severity::High,
                Severity::Medium,
                Severity::Catastrophic,
            ],
            Severity::Low,
        );
        let mut agent = sensor_agent(&config, script).unwrap();
        agent.start(&bus).await.unwrap();

        // Ticks at 0, 3, 6, 9, 12 s
        tokio::time::sleep(Duration::from_millis(13_500)).await;
        agent.stop().await;

        let state = agent.with_state(|s| s.clone());
        assert_eq!(state.percepts, 5);
        assert_eq!(state.alerts, 2);
        assert_eq!(state.last, Some(Severity::Low));
        assert_eq!(agent.exit_reason(), Some(ExitReason::Stopped));
    }
}
