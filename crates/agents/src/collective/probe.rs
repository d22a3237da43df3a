//! A one-off heat check that waits for its answer.

use std::time::Duration;

use agora_config::AppConfig;
use agora_core::{HeatReport, Payload, Result};
use agora_runtime::{AgentContext, AgentRuntime, CyclicBehavior, Flow, OneShot};
use async_trait::async_trait;
use tracing::{info, warn};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProbeState {
    pub reply: Option<HeatReport>,
}

pub struct HeatProbe {
    watchdog: agora_core::AgentId,
    target: String,
    timeout: Duration,
}

#[async_trait]
impl CyclicBehavior<ProbeState> for HeatProbe {
    fn name(&self) -> &str {
        "heat-probe"
    }

    async fn tick(&mut self, ctx: &AgentContext<ProbeState>) -> Result<Flow> {
        let request = Payload::CheckHeatLevel {
            target_name: self.target.clone(),
        };
        info!(agent = %ctx.id(), to = %self.watchdog, target_name = %self.target, "Probing heat");

        let Some(reply) = ctx.request(&self.watchdog, &request, self.timeout).await? else {
            warn!(agent = %ctx.id(), to = %self.watchdog, "No reply to heat probe");
            return Ok(Flow::Done);
        };

        match reply.decode()? {
            Payload::HeatStatus(report) => {
                info!(agent = %ctx.id(), heat_level = report.heat_level, status = %report.status, "Probe answered");
                ctx.with_state(|s| s.reply = Some(report));
            }
            other => warn!(agent = %ctx.id(), kind = %other.kind(), "Unexpected answer to probe"),
        }
        Ok(Flow::Done)
    }
}

/// Build a probe agent called `name` that asks the collective's watchdog
/// about `target`.
pub fn probe_agent(config: &AppConfig, name: &str, target: &str) -> Result<AgentRuntime<ProbeState>> {
    let collective = &config.collective;
    let mut agent = AgentRuntime::new(
        config.bus.identity(name),
        config.bus.credentials(),
        ProbeState::default(),
    );
    agent.add_behavior(OneShot::new(HeatProbe {
        watchdog: config.bus.identity(&collective.watchdog),
        target: target.to_string(),
        timeout: collective.receive_timeout() + collective.analysis_delay(),
    }))?;
    Ok(agent)
}
