//! Recon: scans for vulnerable systems and reports each find.

use std::time::Duration;

use agora_core::{AgentId, Payload, Result, TargetReport};
use agora_runtime::{AgentContext, CyclicBehavior, Flow};
use async_trait::async_trait;
use tracing::info;

use crate::percept::Sense;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconState {
    pub scans: u64,
}

/// Waits a scan delay, picks a target, and informs the coordinator.
pub struct Scan {
    coordinator: AgentId,
    delay: Box<dyn Sense<Duration>>,
    target: Box<dyn Sense<TargetReport>>,
}

impl Scan {
    pub fn new(
        coordinator: AgentId,
        delay: Box<dyn Sense<Duration>>,
        target: Box<dyn Sense<TargetReport>>,
    ) -> Self {
        Self {
            coordinator,
            delay,
            target,
        }
    }
}

#[async_trait]
impl CyclicBehavior<ReconState> for Scan {
    fn name(&self) -> &str {
        "scan"
    }

    async fn tick(&mut self, ctx: &AgentContext<ReconState>) -> Result<Flow> {
        ctx.sleep(self.delay.sense()).await;
        if ctx.is_stopping() {
            return Ok(Flow::Done);
        }

        let target = self.target.sense();
        info!(agent = %ctx.id(), "Scanning network");
        info!(
            agent = %ctx.id(),
            target_name = %target.target_name,
            vulnerability = %target.vulnerability_type,
            value = %target.value_tier,
            "Target discovered"
        );

        ctx.with_state(|s| s.scans += 1);
        let name = target.target_name.clone();
        ctx.send(&self.coordinator, &Payload::TargetDiscovered(target))
            .await?;
        info!(agent = %ctx.id(), to = %self.coordinator, target_name = %name, "INFORM sent");

        Ok(Flow::Continue)
    }
}
