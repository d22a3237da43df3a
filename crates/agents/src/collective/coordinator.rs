//! Coordinator: weighs intel, asks the watchdog before acting, and runs
//! operations only while the heat is low.

use agora_core::{AgentId, HeatReport, Payload, Result, ValueTier};
use agora_runtime::{AgentContext, Envelope, Handler};
use async_trait::async_trait;
use serde::Serialize;
use tracing::{info, warn};

use crate::percept::Sense;

/// Everything the coordinator has decided so far.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CoordinatorStats {
    pub operations_planned: u64,
    pub targets_skipped: u64,
    pub heat_alerts: u64,
    pub operations_executed: u64,
    pub successful_ops: u64,
    pub failed_ops: u64,
    pub operations_aborted: u64,
}

/// Heat thresholds the coordinator acts on.
#[derive(Debug, Clone, Copy)]
pub struct HeatPolicy {
    /// Operations run only while heat is strictly below this.
    pub proceed_below: u8,
    /// Heat at or above this counts as an alert.
    pub alert_at: u8,
}

impl Default for HeatPolicy {
    fn default() -> Self {
        Self {
            proceed_below: 70,
            alert_at: 85,
        }
    }
}

/// Handles `target_discovered`: escalate valuable targets to the watchdog.
pub struct OnTarget {
    watchdog: AgentId,
    escalate_at: ValueTier,
}

impl OnTarget {
    pub fn new(watchdog: AgentId, escalate_at: ValueTier) -> Self {
        Self {
            watchdog,
            escalate_at,
        }
    }
}

#[async_trait]
impl Handler<CoordinatorStats> for OnTarget {
    async fn handle(&mut self, ctx: &AgentContext<CoordinatorStats>, envelope: Envelope) -> Result<()> {
        let Payload::TargetDiscovered(target) = envelope.payload else {
            return Ok(());
        };
        info!(
            agent = %ctx.id(),
            from = %envelope.message.sender,
            target_name = %target.target_name,
            vulnerability = %target.vulnerability_type,
            "INFORM received"
        );

        if target.value_tier < self.escalate_at {
            info!(agent = %ctx.id(), value = %target.value_tier, "Low-value target, skipping");
            ctx.with_state(|s| s.targets_skipped += 1);
            return Ok(());
        }

        info!(agent = %ctx.id(), value = %target.value_tier, "High-value target, initiating operation");
        ctx.send(
            &self.watchdog,
            &Payload::CheckHeatLevel {
                target_name: target.target_name,
            },
        )
        .await?;
        ctx.with_state(|s| s.operations_planned += 1);
        info!(agent = %ctx.id(), to = %self.watchdog, "REQUEST sent: check heat level");
        Ok(())
    }
}

/// Handles `heat_status`: proceed, abort, or alert.
pub struct OnHeat {
    policy: HeatPolicy,
    outcome: Box<dyn Sense<bool>>,
}

impl OnHeat {
    /// `outcome` decides whether an executed operation succeeds.
    pub fn new(policy: HeatPolicy, outcome: Box<dyn Sense<bool>>) -> Self {
        Self { policy, outcome }
    }
}

#[async_trait]
impl Handler<CoordinatorStats> for OnHeat {
    async fn handle(&mut self, ctx: &AgentContext<CoordinatorStats>, envelope: Envelope) -> Result<()> {
        let Payload::HeatStatus(HeatReport { heat_level, status }) = envelope.payload else {
            return Ok(());
        };
        info!(
            agent = %ctx.id(),
            from = %envelope.message.sender,
            heat_level,
            status = %status,
            "Heat status received"
        );

        if heat_level >= self.policy.alert_at {
            warn!(agent = %ctx.id(), heat_level, "Critical heat alert");
            ctx.with_state(|s| s.heat_alerts += 1);
        }

        if heat_level >= self.policy.proceed_below {
            warn!(agent = %ctx.id(), heat_level, "Abort, heat too high");
            ctx.with_state(|s| s.operations_aborted += 1);
            return Ok(());
        }

        info!(agent = %ctx.id(), heat_level, "Proceeding with exploit");
        let success = self.outcome.sense();
        ctx.with_state(|s| {
            s.operations_executed += 1;
            if success {
                s.successful_ops += 1;
            } else {
                s.failed_ops += 1;
            }
        });

        if success {
            info!(agent = %ctx.id(), "Exploit successful, data exfiltrated");
        } else {
            warn!(agent = %ctx.id(), "Exploit failed, target detected intrusion");
        }
        Ok(())
    }
}
