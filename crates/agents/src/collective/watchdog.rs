//! Watchdog: answers heat checks.

use std::time::Duration;

use agora_core::{HeatReport, Payload, Result};
use agora_runtime::{AgentContext, Envelope, Handler};
use async_trait::async_trait;
use serde::Serialize;
use tracing::{info, warn};

use crate::percept::Sense;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WatchdogStats {
    pub requests_handled: u64,
    pub current_heat: Option<u8>,
    pub alerts_sent: u64,
}

/// Handles `check_heat_level`: analyze, then reply with a heat report.
pub struct OnHeatCheck {
    heat: Box<dyn Sense<u8>>,
    analysis_delay: Duration,
    alert_at: u8,
}

impl OnHeatCheck {
    pub fn new(heat: Box<dyn Sense<u8>>, analysis_delay: Duration, alert_at: u8) -> Self {
        Self {
            heat,
            analysis_delay,
            alert_at,
        }
    }
}

#[async_trait]
impl Handler<WatchdogStats> for OnHeatCheck {
    async fn handle(&mut self, ctx: &AgentContext<WatchdogStats>, envelope: Envelope) -> Result<()> {
        let Payload::CheckHeatLevel { target_name } = &envelope.payload else {
            return Ok(());
        };
        info!(
            agent = %ctx.id(),
            from = %envelope.message.sender,
            target_name = %target_name,
            "REQUEST received, analyzing security posture"
        );

        ctx.sleep(self.analysis_delay).await;

        let report = HeatReport::from_level(self.heat.sense().min(100));
        info!(agent = %ctx.id(), heat_level = report.heat_level, status = %report.status, "Heat measured");

        let alert = report.heat_level >= self.alert_at;
        ctx.with_state(|s| {
            s.requests_handled += 1;
            s.current_heat = Some(report.heat_level);
            if alert {
                s.alerts_sent += 1;
            }
        });

        let heat_level = report.heat_level;
        ctx.reply(&envelope.message, &Payload::HeatStatus(report)).await?;
        info!(agent = %ctx.id(), to = %envelope.message.sender, "INFORM sent with heat status");

        if alert {
            warn!(agent = %ctx.id(), heat_level, "Alert: critical heat detected");
        }
        Ok(())
    }
}
