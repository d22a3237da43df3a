//! `agora probe`: Ask a freshly started watchdog for one heat reading.

use std::sync::Arc;

use agora_agents::collective::{probe_agent, targets};
use agora_agents::{Collective, CollectiveSenses};
use agora_bus::LocalBus;
use agora_core::MessageLog;
use anyhow::Context;
use tracing::warn;

use super::GlobalOpts;

pub async fn run(opts: &GlobalOpts, target: &str) -> anyhow::Result<()> {
    let config = opts.load_config()?;
    if targets::find(target).is_none() {
        warn!(name = %target, "Target is not in the catalog");
    }
    let bus = LocalBus::new(config.bus.clone());

    let log = Arc::new(MessageLog::new());
    let senses = CollectiveSenses::random(&config.collective, config.seed);
    let mut collective = Collective::new(&config, senses, None, Some(log.clone()))?;
    collective
        .watchdog
        .start(&bus)
        .await
        .context("Failed to start the watchdog")?;

    let mut probe = probe_agent(&config, "probe", target)?;
    let started = probe.start(&bus).await.context("Failed to start the probe");
    if started.is_ok() {
        probe.join().await;
    }
    collective.watchdog.stop().await;
    started?;

    match probe.with_state(|s| s.reply.clone()) {
        Some(report) => {
            println!("\n{target}: heat {}% ({})", report.heat_level, report.status);
            if report.heat_level >= config.collective.alert_at {
                println!("  ⚠️  Above the alert threshold ({}%)", config.collective.alert_at);
            }
        }
        None => println!("\n⚠️  No answer from {}", config.bus.identity(&config.collective.watchdog)),
    }
    println!("  Messages exchanged: {}", log.count());
    Ok(())
}
