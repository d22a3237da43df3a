//! `agora sensor`: Periodic disaster sensing for a fixed time.

use std::time::Duration;

use agora_agents::percept::{random_severity, rng};
use agora_agents::sensor_agent;
use agora_bus::LocalBus;
use anyhow::Context;
use tracing::info;

use super::{GlobalOpts, run_for};

pub async fn run(opts: &GlobalOpts, secs: Option<u64>) -> anyhow::Result<()> {
    let config = opts.load_config()?;
    let secs = secs.unwrap_or(config.sensor.run_secs);
    let bus = LocalBus::new(config.bus.clone());

    let mut agent = sensor_agent(&config, random_severity(rng(config.seed, 0)))?;
    agent
        .start(&bus)
        .await
        .with_context(|| format!("Connection failed for {}", agent.id()))?;

    info!(secs, "Monitoring active");
    run_for(Duration::from_secs(secs)).await;
    agent.stop().await;

    let state = agent.with_state(|s| s.clone());
    println!("\nMonitoring complete");
    println!("  Percepts: {}", state.percepts);
    println!("  Alerts:   {}", state.alerts);
    Ok(())
}
