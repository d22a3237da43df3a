//! `agora rescue`: Run the rescue state machine to completion.

use agora_agents::percept::{random_severity, random_zone, rng};
use agora_agents::rescue_agent;
use agora_bus::LocalBus;
use agora_runtime::ExitReason;
use anyhow::Context;
use tracing::warn;

use super::GlobalOpts;

pub async fn run(
    opts: &GlobalOpts,
    missions: Option<u32>,
    time_scale: Option<f64>,
) -> anyhow::Result<()> {
    let mut config = opts.load_config()?;
    if let Some(missions) = missions {
        config.rescue.max_missions = missions;
    }
    if let Some(time_scale) = time_scale {
        config.rescue.time_scale = time_scale;
    }
    config.validate()?;

    let bus = LocalBus::new(config.bus.clone());
    let mut agent = rescue_agent(
        &config,
        random_severity(rng(config.seed, 0)),
        random_zone(rng(config.seed, 1), config.rescue.zones),
    )?;
    agent
        .start(&bus)
        .await
        .with_context(|| format!("Connection failed for {}", agent.id()))?;

    let interrupted = tokio::select! {
        _ = agent.join() => false,
        _ = tokio::signal::ctrl_c() => true,
    };
    if interrupted {
        warn!("Interrupted by operator");
        agent.stop().await;
    }
    let reason = agent.exit_reason();

    let missions = agent.with_state(|s| s.missions_completed);
    println!("\nRescue agent shut down");
    println!("  Missions completed: {missions}");
    if let Some(ExitReason::Failed { kind, message }) = reason {
        anyhow::bail!("Rescue agent failed ({kind}): {message}");
    }
    Ok(())
}
