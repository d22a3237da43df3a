//! `agora hello`: Connect, greet, leave.

use agora_agents::greeter_agent;
use agora_bus::LocalBus;
use anyhow::Context;
use tracing::info;

use super::GlobalOpts;

pub async fn run(opts: &GlobalOpts, name: &str) -> anyhow::Result<()> {
    let config = opts.load_config()?;
    let bus = LocalBus::new(config.bus.clone());

    let mut agent = greeter_agent(&config.bus, name)?;
    info!(agent = %agent.id(), "Connecting");
    agent
        .start(&bus)
        .await
        .with_context(|| format!("Connection failed for {}", agent.id()))?;

    let reason = agent.join().await;
    info!(reason = ?reason, "Agent finished");
    Ok(())
}
