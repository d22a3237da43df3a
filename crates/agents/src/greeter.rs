//! The smallest possible agent: say hello, wait a moment, leave.

use std::time::Duration;

use agora_config::BusConfig;
use agora_core::Result;
use agora_runtime::{AgentContext, AgentRuntime, CyclicBehavior, Flow, OneShot};
use async_trait::async_trait;
use tracing::info;

/// One-shot behavior that greets and then stops its agent.
pub struct Greet {
    linger: Duration,
}

impl Greet {
    pub fn new(linger: Duration) -> Self {
        Self { linger }
    }
}

impl Default for Greet {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}

#[async_trait]
impl<S: Send + 'static> CyclicBehavior<S> for Greet {
    fn name(&self) -> &str {
        "greet"
    }

    async fn tick(&mut self, ctx: &AgentContext<S>) -> Result<Flow> {
        info!(agent = %ctx.id(), "Agent behavior is executing");
        info!("Hello from {}", ctx.id());
        ctx.sleep(self.linger).await;
        ctx.stop();
        Ok(Flow::Done)
    }
}

/// Build a greeter agent called `name`.
pub fn greeter_agent(bus: &BusConfig, name: &str) -> Result<AgentRuntime<()>> {
    let mut agent = AgentRuntime::new(bus.identity(name), bus.credentials(), ());
    agent.add_behavior(OneShot::new(Greet::default()))?;
    Ok(agent)
}

#[cfg(test)]
mod tests {
    use super::*;
    use agora_bus::LocalBus;
    use agora_runtime::ExitReason;

    #[tokio::test(start_paused = true)]
    async fn greeter_stops_itself_after_lingering() {
        let config = BusConfig::default();
        let bus = LocalBus::new(config.clone());
        let mut agent = greeter_agent(&config, "student").unwrap();

        let started = tokio::time::Instant::now();
        agent.start(&bus).await.unwrap();
        assert!(bus.is_online(&config.identity("student")));

        assert_eq!(agent.join().await, Some(ExitReason::Completed));
        assert!(started.elapsed() >= Duration::from_secs(1));
        assert!(bus.online().is_empty());
    }
}
