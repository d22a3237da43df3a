//! Repeating and one-shot behaviors built from a single `tick`.

use std::time::Duration;

use agora_core::Result;
use async_trait::async_trait;
use tokio::time::MissedTickBehavior;

use crate::behavior::Behavior;
use crate::context::AgentContext;

/// Whether a cyclic behavior wants another tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Done,
}

/// One step of a repeating behavior.
#[async_trait]
pub trait CyclicBehavior<S>: Send
where
    S: Send + 'static,
{
    fn name(&self) -> &str;

    async fn tick(&mut self, ctx: &AgentContext<S>) -> Result<Flow>;
}

/// Runs a [`CyclicBehavior`] until it reports [`Flow::Done`] or the agent
/// stops, either back to back or on a fixed period.
pub struct Cyclic<B> {
    behavior: B,
    period: Option<Duration>,
}

impl<B> Cyclic<B> {
    /// Tick again as soon as the previous tick returns.
    pub fn new(behavior: B) -> Self {
        Self {
            behavior,
            period: None,
        }
    }

    /// Tick once per `period`, starting immediately. A slow tick delays the
    /// schedule instead of causing a burst of catch-up ticks.
    pub fn every(behavior: B, period: Duration) -> Self {
        Self {
            behavior,
            period: Some(period),
        }
    }
}

#[async_trait]
impl<S, B> Behavior<S> for Cyclic<B>
where
    S: Send + 'static,
    B: CyclicBehavior<S>,
{
    fn name(&self) -> &str {
        self.behavior.name()
    }

    async fn run(&mut self, ctx: &AgentContext<S>) -> Result<()> {
        let mut interval = self.period.map(|period| {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval
        });

        while !ctx.is_stopping() {
            match &mut interval {
                Some(interval) => {
                    interval.tick().await;
                }
                // Let sibling behaviors on the same task make progress.
                None => tokio::task::yield_now().await,
            }
            if self.behavior.tick(ctx).await? == Flow::Done {
                break;
            }
        }
        Ok(())
    }
}

/// Runs a [`CyclicBehavior`] exactly once.
pub struct OneShot<B> {
    behavior: B,
}

impl<B> OneShot<B> {
    pub fn new(behavior: B) -> Self {
        Self { behavior }
    }
}

#[async_trait]
impl<S, B> Behavior<S> for OneShot<B>
where
    S: Send + 'static,
    B: CyclicBehavior<S>,
{
    fn name(&self) -> &str {
        self.behavior.name()
    }

    async fn run(&mut self, ctx: &AgentContext<S>) -> Result<()> {
        self.behavior.tick(ctx).await?;
        Ok(())
    }
}
