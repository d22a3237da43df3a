//! The unit of agent activity.

use agora_core::Result;
use async_trait::async_trait;

use crate::context::AgentContext;

/// A concurrent activity owned by an agent.
///
/// All behaviors of one agent run on the same task and only interleave at
/// await points, so a behavior never observes another one mid-update.
/// Returning `Ok` ends the behavior; returning an error ends it too and is
/// reported by the runtime (fatal errors stop the whole agent).
#[async_trait]
pub trait Behavior<S>: Send
where
    S: Send + 'static,
{
    /// Name used in logs and events.
    fn name(&self) -> &str;

    async fn run(&mut self, ctx: &AgentContext<S>) -> Result<()>;
}
