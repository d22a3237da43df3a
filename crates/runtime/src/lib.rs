//! # Agora Runtime
//!
//! Runs agents. An [`AgentRuntime`] connects one identity to a transport and
//! drives its behaviors on a single tokio task; [`Cyclic`], [`OneShot`],
//! [`Dispatcher`], and [`StateMachine`] are the behavior shapes agents are
//! built from.

pub mod agent;
pub mod behavior;
pub mod context;
pub mod cyclic;
pub mod dispatch;
pub mod fsm;

pub use agent::{AgentRuntime, ExitReason};
pub use behavior::Behavior;
pub use context::AgentContext;
pub use cyclic::{Cyclic, CyclicBehavior, Flow, OneShot};
pub use dispatch::{Dispatcher, Envelope, Handler};
pub use fsm::{FsmHooks, Next, State, StateMachine};
