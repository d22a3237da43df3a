//! Finite state machine engine.
//!
//! A [`StateMachine`] is a [`Behavior`] whose body is a table of named
//! states and the transitions allowed between them. Each state's action
//! decides where to go next; the engine refuses any move that was not
//! declared.
//!
//! ```ignore
//! let mut fsm = StateMachine::new("rescue");
//! fsm.add_state("IDLE", Idle, true)?;
//! fsm.add_state("MONITORING", Monitoring::new(sense), false)?;
//! fsm.add_transition("IDLE", "MONITORING")?;
//! fsm.add_transition("MONITORING", "MONITORING")?;
//! agent.add_behavior(fsm)?;
//! ```

use std::collections::{HashMap, HashSet};

use agora_core::{ProtocolError, Result, RuntimeEvent};
use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, info};

use crate::behavior::Behavior;
use crate::context::AgentContext;

/// Where a state action wants to go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Next {
    Go(String),
    /// End the machine and stop the owning agent.
    Terminal,
}

impl Next {
    pub fn go(state: impl Into<String>) -> Self {
        Next::Go(state.into())
    }
}

/// The action run on entering a state.
#[async_trait]
pub trait State<S>: Send
where
    S: Send + 'static,
{
    async fn run(&mut self, ctx: &AgentContext<S>) -> Result<Next>;
}

/// Hooks around a machine's lifetime.
#[async_trait]
pub trait FsmHooks<S>: Send
where
    S: Send + 'static,
{
    /// Before the initial state is entered.
    async fn on_start(&mut self, _ctx: &AgentContext<S>) {}

    /// After a state returns [`Next::Terminal`].
    async fn on_end(&mut self, _ctx: &AgentContext<S>) {}
}

pub struct StateMachine<S> {
    name: String,
    states: HashMap<String, Box<dyn State<S>>>,
    transitions: HashSet<(String, String)>,
    initial: Option<String>,
    hooks: Option<Box<dyn FsmHooks<S>>>,
}

impl<S> std::fmt::Debug for StateMachine<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut states: Vec<&String> = self.states.keys().collect();
        states.sort();
        f.debug_struct("StateMachine")
            .field("name", &self.name)
            .field("states", &states)
            .field("transitions", &self.transitions.len())
            .field("initial", &self.initial)
            .finish()
    }
}

impl<S: Send + 'static> StateMachine<S> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            states: HashMap::new(),
            transitions: HashSet::new(),
            initial: None,
            hooks: None,
        }
    }

    pub fn with_hooks(mut self, hooks: impl FsmHooks<S> + 'static) -> Self {
        self.hooks = Some(Box::new(hooks));
        self
    }

    /// Declare a state. Exactly one state may be `initial`.
    pub fn add_state(
        &mut self,
        name: impl Into<String>,
        state: impl State<S> + 'static,
        initial: bool,
    ) -> std::result::Result<(), ProtocolError> {
        let name = name.into();
        if self.states.contains_key(&name) {
            return Err(ProtocolError::DuplicateState(name));
        }
        if initial {
            if let Some(existing) = &self.initial {
                return Err(ProtocolError::MultipleInitialStates {
                    existing: existing.clone(),
                    attempted: name,
                });
            }
            self.initial = Some(name.clone());
        }
        self.states.insert(name, Box::new(state));
        Ok(())
    }

    /// Allow moving from `from` to `to`. Both must already be declared.
    pub fn add_transition(
        &mut self,
        from: impl Into<String>,
        to: impl Into<String>,
    ) -> std::result::Result<(), ProtocolError> {
        let (from, to) = (from.into(), to.into());
        for endpoint in [&from, &to] {
            if !self.states.contains_key(endpoint) {
                return Err(ProtocolError::UnknownState(endpoint.clone()));
            }
        }
        self.transitions.insert((from, to));
        Ok(())
    }

    pub fn can_transition(&self, from: &str, to: &str) -> bool {
        self.transitions
            .contains(&(from.to_string(), to.to_string()))
    }

    fn enter(&self, ctx: &AgentContext<S>, state: &str) {
        info!(agent = %ctx.id(), machine = %self.name, state = %state, "Entering state");
        if let Some(events) = ctx.events() {
            events.publish(RuntimeEvent::StateEntered {
                agent: ctx.id().clone(),
                machine: self.name.clone(),
                state: state.to_string(),
                timestamp: Utc::now(),
            });
        }
    }
}

#[async_trait]
impl<S: Send + 'static> Behavior<S> for StateMachine<S> {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&mut self, ctx: &AgentContext<S>) -> Result<()> {
        let mut current = self
            .initial
            .clone()
            .ok_or_else(|| ProtocolError::NoInitialState(self.name.clone()))?;

        if let Some(hooks) = &mut self.hooks {
            hooks.on_start(ctx).await;
        }

        loop {
            self.enter(ctx, &current);

            let state = self
                .states
                .get_mut(&current)
                .ok_or_else(|| ProtocolError::UnknownState(current.clone()))?;

            match state.run(ctx).await? {
                Next::Terminal => {
                    debug!(agent = %ctx.id(), machine = %self.name, state = %current, "Terminal");
                    if let Some(hooks) = &mut self.hooks {
                        hooks.on_end(ctx).await;
                    }
                    ctx.stop();
                    return Ok(());
                }
                Next::Go(next) => {
                    if !self.can_transition(&current, &next) {
                        return Err(ProtocolError::InvalidTransition {
                            from: current,
                            to: next,
                        }
                        .into());
                    }
                    current = next;
                }
            }
        }
    }
}
