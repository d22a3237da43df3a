//! Agent lifecycle: connect, run behaviors, stop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use agora_core::{
    AgentId, Credentials, Error, ErrorKind, EventBus, MessageLog, Result, RuntimeEvent, Transport,
};
use chrono::Utc;
use futures::stream::{FuturesUnordered, StreamExt};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::behavior::Behavior;
use crate::context::AgentContext;

/// Why an agent stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitReason {
    /// Every behavior finished, or a behavior stopped the agent itself.
    Completed,
    /// [`AgentRuntime::stop`] was called.
    Stopped,
    /// A behavior returned a fatal error.
    Failed { kind: ErrorKind, message: String },
}

impl std::fmt::Display for ExitReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExitReason::Completed => write!(f, "completed"),
            ExitReason::Stopped => write!(f, "stopped"),
            ExitReason::Failed { kind, message } => write!(f, "failed ({kind}): {message}"),
        }
    }
}

/// An agent: an identity, private fields of type `S`, and the behaviors that
/// act on them.
///
/// ```ignore
/// let mut agent = AgentRuntime::new(id, credentials, Counters::default());
/// agent.add_behavior(Cyclic::every(Sensor::new(), period))?;
/// agent.start(&bus).await?;
/// ```
pub struct AgentRuntime<S> {
    id: AgentId,
    credentials: Credentials,
    state: Arc<Mutex<S>>,
    behaviors: Vec<Box<dyn Behavior<S>>>,
    events: Option<Arc<EventBus>>,
    message_log: Option<Arc<MessageLog>>,
    cancel: CancellationToken,
    stop_requested: Arc<AtomicBool>,
    exit: Arc<Mutex<Option<ExitReason>>>,
    handle: Option<JoinHandle<()>>,
    started: bool,
}

impl<S> std::fmt::Debug for AgentRuntime<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentRuntime")
            .field("id", &self.id)
            .field("behaviors", &self.behaviors.len())
            .field("started", &self.started)
            .finish()
    }
}

impl<S: Send + 'static> AgentRuntime<S> {
    pub fn new(id: AgentId, credentials: Credentials, state: S) -> Self {
        Self {
            id,
            credentials,
            state: Arc::new(Mutex::new(state)),
            behaviors: Vec::new(),
            events: None,
            message_log: None,
            cancel: CancellationToken::new(),
            stop_requested: Arc::new(AtomicBool::new(false)),
            exit: Arc::new(Mutex::new(None)),
            handle: None,
            started: false,
        }
    }

    /// Publish lifecycle and state events to `events`.
    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    /// Record every message this agent sends in `log`.
    pub fn with_message_log(mut self, log: Arc<MessageLog>) -> Self {
        self.message_log = Some(log);
        self
    }

    pub fn id(&self) -> &AgentId {
        &self.id
    }

    /// Register a behavior. Only allowed before [`start`](Self::start).
    pub fn add_behavior(&mut self, behavior: impl Behavior<S> + 'static) -> Result<()> {
        if self.started {
            return Err(Error::AlreadyStarted(self.id.clone()));
        }
        self.behaviors.push(Box::new(behavior));
        Ok(())
    }

    /// Connect to `transport` and start running every behavior.
    ///
    /// Connection failures are returned as-is; the agent does not retry.
    pub async fn start(&mut self, transport: &dyn Transport) -> Result<()> {
        if self.started {
            return Err(Error::AlreadyStarted(self.id.clone()));
        }

        let channel: Arc<dyn agora_core::MessageChannel> =
            Arc::from(transport.connect(&self.id, &self.credentials).await?);
        self.started = true;

        let ctx = AgentContext::new(
            self.id.clone(),
            self.state.clone(),
            channel,
            self.cancel.clone(),
            self.events.clone(),
            self.message_log.clone(),
        );
        let behaviors = std::mem::take(&mut self.behaviors);

        info!(agent = %self.id, behaviors = behaviors.len(), "Agent started");
        if let Some(events) = &self.events {
            events.publish(RuntimeEvent::AgentStarted {
                agent: self.id.clone(),
                behaviors: behaviors.len(),
                timestamp: Utc::now(),
            });
        }

        let stop_requested = self.stop_requested.clone();
        let exit = self.exit.clone();
        self.handle = Some(tokio::spawn(async move {
            let reason = run_behaviors(&ctx, behaviors, &stop_requested).await;

            if let Err(e) = ctx.channel().disconnect().await {
                warn!(agent = %ctx.id(), error = %e, "Disconnect failed");
            }

            info!(agent = %ctx.id(), reason = %reason, "Agent stopped");
            if let Some(events) = ctx.events() {
                events.publish(RuntimeEvent::AgentStopped {
                    agent: ctx.id().clone(),
                    reason: reason.to_string(),
                    timestamp: Utc::now(),
                });
            }
            *exit.lock().unwrap_or_else(PoisonError::into_inner) = Some(reason);
        }));

        Ok(())
    }

    /// Cancel every behavior and wait for the agent to wind down.
    /// Calling it again, or on an agent that already stopped, is a no-op.
    pub async fn stop(&mut self) {
        if self.handle.as_ref().is_some_and(|h| !h.is_finished()) {
            self.stop_requested.store(true, Ordering::SeqCst);
        }
        self.cancel.cancel();
        self.join().await;
    }

    /// Wait for the agent to finish on its own.
    ///
    /// Cancel-safe. Returns `None` if the agent was never started.
    pub async fn join(&mut self) -> Option<ExitReason> {
        if let Some(handle) = self.handle.as_mut() {
            let joined = handle.await;
            self.handle = None;
            if let Err(e) = joined {
                error!(agent = %self.id, error = %e, "Agent task aborted");
                self.exit
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .get_or_insert(ExitReason::Failed {
                        kind: ErrorKind::Internal,
                        message: e.to_string(),
                    });
            }
        }
        self.exit_reason()
    }

    pub fn is_alive(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Why the agent stopped, once it has.
    pub fn exit_reason(&self) -> Option<ExitReason> {
        self.exit.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Read (or adjust) the agent's fields from outside.
    pub fn with_state<R>(&self, f: impl FnOnce(&mut S) -> R) -> R {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut state)
    }
}

/// Drive all behaviors to completion on the current task.
async fn run_behaviors<S: Send + 'static>(
    ctx: &AgentContext<S>,
    behaviors: Vec<Box<dyn Behavior<S>>>,
    stop_requested: &AtomicBool,
) -> ExitReason {
    let mut running: FuturesUnordered<_> = behaviors
        .into_iter()
        .map(|behavior| drive(behavior, ctx))
        .collect();
    let mut failure = None;

    while let Some((behavior, outcome)) = running.next().await {
        match outcome {
            None => debug!(agent = %ctx.id(), behavior = %behavior, "Behavior cancelled"),
            Some(Ok(())) => {
                debug!(agent = %ctx.id(), behavior = %behavior, "Behavior finished");
                if let Some(events) = ctx.events() {
                    events.publish(RuntimeEvent::BehaviorFinished {
                        agent: ctx.id().clone(),
                        behavior,
                        timestamp: Utc::now(),
                    });
                }
            }
            Some(Err(e)) => {
                let fatal = e.is_fatal();
                if fatal {
                    error!(
                        agent = %ctx.id(),
                        behavior = %behavior,
                        kind = %e.kind(),
                        error = %e,
                        "Fatal error, stopping agent"
                    );
                    failure.get_or_insert(ExitReason::Failed {
                        kind: e.kind(),
                        message: e.to_string(),
                    });
                    ctx.stop();
                } else {
                    warn!(
                        agent = %ctx.id(),
                        behavior = %behavior,
                        kind = %e.kind(),
                        error = %e,
                        "Behavior failed"
                    );
                }
                if let Some(events) = ctx.events() {
                    events.publish(RuntimeEvent::BehaviorFailed {
                        agent: ctx.id().clone(),
                        behavior,
                        error_kind: e.kind().to_string(),
                        error_message: e.to_string(),
                        fatal,
                        timestamp: Utc::now(),
                    });
                }
            }
        }
    }

    match failure {
        Some(reason) => reason,
        None if stop_requested.load(Ordering::SeqCst) => ExitReason::Stopped,
        None => ExitReason::Completed,
    }
}

/// Run one behavior until it returns or the agent is cancelled.
async fn drive<S: Send + 'static>(
    mut behavior: Box<dyn Behavior<S>>,
    ctx: &AgentContext<S>,
) -> (String, Option<Result<()>>) {
    let name = behavior.name().to_string();
    let outcome = tokio::select! {
        _ = ctx.cancelled() => None,
        result = behavior.run(ctx) => Some(result),
    };
    (name, outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cyclic::{Cyclic, CyclicBehavior, Flow, OneShot};
    use agora_bus::LocalBus;
    use agora_config::BusConfig;
    use agora_core::{PayloadError, ProtocolError};
    use async_trait::async_trait;
    use std::time::Duration;

    fn bus() -> LocalBus {
        LocalBus::new(BusConfig::default())
    }

    fn agent<S: Send + 'static>(name: &str, state: S) -> AgentRuntime<S> {
        AgentRuntime::new(
            AgentId::at(name, "localhost"),
            Credentials::new("password"),
            state,
        )
    }

    /// Counts ticks, finishing after `limit`.
    struct Counter {
        limit: u32,
    }

    #[async_trait]
    impl CyclicBehavior<u32> for Counter {
        fn name(&self) -> &str {
            "counter"
        }

        async fn tick(&mut self, ctx: &AgentContext<u32>) -> Result<Flow> {
            ctx.sleep(Duration::from_millis(10)).await;
            let n = ctx.with_state(|n| {
                *n += 1;
                *n
            });
            Ok(if n >= self.limit { Flow::Done } else { Flow::Continue })
        }
    }

    struct Fails(Error);

    #[async_trait]
    impl CyclicBehavior<u32> for Fails {
        fn name(&self) -> &str {
            "fails"
        }

        async fn tick(&mut self, _ctx: &AgentContext<u32>) -> Result<Flow> {
            Err(std::mem::replace(&mut self.0, Error::Internal("again".into())))
        }
    }

    /// Waits on the inbox for an hour.
    struct Listener;

    #[async_trait]
    impl CyclicBehavior<u32> for Listener {
        fn name(&self) -> &str {
            "listener"
        }

        async fn tick(&mut self, ctx: &AgentContext<u32>) -> Result<Flow> {
            ctx.receive(Duration::from_secs(3600)).await?;
            Ok(Flow::Continue)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn completes_when_every_behavior_finishes() {
        let bus = bus();
        let events = Arc::new(EventBus::default());
        let mut rx = events.subscribe();
        let mut a = agent("a", 0u32).with_events(events);
        a.add_behavior(Cyclic::new(Counter { limit: 3 })).unwrap();
        a.start(&bus).await.unwrap();

        assert_eq!(a.join().await, Some(ExitReason::Completed));
        assert_eq!(a.with_state(|n| *n), 3);
        assert!(!a.is_alive());
        assert!(!bus.is_online(a.id()));

        let mut seen = Vec::new();
        while let Ok(event) = rx.try_recv() {
            seen.push(event);
        }
        assert!(matches!(seen.first().map(|e| e.as_ref()), Some(RuntimeEvent::AgentStarted { .. })));
        assert!(matches!(seen.last().map(|e| e.as_ref()), Some(RuntimeEvent::AgentStopped { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn stop_interrupts_pending_receive() {
        let bus = bus();
        let mut a = agent("a", 0u32);
        a.add_behavior(Cyclic::new(Listener)).unwrap();
        a.start(&bus).await.unwrap();
        assert!(a.is_alive());

        let started = tokio::time::Instant::now();
        a.stop().await;
        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(a.exit_reason(), Some(ExitReason::Stopped));

        // Idempotent
        a.stop().await;
        assert_eq!(a.exit_reason(), Some(ExitReason::Stopped));
    }

    #[tokio::test(start_paused = true)]
    async fn non_fatal_error_ends_only_that_behavior() {
        let bus = bus();
        let mut a = agent("a", 0u32);
        a.add_behavior(OneShot::new(Fails(Error::Payload(PayloadError::Malformed(
            "bad".into(),
        )))))
        .unwrap();
        a.add_behavior(Cyclic::new(Counter { limit: 5 })).unwrap();
        a.start(&bus).await.unwrap();

        assert_eq!(a.join().await, Some(ExitReason::Completed));
        assert_eq!(a.with_state(|n| *n), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn fatal_error_stops_siblings() {
        let bus = bus();
        let mut a = agent("a", 0u32);
        a.add_behavior(Cyclic::new(Listener)).unwrap();
        a.add_behavior(OneShot::new(Fails(Error::Protocol(ProtocolError::UnknownState(
            "NOWHERE".into(),
        )))))
        .unwrap();
        a.start(&bus).await.unwrap();

        match a.join().await {
            Some(ExitReason::Failed { kind, message }) => {
                assert_eq!(kind, ErrorKind::Protocol);
                assert!(message.contains("NOWHERE"));
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn behaviors_cannot_be_added_after_start() {
        let bus = bus();
        let mut a = agent("a", 0u32);
        a.start(&bus).await.unwrap();
        let err = a.add_behavior(Cyclic::new(Listener)).unwrap_err();
        assert!(matches!(err, Error::AlreadyStarted(_)));
        assert!(matches!(a.start(&bus).await, Err(Error::AlreadyStarted(_))));
    }

    #[tokio::test]
    async fn connection_failure_is_returned() {
        let bus = bus();
        let _holder = bus
            .connect(&AgentId::at("a", "localhost"), &Credentials::new("password"))
            .await
            .unwrap();

        let mut a = agent("a", 0u32);
        let err = a.start(&bus).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Connection);
        assert!(!a.is_alive());
        assert_eq!(a.join().await, None);
    }

    #[tokio::test]
    async fn agent_without_behaviors_completes() {
        let bus = bus();
        let mut a = agent("a", ());
        a.start(&bus).await.unwrap();
        assert_eq!(a.join().await, Some(ExitReason::Completed));
    }
}
