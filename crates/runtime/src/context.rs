//! What a running behavior can see and do.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use agora_core::{
    AgentId, EventBus, Message, MessageChannel, MessageLog, Payload, Received, Result,
};
use tokio::sync::{Notify, oneshot};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Handle given to every behavior of an agent.
///
/// Messages pulled off the channel while waiting for something specific
/// (see [`AgentContext::request`]) are kept in a stash and handed out first
/// by later receives, so nothing is lost.
pub struct AgentContext<S> {
    id: AgentId,
    state: Arc<Mutex<S>>,
    channel: Arc<dyn MessageChannel>,
    cancel: CancellationToken,
    events: Option<Arc<EventBus>>,
    message_log: Option<Arc<MessageLog>>,
    stash: Mutex<VecDeque<Message>>,
    stashed: Notify,
    pending: Mutex<HashMap<String, oneshot::Sender<Message>>>,
}

impl<S> AgentContext<S> {
    pub(crate) fn new(
        id: AgentId,
        state: Arc<Mutex<S>>,
        channel: Arc<dyn MessageChannel>,
        cancel: CancellationToken,
        events: Option<Arc<EventBus>>,
        message_log: Option<Arc<MessageLog>>,
    ) -> Self {
        Self {
            id,
            state,
            channel,
            cancel,
            events,
            message_log,
            stash: Mutex::new(VecDeque::new()),
            stashed: Notify::new(),
            pending: Mutex::new(HashMap::new()),
        }
    }

    pub fn id(&self) -> &AgentId {
        &self.id
    }

    /// Run `f` with exclusive access to the agent's fields.
    ///
    /// The lock is released before this returns; never call it from inside
    /// another `with_state` closure.
    pub fn with_state<R>(&self, f: impl FnOnce(&mut S) -> R) -> R {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut state)
    }

    pub fn events(&self) -> Option<&Arc<EventBus>> {
        self.events.as_ref()
    }

    /// Send `payload` to `recipient` with the performative its kind requires.
    ///
    /// Delivery is best-effort: failures are logged, not returned. Only an
    /// encoding failure is an error.
    pub async fn send(&self, recipient: &AgentId, payload: &Payload) -> Result<()> {
        let message = Message::encode(
            self.id.clone(),
            recipient.clone(),
            payload.kind().performative(),
            payload,
        )?;
        self.deliver(message).await;
        Ok(())
    }

    /// Answer `original`, keeping its conversation.
    pub async fn reply(&self, original: &Message, payload: &Payload) -> Result<()> {
        let message = original.reply(payload.kind().performative(), payload)?;
        self.deliver(message).await;
        Ok(())
    }

    /// Hand a prepared message to the channel. Returns whether it was delivered.
    pub async fn deliver(&self, message: Message) -> bool {
        let recipient = message.recipient.clone();
        let performative = message.performative;
        match self.channel.send(message.clone()).await {
            Ok(()) => {
                debug!(agent = %self.id, to = %recipient, performative = %performative, "Sent");
                if let Some(log) = &self.message_log {
                    log.record(&message);
                }
                true
            }
            Err(e) => {
                warn!(agent = %self.id, to = %recipient, error = %e, "Delivery failed");
                false
            }
        }
    }

    /// Next message for this agent, or `None` if nothing arrives within
    /// `timeout`.
    pub async fn receive(&self, timeout: Duration) -> Result<Option<Message>> {
        self.receive_matching(timeout, |_| true).await
    }

    /// Next message satisfying `matches`, waiting at most `timeout` overall.
    /// Messages that don't match are stashed for later receives.
    ///
    /// Replies to an outstanding [`request`](Self::request) are never
    /// returned here; they go to the request that is waiting for them.
    pub async fn receive_matching<F>(&self, timeout: Duration, matches: F) -> Result<Option<Message>>
    where
        F: Fn(&Message) -> bool,
    {
        let deadline = Instant::now() + timeout;
        loop {
            {
                let mut stash = self.lock_stash();
                if let Some(pos) = stash.iter().position(&matches) {
                    return Ok(stash.remove(pos));
                }
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(None);
            }
            tokio::select! {
                received = self.channel.receive(remaining) => match received? {
                    Received::Message(message) => {
                        let Some(message) = self.claim(message) else {
                            continue;
                        };
                        if matches(&message) {
                            debug!(agent = %self.id, from = %message.sender, "Received");
                            return Ok(Some(message));
                        }
                        self.push_stash(message);
                    }
                    Received::Timeout => return Ok(None),
                },
                // A sibling behavior stashed something; look again.
                _ = self.stashed.notified() => {}
            }
        }
    }

    /// Send a request and wait for the reply to it.
    ///
    /// The reply is caught even when another behavior of this agent is the
    /// one that pulls it off the channel. Returns `None` if the request
    /// could not be delivered or no reply arrived within `timeout`.
    pub async fn request(
        &self,
        recipient: &AgentId,
        payload: &Payload,
        timeout: Duration,
    ) -> Result<Option<Message>> {
        let message = Message::encode(
            self.id.clone(),
            recipient.clone(),
            payload.kind().performative(),
            payload,
        )?;
        let message_id = message.id.clone();
        let message = message.with_conversation(message_id.clone());

        let (tx, mut rx) = oneshot::channel();
        self.lock_pending().insert(message_id.clone(), tx);
        if !self.deliver(message).await {
            self.lock_pending().remove(&message_id);
            return Ok(None);
        }

        let deadline = Instant::now() + timeout;
        let outcome = loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break Ok(rx.try_recv().ok());
            }
            tokio::select! {
                biased;
                reply = &mut rx => break Ok(reply.ok()),
                received = self.channel.receive(remaining) => match received {
                    Ok(Received::Message(message)) => {
                        if let Some(message) = self.claim(message) {
                            self.push_stash(message);
                        }
                    }
                    Ok(Received::Timeout) => {}
                    Err(e) => break Err(e.into()),
                },
            }
        };

        self.lock_pending().remove(&message_id);
        if let Ok(Some(reply)) = &outcome {
            debug!(agent = %self.id, from = %reply.sender, "Reply received");
        }
        outcome
    }

    /// Route a reply to the request waiting for it. Returns the message if
    /// nobody is waiting.
    fn claim(&self, message: Message) -> Option<Message> {
        let waiter = message
            .in_reply_to
            .as_ref()
            .and_then(|id| self.lock_pending().remove(id));
        match waiter {
            Some(tx) => tx.send(message).err(),
            None => Some(message),
        }
    }

    fn push_stash(&self, message: Message) {
        debug!(agent = %self.id, from = %message.sender, "Stashed");
        self.lock_stash().push_back(message);
        self.stashed.notify_waiters();
    }

    /// Sleep, waking early if the agent is stopping.
    pub async fn sleep(&self, duration: Duration) {
        tokio::select! {
            _ = self.cancel.cancelled() => {}
            _ = tokio::time::sleep(duration) => {}
        }
    }

    /// Ask the owning agent to stop. Every behavior is cancelled at its
    /// next await point.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub fn is_stopping(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub(crate) async fn cancelled(&self) {
        self.cancel.cancelled().await;
    }

    pub(crate) fn channel(&self) -> &Arc<dyn MessageChannel> {
        &self.channel
    }

    fn lock_stash(&self) -> MutexGuard<'_, VecDeque<Message>> {
        self.stash.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_pending(&self) -> MutexGuard<'_, HashMap<String, oneshot::Sender<Message>>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agora_bus::LocalBus;
    use agora_config::BusConfig;
    use agora_core::{Credentials, HeatReport, Performative, Transport, ValueTier};

    async fn context(bus: &LocalBus, log: Option<Arc<MessageLog>>) -> AgentContext<()> {
        let id = AgentId::at("me", "localhost");
        let channel = bus.connect(&id, &Credentials::new("password")).await.unwrap();
        AgentContext::new(
            id,
            Arc::new(Mutex::new(())),
            Arc::from(channel),
            CancellationToken::new(),
            None,
            log,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn receive_timeout_is_none() {
        let bus = LocalBus::new(BusConfig::default());
        let ctx = context(&bus, None).await;
        assert!(ctx.receive(Duration::from_secs(1)).await.unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn short_receive_is_not_held_up_by_a_long_one() {
        let bus = LocalBus::new(BusConfig::default());
        let ctx = context(&bus, None).await;

        let long = ctx.receive(Duration::from_secs(100));
        let short = async {
            ctx.sleep(Duration::from_millis(10)).await;
            let started = Instant::now();
            let received = ctx.receive(Duration::from_secs(1)).await.unwrap();
            (received, started.elapsed())
        };
        let (long, (short, elapsed)) = tokio::join!(long, short);

        assert!(long.unwrap().is_none());
        assert!(short.is_none());
        assert!(elapsed < Duration::from_secs(2), "short receive took {elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn request_stashes_unrelated_messages() {
        let bus = LocalBus::new(BusConfig::default());
        let ctx = context(&bus, None).await;
        let peer = bus
            .connect(&AgentId::at("peer", "localhost"), &Credentials::new("password"))
            .await
            .unwrap();

        let answer = tokio::spawn(async move {
            let request = peer
                .receive(Duration::from_secs(5))
                .await
                .unwrap()
                .into_message()
                .unwrap();
            let noise = Message::encode(
                peer.identity().clone(),
                request.sender.clone(),
                Performative::Inform,
                &Payload::TargetDiscovered(agora_core::TargetReport {
                    target_name: "AdminPanel".into(),
                    vulnerability_type: "Default Credentials".into(),
                    value_tier: ValueTier::Low,
                }),
            )
            .unwrap();
            peer.send(noise).await.unwrap();
            let reply = request
                .reply(
                    Performative::Inform,
                    &Payload::HeatStatus(HeatReport::from_level(40)),
                )
                .unwrap();
            peer.send(reply).await.unwrap();
        });

        let reply = ctx
            .request(
                &AgentId::at("peer", "localhost"),
                &Payload::CheckHeatLevel {
                    target_name: "AdminPanel".into(),
                },
                Duration::from_secs(5),
            )
            .await
            .unwrap()
            .unwrap();
        answer.await.unwrap();

        assert_eq!(
            reply.decode().unwrap(),
            Payload::HeatStatus(HeatReport::from_level(40))
        );
        assert_eq!(reply.conversation_id.as_deref(), reply.in_reply_to.as_deref());

        let stashed = ctx.receive(Duration::from_millis(1)).await.unwrap().unwrap();
        assert!(matches!(stashed.decode().unwrap(), Payload::TargetDiscovered(_)));
        assert!(ctx.receive(Duration::from_millis(1)).await.unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn sends_to_offline_agents_are_swallowed_and_not_logged() {
        let bus = LocalBus::new(BusConfig::default());
        let log = Arc::new(MessageLog::new());
        let ctx = context(&bus, Some(log.clone())).await;

        let nobody = AgentId::at("nobody", "localhost");
        ctx.send(&nobody, &Payload::HeatStatus(HeatReport::from_level(10)))
            .await
            .unwrap();
        assert_eq!(log.count(), 0);

        ctx.send(ctx.id(), &Payload::HeatStatus(HeatReport::from_level(10)))
            .await
            .unwrap();
        assert_eq!(log.count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn sleep_wakes_on_stop() {
        let bus = LocalBus::new(BusConfig::default());
        let ctx = context(&bus, None).await;
        ctx.stop();

        let started = Instant::now();
        ctx.sleep(Duration::from_secs(60)).await;
        assert!(started.elapsed() < Duration::from_secs(1));
        assert!(ctx.is_stopping());
    }
}
