//! Message dispatch by payload kind.

use std::collections::HashMap;
use std::time::Duration;

use agora_core::{ErrorKind, Message, MessageKind, Payload, Result};
use async_trait::async_trait;
use tracing::{debug, warn};

use crate::context::AgentContext;
use crate::cyclic::{CyclicBehavior, Flow};

/// A received message together with its decoded payload.
#[derive(Debug, Clone)]
pub struct Envelope {
    pub message: Message,
    pub payload: Payload,
}

/// Reacts to one kind of payload.
#[async_trait]
pub trait Handler<S>: Send
where
    S: Send + 'static,
{
    async fn handle(&mut self, ctx: &AgentContext<S>, envelope: Envelope) -> Result<()>;
}

/// Receive-decode-route loop over a table of handlers.
///
/// Each tick waits up to `timeout` for a message. Nothing arriving is not an
/// error; the next tick simply polls again. Bodies that fail to decode are
/// logged and dropped, and so are handler errors caused by bad payloads.
pub struct Dispatcher<S> {
    name: String,
    timeout: Duration,
    handlers: HashMap<MessageKind, Box<dyn Handler<S>>>,
}

impl<S: Send + 'static> Dispatcher<S> {
    pub fn new(name: impl Into<String>, timeout: Duration) -> Self {
        Self {
            name: name.into(),
            timeout,
            handlers: HashMap::new(),
        }
    }

    /// Route `kind` to `handler`, replacing any previous handler.
    pub fn on(mut self, kind: MessageKind, handler: impl Handler<S> + 'static) -> Self {
        self.handlers.insert(kind, Box::new(handler));
        self
    }

    pub fn handles(&self, kind: MessageKind) -> bool {
        self.handlers.contains_key(&kind)
    }

    async fn dispatch(&mut self, ctx: &AgentContext<S>, message: Message) -> Result<()> {
        let payload = match message.decode() {
            Ok(payload) => payload,
            Err(e) => {
                warn!(
                    agent = %ctx.id(),
                    from = %message.sender,
                    performative = %message.performative,
                    error = %e,
                    "Malformed message"
                );
                return Ok(());
            }
        };

        let kind = payload.kind();
        let Some(handler) = self.handlers.get_mut(&kind) else {
            debug!(agent = %ctx.id(), kind = %kind, from = %message.sender, "No handler");
            return Ok(());
        };

        match handler.handle(ctx, Envelope { message, payload }).await {
            Err(e) if e.kind() == ErrorKind::MalformedPayload => {
                warn!(agent = %ctx.id(), kind = %kind, error = %e, "Handler rejected payload");
                Ok(())
            }
            other => other,
        }
    }
}

#[async_trait]
impl<S: Send + 'static> CyclicBehavior<S> for Dispatcher<S> {
    fn name(&self) -> &str {
        &self.name
    }

    async fn tick(&mut self, ctx: &AgentContext<S>) -> Result<Flow> {
        match ctx.receive(self.timeout).await? {
            Some(message) => self.dispatch(ctx, message).await?,
            None => debug!(agent = %ctx.id(), behavior = %self.name, "No message, polling again"),
        }
        Ok(Flow::Continue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::AgentRuntime;
    use crate::cyclic::{Cyclic, OneShot};
    use agora_bus::LocalBus;
    use agora_config::BusConfig;
    use agora_core::{
        AgentId, Credentials, HeatReport, MessageChannel, PayloadError, Performative, Transport,
    };

    #[derive(Default)]
    struct Seen {
        heat: Vec<u8>,
        answer: Option<u8>,
    }

    struct RecordHeat;

    #[async_trait]
    impl Handler<Seen> for RecordHeat {
        async fn handle(&mut self, ctx: &AgentContext<Seen>, envelope: Envelope) -> Result<()> {
            if let Payload::HeatStatus(report) = envelope.payload {
                if report.heat_level == 13 {
                    return Err(PayloadError::OutOfRange {
                        field: "heat_level",
                        value: 13,
                    }
                    .into());
                }
                ctx.with_state(|seen| seen.heat.push(report.heat_level));
            }
            Ok(())
        }
    }

    fn heat(from: &AgentId, to: &AgentId, level: u8) -> Message {
        Message::encode(
            from.clone(),
            to.clone(),
            Performative::Inform,
            &Payload::HeatStatus(HeatReport::from_level(level)),
        )
        .unwrap()
    }

    async fn setup() -> (LocalBus, AgentRuntime<Seen>, Box<dyn MessageChannel>) {
        let bus = LocalBus::new(BusConfig::default());
        let me = AgentId::at("coordinator", "localhost");
        let mut agent = AgentRuntime::new(me, Credentials::new("password"), Seen::default());
        let dispatcher = Dispatcher::new("dispatcher", Duration::from_secs(10))
            .on(MessageKind::HeatStatus, RecordHeat);
        assert!(dispatcher.handles(MessageKind::HeatStatus));
        assert!(!dispatcher.handles(MessageKind::TargetDiscovered));
        agent.add_behavior(Cyclic::new(dispatcher)).unwrap();
        agent.start(&bus).await.unwrap();

        let peer = bus
            .connect(&AgentId::at("peer", "localhost"), &Credentials::new("password"))
            .await
            .unwrap();
        (bus, agent, peer)
    }

    #[tokio::test(start_paused = true)]
    async fn malformed_and_rejected_messages_do_not_stop_the_loop() {
        let (_bus, mut agent, peer) = setup().await;
        let me = agent.id().clone();
        let them = peer.identity().clone();

        peer.send(heat(&them, &me, 40)).await.unwrap();
        peer.send(Message::raw(them.clone(), me.clone(), Performative::Inform, "not json"))
            .await
            .unwrap();
        // Right schema, wrong performative
        let mut wrong = heat(&them, &me, 41);
        wrong.performative = Performative::Request;
        peer.send(wrong).await.unwrap();
        peer.send(heat(&them, &me, 13)).await.unwrap();
        peer.send(
            Message::encode(
                them.clone(),
                me.clone(),
                Performative::Request,
                &Payload::CheckHeatLevel {
                    target_name: "unhandled".into(),
                },
            )
            .unwrap(),
        )
        .await
        .unwrap();
        peer.send(heat(&them, &me, 90)).await.unwrap();

        // Long enough for several receive timeouts to pass
        tokio::time::sleep(Duration::from_secs(35)).await;
        assert!(agent.is_alive());
        assert_eq!(agent.with_state(|s| s.heat.clone()), vec![40, 90]);

        agent.stop().await;
    }

    struct AskHeat {
        peer: AgentId,
    }

    #[async_trait]
    impl CyclicBehavior<Seen> for AskHeat {
        fn name(&self) -> &str {
            "ask-heat"
        }

        async fn tick(&mut self, ctx: &AgentContext<Seen>) -> Result<Flow> {
            let request = Payload::CheckHeatLevel {
                target_name: "PaymentAPI".into(),
            };
            if let Some(reply) = ctx.request(&self.peer, &request, Duration::from_secs(5)).await? {
                if let Payload::HeatStatus(report) = reply.decode()? {
                    ctx.with_state(|s| s.answer = Some(report.heat_level));
                }
            }
            Ok(Flow::Done)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn request_reply_bypasses_sibling_dispatcher() {
        let bus = LocalBus::new(BusConfig::default());
        let me = AgentId::at("coordinator", "localhost");
        let peer_id = AgentId::at("peer", "localhost");
        let peer = bus
            .connect(&peer_id, &Credentials::new("password"))
            .await
            .unwrap();

        let mut agent = AgentRuntime::new(me.clone(), Credentials::new("password"), Seen::default());
        agent
            .add_behavior(Cyclic::new(
                Dispatcher::new("dispatcher", Duration::from_secs(10))
                    .on(MessageKind::HeatStatus, RecordHeat),
            ))
            .unwrap();
        agent
            .add_behavior(OneShot::new(AskHeat {
                peer: peer_id.clone(),
            }))
            .unwrap();
        agent.start(&bus).await.unwrap();

        let request = peer
            .receive(Duration::from_secs(5))
            .await
            .unwrap()
            .into_message()
            .unwrap();
        peer.send(heat(&peer_id, &me, 55)).await.unwrap();
        peer.send(
            request
                .reply(
                    Performative::Inform,
                    &Payload::HeatStatus(HeatReport::from_level(20)),
                )
                .unwrap(),
        )
        .await
        .unwrap();

        tokio::time::sleep(Duration::from_secs(1)).await;
        let (heat, answer) = agent.with_state(|s| (s.heat.clone(), s.answer));
        assert_eq!(answer, Some(20));
        assert_eq!(heat, vec![55]);
        assert!(agent.is_alive());

        agent.stop().await;
    }
}
