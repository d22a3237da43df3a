//! In-process message bus.
//!
//! [`LocalBus`] plays the role of the relay server: it keeps one bounded
//! inbox per connected identity and routes every sent message into the
//! recipient's inbox. Agents never see the bus directly, only the
//! [`MessageChannel`] it hands out on connect.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use agora_config::BusConfig;
use agora_core::{AgentId, ChannelError, Credentials, Message, MessageChannel, Received, Transport};
use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};

struct Mailbox {
    session: u64,
    tx: mpsc::Sender<Message>,
}

struct BusInner {
    config: BusConfig,
    mailboxes: RwLock<HashMap<AgentId, Mailbox>>,
    accounts: RwLock<HashMap<AgentId, String>>,
    next_session: AtomicU64,
}

impl BusInner {
    fn sender_for(&self, recipient: &AgentId) -> Option<mpsc::Sender<Message>> {
        self.mailboxes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(recipient)
            .map(|mailbox| mailbox.tx.clone())
    }

    /// Drop the mailbox of `identity` if it still belongs to `session`.
    fn release(&self, identity: &AgentId, session: u64) -> bool {
        let mut mailboxes = self.mailboxes.write().unwrap_or_else(PoisonError::into_inner);
        match mailboxes.get(identity) {
            Some(mailbox) if mailbox.session == session => {
                mailboxes.remove(identity);
                true
            }
            _ => false,
        }
    }
}

/// A message bus living inside the current process.
///
/// Cheap to clone; all clones share the same routing table.
#[derive(Clone)]
pub struct LocalBus {
    inner: Arc<BusInner>,
}

impl std::fmt::Debug for LocalBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalBus")
            .field("domain", &self.inner.config.domain)
            .field("online", &self.online().len())
            .finish()
    }
}

impl LocalBus {
    pub fn new(config: BusConfig) -> Self {
        Self {
            inner: Arc::new(BusInner {
                config,
                mailboxes: RwLock::new(HashMap::new()),
                accounts: RwLock::new(HashMap::new()),
                next_session: AtomicU64::new(1),
            }),
        }
    }

    /// Create an account ahead of time. Replaces any existing password.
    pub fn register(&self, identity: AgentId, credentials: &Credentials) {
        info!(identity = %identity, "Registered account");
        self.inner
            .accounts
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(identity, credentials.password().to_string());
    }

    /// Identities with a live session, sorted.
    pub fn online(&self) -> Vec<AgentId> {
        let mut ids: Vec<AgentId> = self
            .inner
            .mailboxes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        ids.sort();
        ids
    }

    pub fn is_online(&self, identity: &AgentId) -> bool {
        self.inner
            .mailboxes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(identity)
    }

    pub fn domain(&self) -> &str {
        &self.inner.config.domain
    }

    fn authenticate(&self, identity: &AgentId, credentials: &Credentials) -> Result<(), ChannelError> {
        let refuse = |reason: &str| ChannelError::ConnectionFailed {
            identity: identity.clone(),
            reason: reason.to_string(),
        };

        if identity.domain() != Some(self.inner.config.domain.as_str()) {
            return Err(refuse("identity does not belong to this domain"));
        }

        let mut accounts = self.inner.accounts.write().unwrap_or_else(PoisonError::into_inner);
        match accounts.get(identity) {
            Some(password) if password == credentials.password() => Ok(()),
            Some(_) => Err(refuse("authentication failed")),
            None if self.inner.config.auto_register => {
                debug!(identity = %identity, "Auto-registering identity");
                accounts.insert(identity.clone(), credentials.password().to_string());
                Ok(())
            }
            None => Err(refuse("unknown identity")),
        }
    }
}

#[async_trait]
impl Transport for LocalBus {
    async fn connect(
        &self,
        identity: &AgentId,
        credentials: &Credentials,
    ) -> Result<Box<dyn MessageChannel>, ChannelError> {
        self.authenticate(identity, credentials)?;

        let session = self.inner.next_session.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(self.inner.config.inbox_capacity);
        {
            let mut mailboxes = self.inner.mailboxes.write().unwrap_or_else(PoisonError::into_inner);
            if mailboxes.contains_key(identity) {
                return Err(ChannelError::AlreadyConnected(identity.clone()));
            }
            mailboxes.insert(identity.clone(), Mailbox { session, tx });
        }

        info!(identity = %identity, "Connected");
        Ok(Box::new(LocalSession {
            identity: identity.clone(),
            session,
            bus: self.inner.clone(),
            inbox: Mutex::new(rx),
            connected: AtomicBool::new(true),
        }))
    }
}

/// One identity's session on a [`LocalBus`].
pub struct LocalSession {
    identity: AgentId,
    session: u64,
    bus: Arc<BusInner>,
    inbox: Mutex<mpsc::Receiver<Message>>,
    connected: AtomicBool,
}

#[async_trait]
impl MessageChannel for LocalSession {
    fn identity(&self) -> &AgentId {
        &self.identity
    }

    async fn send(&self, message: Message) -> Result<(), ChannelError> {
        if !self.is_connected() {
            return Err(ChannelError::NotConnected(self.identity.clone()));
        }

        let recipient = message.recipient.clone();
        let tx = self
            .bus
            .sender_for(&recipient)
            .ok_or_else(|| ChannelError::RecipientUnavailable(recipient.clone()))?;

        tx.try_send(message).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => ChannelError::DeliveryFailed {
                recipient: recipient.clone(),
                reason: "inbox full".into(),
            },
            mpsc::error::TrySendError::Closed(_) => {
                ChannelError::RecipientUnavailable(recipient.clone())
            }
        })?;

        debug!(from = %self.identity, to = %recipient, "Delivered");
        Ok(())
    }

    async fn receive(&self, timeout: Duration) -> Result<Received, ChannelError> {
        if !self.is_connected() {
            return Err(ChannelError::NotConnected(self.identity.clone()));
        }

        // Waiting for the inbox lock counts against the timeout too.
        let next = async { self.inbox.lock().await.recv().await };
        match tokio::time::timeout(timeout, next).await {
            Ok(Some(message)) => Ok(Received::Message(message)),
            Ok(None) => Err(ChannelError::ConnectionLost(self.identity.clone())),
            Err(_) => Ok(Received::Timeout),
        }
    }

    async fn disconnect(&self) -> Result<(), ChannelError> {
        if self.connected.swap(false, Ordering::SeqCst) && self.bus.release(&self.identity, self.session) {
            info!(identity = %self.identity, "Disconnected");
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

impl Drop for LocalSession {
    fn drop(&mut self) {
        if self.connected.swap(false, Ordering::SeqCst) && self.bus.release(&self.identity, self.session) {
            warn!(identity = %self.identity, "Session dropped without disconnect");
        }
    }
}
