//! Cross-tab broadcast port.
//!
//! Tabs exchange [`CacheMessage`]s on a named channel. Delivery is
//! at-most-once and best-effort: tabs that are not subscribed miss the
//! message, a lagging subscriber skips what it could not keep up with, and a
//! publisher never receives its own messages.
//!
//! [`LocalBroadcastHub`] is the in-process transport. It carries messages as
//! JSON text, the way a structured-clone channel would, so every message
//! that crosses it is known to be serialisable.

use async_trait::async_trait;
use stride_core::{new_tab_id, BroadcastError, CacheMessage, TabId};
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Default number of messages buffered per subscriber.
pub const DEFAULT_HUB_CAPACITY: usize = 64;

/// Publish/subscribe access to one named cross-tab channel.
pub trait BroadcastPort: Send + Sync {
    /// Channel name this port publishes on.
    fn channel(&self) -> &str;

    /// Publish to every other subscribed tab. Returns the number of
    /// transport-level receivers the message reached.
    fn publish(&self, message: &CacheMessage) -> Result<usize, BroadcastError>;

    /// Subscribe to messages published by other tabs on this channel.
    fn subscribe(&self) -> Result<Box<dyn BroadcastSubscription>, BroadcastError>;
}

/// Receiving side of a [`BroadcastPort`].
#[async_trait]
pub trait BroadcastSubscription: Send {
    /// Next pending message without waiting, or `None` if nothing is queued.
    fn try_next(&mut self) -> Option<CacheMessage>;

    /// Wait for the next message. `None` once the channel is closed.
    async fn next(&mut self) -> Option<CacheMessage>;
}

/// A message as it travels through the hub.
#[derive(Debug, Clone)]
pub struct Envelope {
    pub channel: String,
    pub origin: TabId,
    pub body: String,
}

/// In-process broadcast hub shared by simulated tabs.
///
/// Cloning the hub shares the underlying channel.
#[derive(Clone)]
pub struct LocalBroadcastHub {
    tx: broadcast::Sender<Envelope>,
}

impl Default for LocalBroadcastHub {
    fn default() -> Self {
        Self::new(DEFAULT_HUB_CAPACITY)
    }
}

impl LocalBroadcastHub {
    /// Create a hub buffering up to `capacity` messages per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Open a port for a new tab on `channel`.
    pub fn tab(&self, channel: impl Into<String>) -> TabChannel {
        TabChannel {
            tx: self.tx.clone(),
            origin: new_tab_id(),
            channel: channel.into(),
        }
    }
}

/// One tab's handle on a [`LocalBroadcastHub`] channel.
#[derive(Clone)]
pub struct TabChannel {
    tx: broadcast::Sender<Envelope>,
    origin: TabId,
    channel: String,
}

impl TabChannel {
    pub fn origin(&self) -> TabId {
        self.origin
    }
}

impl BroadcastPort for TabChannel {
    fn channel(&self) -> &str {
        &self.channel
    }

    fn publish(&self, message: &CacheMessage) -> Result<usize, BroadcastError> {
        let body = serde_json::to_string(message).map_err(|e| BroadcastError::Serialization {
            reason: e.to_string(),
        })?;
        let envelope = Envelope {
            channel: self.channel.clone(),
            origin: self.origin,
            body,
        };
        match self.tx.send(envelope) {
            Ok(receivers) => {
                debug!(
                    channel = %self.channel,
                    message_type = message.message_type(),
                    receivers,
                    "Broadcast cache message"
                );
                Ok(receivers)
            }
            Err(_) => {
                // No other tab is listening - this is fine
                debug!(channel = %self.channel, message_type = message.message_type(), "No receivers for cache message");
                Ok(0)
            }
        }
    }

    fn subscribe(&self) -> Result<Box<dyn BroadcastSubscription>, BroadcastError> {
        Ok(Box::new(TabSubscription {
            rx: self.tx.subscribe(),
            origin: self.origin,
            channel: self.channel.clone(),
        }))
    }
}

struct TabSubscription {
    rx: broadcast::Receiver<Envelope>,
    origin: TabId,
    channel: String,
}

impl TabSubscription {
    /// Decode an envelope addressed to this tab, skipping own or foreign-channel traffic.
    fn accept(&self, envelope: Envelope) -> Option<CacheMessage> {
        if envelope.origin == self.origin || envelope.channel != self.channel {
            return None;
        }
        match serde_json::from_str(&envelope.body) {
            Ok(message) => Some(message),
            Err(e) => {
                warn!(channel = %self.channel, error = %e, "Dropping undecodable cache message");
                None
            }
        }
    }
}

#[async_trait]
impl BroadcastSubscription for TabSubscription {
    fn try_next(&mut self) -> Option<CacheMessage> {
        loop {
            match self.rx.try_recv() {
                Ok(envelope) => {
                    if let Some(message) = self.accept(envelope) {
                        return Some(message);
                    }
                }
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    warn!(channel = %self.channel, skipped, "Cache sync subscriber lagged");
                }
                Err(broadcast::error::TryRecvError::Empty)
                | Err(broadcast::error::TryRecvError::Closed) => return None,
            }
        }
    }

    async fn next(&mut self) -> Option<CacheMessage> {
        loop {
            match self.rx.recv().await {
                Ok(envelope) => {
                    if let Some(message) = self.accept(envelope) {
                        return Some(message);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(channel = %self.channel, skipped, "Cache sync subscriber lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}
