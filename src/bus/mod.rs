//! Notification bus: cross-process fan-out with a local fallback.
//!
//! [`BusClient`] is the seam to the external publish/subscribe service
//! ([`RedisBusClient`] in production, [`MemoryBusClient`] in tests).
//! [`NotificationBus`] wraps a client, tracks connectivity as a
//! [`BusState`], and falls back to local delivery through
//! [`NotificationFanout`] whenever the bus cannot be used.

pub mod memory;
pub mod redis;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::{OnceCell, watch};

use crate::gateway::NotificationFanout;

pub use self::memory::MemoryBusClient;
pub use self::redis::RedisBusClient;

/// Connectivity state of the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum BusState {
    /// Startup connect attempt has not resolved yet.
    Connecting,
    /// Bus is connected; fan-out goes through it.
    Ready,
    /// Bus is unusable; fan-out is local only. Terminal.
    Degraded,
}

impl fmt::Display for BusState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Connecting => "connecting",
            Self::Ready => "ready",
            Self::Degraded => "degraded",
        };
        f.write_str(s)
    }
}

/// Failures reported by a [`BusClient`].
#[derive(Debug, Clone, thiserror::Error)]
pub enum BusError {
    /// The bus is in degraded mode or not connected.
    #[error("bus unavailable")]
    Unavailable,
    /// Connecting to the bus failed.
    #[error("connect failed: {0}")]
    Connect(String),
    /// Registering a channel upstream failed.
    #[error("subscribe to {channel} failed: {reason}")]
    Subscribe {
        /// Channel being subscribed.
        channel: String,
        /// Client error message.
        reason: String,
    },
    /// Removing a channel upstream failed.
    #[error("unsubscribe from {channel} failed: {reason}")]
    Unsubscribe {
        /// Channel being unsubscribed.
        channel: String,
        /// Client error message.
        reason: String,
    },
    /// Publishing failed.
    #[error("publish to {channel} failed: {reason}")]
    Publish {
        /// Target channel.
        channel: String,
        /// Client error message.
        reason: String,
    },
}

/// Callback invoked with the raw payload of every message the bus delivers
/// on the channel it was registered for.
pub struct MessageHandler(Arc<dyn Fn(&str) + Send + Sync>);

impl MessageHandler {
    /// Wraps a callback.
    pub fn new(f: impl Fn(&str) + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    /// Invokes the callback.
    pub fn call(&self, payload: &str) {
        (self.0)(payload);
    }
}

impl Clone for MessageHandler {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl fmt::Debug for MessageHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("MessageHandler")
    }
}

/// Raw client for an external publish/subscribe service.
#[async_trait]
pub trait BusClient: Send + Sync + fmt::Debug {
    /// Establishes connectivity.
    async fn connect(&self) -> Result<(), BusError>;

    /// Routes messages for `channel` to `handler`.
    async fn subscribe(&self, channel: &str, handler: MessageHandler) -> Result<(), BusError>;

    /// Stops routing messages for `channel`.
    async fn unsubscribe(&self, channel: &str) -> Result<(), BusError>;

    /// Publishes `payload` on `channel`.
    async fn publish(&self, channel: &str, payload: &str) -> Result<(), BusError>;

    /// Returns `false` once the client can no longer deliver inbound
    /// messages, even if publishing would still succeed.
    fn is_live(&self) -> bool {
        true
    }
}

/// How a published payload reached local sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Handed to the bus, which delivers it back to subscribed handlers.
    Upstream,
    /// Delivered directly to this many local sessions.
    Local(usize),
}

/// Adapter over a [`BusClient`] implementing degraded-mode semantics.
///
/// The connect attempt runs at most once. Every operation awaits it, so
/// calls issued during startup suspend until the bus is either ready or
/// degraded. Once degraded, the adapter never goes back to ready.
pub struct NotificationBus {
    client: Option<Arc<dyn BusClient>>,
    state: watch::Sender<BusState>,
    connected: OnceCell<()>,
    connect_timeout: Duration,
    fanout: NotificationFanout,
}

impl fmt::Debug for NotificationBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotificationBus")
            .field("client", &self.client)
            .field("state", &*self.state.borrow())
            .field("connect_timeout", &self.connect_timeout)
            .finish_non_exhaustive()
    }
}

impl NotificationBus {
    /// Creates an adapter over `client`. The bus starts in
    /// [`BusState::Connecting`].
    #[must_use]
    pub fn new(
        client: Arc<dyn BusClient>,
        fanout: NotificationFanout,
        connect_timeout: Duration,
    ) -> Self {
        let (state, _) = watch::channel(BusState::Connecting);
        Self {
            client: Some(client),
            state,
            connected: OnceCell::new(),
            connect_timeout,
            fanout,
        }
    }

    /// Creates an adapter with no bus at all; fan-out is local only.
    #[must_use]
    pub fn disabled(fanout: NotificationFanout) -> Self {
        let (state, _) = watch::channel(BusState::Degraded);
        let connected = OnceCell::new_with(Some(()));
        Self {
            client: None,
            state,
            connected,
            connect_timeout: Duration::ZERO,
            fanout,
        }
    }

    /// Returns the current connectivity state without waiting.
    #[must_use]
    pub fn state(&self) -> BusState {
        *self.state.borrow()
    }

    /// Returns a receiver that observes state transitions.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<BusState> {
        self.state.subscribe()
    }

    /// Runs the connect attempt (once) and returns the resolved state.
    ///
    /// A failed or timed-out attempt leaves the bus degraded; it is not
    /// retried.
    pub async fn connect(&self) -> BusState {
        self.connected
            .get_or_init(|| async {
                let Some(client) = &self.client else {
                    return;
                };
                match tokio::time::timeout(self.connect_timeout, client.connect()).await {
                    Ok(Ok(())) => {
                        self.state.send_replace(BusState::Ready);
                        tracing::info!("connected to notification bus");
                    }
                    Ok(Err(e)) => {
                        tracing::error!(error = %e, "failed to connect to notification bus");
                        self.mark_degraded();
                    }
                    Err(_) => {
                        tracing::error!(
                            timeout_secs = self.connect_timeout.as_secs(),
                            "notification bus connect timed out"
                        );
                        self.mark_degraded();
                    }
                }
            })
            .await;
        self.state()
    }

    /// Registers `handler` for `channel` upstream.
    ///
    /// No-op in degraded mode: delivery falls back to local fan-out.
    ///
    /// # Errors
    ///
    /// Propagates the client failure; the bus becomes degraded.
    pub async fn subscribe(&self, channel: &str, handler: MessageHandler) -> Result<(), BusError> {
        let Some(client) = self.ready_client().await else {
            return Ok(());
        };
        client.subscribe(channel, handler).await.inspect_err(|e| {
            tracing::error!(channel, error = %e, "bus subscribe failed");
            self.mark_degraded();
        })
    }

    /// Removes the upstream registration for `channel`.
    ///
    /// No-op in degraded mode.
    ///
    /// # Errors
    ///
    /// Propagates the client failure; the bus becomes degraded.
    pub async fn unsubscribe(&self, channel: &str) -> Result<(), BusError> {
        let Some(client) = self.ready_client().await else {
            return Ok(());
        };
        client.unsubscribe(channel).await.inspect_err(|e| {
            tracing::warn!(channel, error = %e, "bus unsubscribe failed");
            self.mark_degraded();
        })
    }

    /// Publishes `payload` on `channel`.
    ///
    /// Never drops the payload: if the bus is degraded, or the upstream
    /// publish fails, it is delivered directly to local subscribers.
    pub async fn publish(&self, channel: &str, payload: &str) -> Delivery {
        if let Some(client) = self.ready_client().await {
            match client.publish(channel, payload).await {
                Ok(()) => return Delivery::Upstream,
                Err(e) => {
                    tracing::error!(channel, error = %e, "bus publish failed, delivering locally");
                    self.mark_degraded();
                }
            }
        }
        Delivery::Local(self.fanout.deliver(channel, payload))
    }

    async fn ready_client(&self) -> Option<&Arc<dyn BusClient>> {
        match self.connect().await {
            BusState::Ready => {
                let client = self.client.as_ref()?;
                if client.is_live() {
                    Some(client)
                } else {
                    tracing::error!("notification bus stopped delivering messages");
                    self.mark_degraded();
                    None
                }
            }
            BusState::Connecting | BusState::Degraded => None,
        }
    }

    fn mark_degraded(&self) {
        let changed = self.state.send_if_modified(|state| {
            if *state == BusState::Degraded {
                false
            } else {
                *state = BusState::Degraded;
                true
            }
        });
        if changed {
            tracing::warn!("notification bus degraded, fan-out is local only");
        }
    }
}
