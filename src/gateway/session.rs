//! Per-connection session state.

use std::collections::HashSet;
use std::fmt;
use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::auth::Identity;
use crate::error::GatewayError;

/// Unique identifier for a live session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(uuid::Uuid);

impl SessionId {
    /// Creates a new random `SessionId` (UUID v4).
    #[must_use]
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Write side of a client connection.
///
/// Envelopes are queued as serialized JSON text; the connection task owns
/// the socket and drains the queue. Once the connection is gone every send
/// fails.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    tx: mpsc::UnboundedSender<String>,
}

impl ConnectionHandle {
    /// Creates a handle and the receiver the connection task drains.
    #[must_use]
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Queues raw JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Internal`] if the connection is closed.
    pub fn send_text(&self, text: String) -> Result<(), GatewayError> {
        self.tx
            .send(text)
            .map_err(|_| GatewayError::Internal("connection closed".to_string()))
    }

    /// Serializes and queues an envelope.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Internal`] if serialization fails or the
    /// connection is closed.
    pub fn send<T: Serialize>(&self, envelope: &T) -> Result<(), GatewayError> {
        let text = serde_json::to_string(envelope)
            .map_err(|e| GatewayError::Internal(format!("envelope encoding failed: {e}")))?;
        self.send_text(text)
    }
}

/// Server-side state for one authenticated connection.
#[derive(Debug)]
pub struct Session {
    id: SessionId,
    identity: Identity,
    connection: ConnectionHandle,
    channels: Mutex<HashSet<String>>,
}

impl Session {
    /// Creates a session with no subscriptions.
    #[must_use]
    pub fn new(connection: ConnectionHandle, identity: Identity) -> Self {
        Self {
            id: SessionId::new(),
            identity,
            connection,
            channels: Mutex::new(HashSet::new()),
        }
    }

    /// Session identifier.
    #[must_use]
    pub const fn id(&self) -> SessionId {
        self.id
    }

    /// Authenticated identity.
    #[must_use]
    pub const fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Connection write handle.
    #[must_use]
    pub const fn connection(&self) -> &ConnectionHandle {
        &self.connection
    }

    /// Returns `true` if the session holds `channel`.
    #[must_use]
    pub fn holds(&self, channel: &str) -> bool {
        self.lock_channels().contains(channel)
    }

    /// Adds `channel`; returns `false` if it was already held.
    pub fn hold(&self, channel: &str) -> bool {
        self.lock_channels().insert(channel.to_string())
    }

    /// Removes `channel`; returns `false` if it was not held.
    pub fn drop_channel(&self, channel: &str) -> bool {
        self.lock_channels().remove(channel)
    }

    /// Removes and returns every held channel.
    pub fn take_channels(&self) -> HashSet<String> {
        std::mem::take(&mut *self.lock_channels())
    }

    fn lock_channels(&self) -> std::sync::MutexGuard<'_, HashSet<String>> {
        self.channels.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
