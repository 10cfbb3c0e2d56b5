//! Local notification delivery.

use std::sync::Arc;

use serde_json::Value;

use super::SessionRegistry;
use crate::ws::messages::Notification;

/// Writes notification envelopes to every local session subscribed to a
/// channel.
#[derive(Debug, Clone)]
pub struct NotificationFanout {
    sessions: Arc<SessionRegistry>,
}

impl NotificationFanout {
    /// Creates a fan-out over the given registry.
    #[must_use]
    pub fn new(sessions: Arc<SessionRegistry>) -> Self {
        Self { sessions }
    }

    /// Delivers `payload` to every session holding `channel` and returns
    /// how many sessions accepted it.
    ///
    /// The payload is forwarded as JSON when it parses, otherwise as a
    /// string. A failed write to one session does not affect the others.
    pub fn deliver(&self, channel: &str, payload: &str) -> usize {
        let payload = serde_json::from_str::<Value>(payload)
            .unwrap_or_else(|_| Value::String(payload.to_string()));
        let text = match serde_json::to_string(&Notification::new(channel, payload)) {
            Ok(text) => text,
            Err(e) => {
                tracing::error!(channel, error = %e, "failed to encode notification");
                return 0;
            }
        };

        let mut delivered = 0usize;
        self.sessions.for_each_subscriber(channel, |session| {
            match session.connection().send_text(text.clone()) {
                Ok(()) => delivered += 1,
                Err(e) => {
                    tracing::debug!(session_id = %session.id(), channel, error = %e, "notification write failed");
                }
            }
        });
        delivered
    }
}
