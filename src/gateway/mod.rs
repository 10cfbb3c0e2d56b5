//! Gateway core: sessions, channel subscriptions, dispatch and fan-out.
//!
//! [`Gateway`] owns every piece of process-wide mutable state (the session
//! registry and the channel reference counts) and is the only way to
//! mutate it.
//!
//! ```text
//! connection ──► SessionRegistry ──► RpcDispatcher
//!                                       │
//!                                       ▼
//!                          SubscriptionRefCounter ──► NotificationBus ──► BusClient
//!                                                           │
//! bus message ──► MessageHandler ──► NotificationFanout ◄───┘ (local fallback)
//! ```

pub mod dispatcher;
pub mod fanout;
pub mod refcount;
pub mod registry;
pub mod session;
pub mod tools;

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use serde::Serialize;

use crate::auth::Identity;
use crate::bus::{BusClient, Delivery, NotificationBus};
use crate::error::GatewayError;

pub use dispatcher::RpcDispatcher;
pub use fanout::NotificationFanout;
pub use refcount::SubscriptionRefCounter;
pub use registry::SessionRegistry;
pub use session::{ConnectionHandle, Session, SessionId};

/// Outcome of a successful [`Gateway::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subscription {
    /// The session already held the channel; nothing changed.
    AlreadyHeld,
    /// The channel was added and its reference acquired.
    Added,
}

/// Aggregate of all gateway state.
#[derive(Debug)]
pub struct Gateway {
    sessions: Arc<SessionRegistry>,
    bus: Arc<NotificationBus>,
    subscriptions: SubscriptionRefCounter,
}

impl Gateway {
    /// Creates a gateway over `client`. With `None` the bus is disabled and
    /// fan-out is local only.
    #[must_use]
    pub fn new(client: Option<Arc<dyn BusClient>>, connect_timeout: Duration) -> Self {
        let sessions = Arc::new(SessionRegistry::new());
        let fanout = NotificationFanout::new(Arc::clone(&sessions));
        let bus = Arc::new(match client {
            Some(client) => NotificationBus::new(client, fanout.clone(), connect_timeout),
            None => NotificationBus::disabled(fanout.clone()),
        });
        let subscriptions = SubscriptionRefCounter::new(Arc::clone(&bus), fanout);
        Self {
            sessions,
            bus,
            subscriptions,
        }
    }

    /// The bus adapter.
    #[must_use]
    pub fn bus(&self) -> &NotificationBus {
        &self.bus
    }

    /// Live sessions.
    #[must_use]
    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    /// Channel reference counts.
    #[cfg(test)]
    pub(crate) const fn subscriptions(&self) -> &SubscriptionRefCounter {
        &self.subscriptions
    }

    /// Registers a session for an authenticated connection.
    pub fn open_session(&self, connection: ConnectionHandle, identity: Identity) -> Arc<Session> {
        let session = self.sessions.create(connection, identity);
        tracing::info!(
            session_id = %session.id(),
            subject = %session.identity().subject,
            "session opened"
        );
        session
    }

    /// Removes a session and releases every channel it held.
    ///
    /// Returns how many channels were released. Unknown sessions are
    /// ignored.
    pub async fn close_session(&self, id: SessionId) -> usize {
        let Some(channels) = self.sessions.remove(id) else {
            return 0;
        };
        let releases = channels.iter().map(|channel| async move {
            if let Err(e) = self.subscriptions.release(channel).await {
                tracing::warn!(session_id = %id, channel, error = %e, "release failed on disconnect");
            }
        });
        join_all(releases).await;
        tracing::info!(session_id = %id, released = channels.len(), "session closed");
        channels.len()
    }

    /// Subscribes `session` to `channel`.
    ///
    /// The channel is added to the session first, then its reference is
    /// acquired; if the acquire fails the add is rolled back.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::SubscribeFailed`] if the upstream subscribe
    /// fails.
    pub async fn subscribe(
        &self,
        session: &Session,
        channel: &str,
    ) -> Result<Subscription, GatewayError> {
        if !session.hold(channel) {
            return Ok(Subscription::AlreadyHeld);
        }
        match self.subscriptions.acquire(channel).await {
            Ok(_) => Ok(Subscription::Added),
            Err(source) => {
                session.drop_channel(channel);
                tracing::error!(session_id = %session.id(), channel, error = %source, "subscribe failed");
                Err(GatewayError::SubscribeFailed {
                    channel: channel.to_string(),
                    source,
                })
            }
        }
    }

    /// Unsubscribes `session` from `channel`.
    ///
    /// Returns `false` if the session did not hold it. Release failures are
    /// logged, not returned.
    pub async fn unsubscribe(&self, session: &Session, channel: &str) -> bool {
        if !session.drop_channel(channel) {
            return false;
        }
        if let Err(e) = self.subscriptions.release(channel).await {
            tracing::warn!(session_id = %session.id(), channel, error = %e, "release failed");
        }
        true
    }

    /// Serializes `data` and publishes it on `channel`.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Internal`] if `data` cannot be serialized.
    pub async fn publish<T: Serialize>(
        &self,
        channel: &str,
        data: &T,
    ) -> Result<Delivery, GatewayError> {
        let payload = serde_json::to_string(data)
            .map_err(|e| GatewayError::Internal(format!("payload encoding failed: {e}")))?;
        Ok(self.bus.publish(channel, &payload).await)
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::bus::{BusState, MemoryBusClient};

    fn identity() -> Identity {
        Identity {
            subject: "demo-user".into(),
            scopes: vec!["basic".into()],
        }
    }

    fn gateway_over(client: &Arc<MemoryBusClient>) -> Gateway {
        let client: Arc<dyn BusClient> = Arc::clone(client) as Arc<dyn BusClient>;
        Gateway::new(Some(client), Duration::from_secs(1))
    }

    #[tokio::test]
    async fn refcount_matches_session_holdings() {
        let client = Arc::new(MemoryBusClient::new());
        let gateway = gateway_over(&client);
        let (c1, _r1) = ConnectionHandle::channel();
        let (c2, _r2) = ConnectionHandle::channel();
        let a = gateway.open_session(c1, identity());
        let b = gateway.open_session(c2, identity());

        assert!(gateway.subscribe(&a, "tasks").await.is_ok());
        assert!(gateway.subscribe(&b, "tasks").await.is_ok());
        assert!(gateway.subscribe(&b, "alerts").await.is_ok());

        for channel in ["tasks", "alerts"] {
            assert_eq!(
                gateway.subscriptions().refcount(channel).await,
                gateway.sessions().subscriber_count(channel)
            );
        }
    }

    #[tokio::test]
    async fn repeated_subscribe_is_idempotent() {
        let client = Arc::new(MemoryBusClient::new());
        let gateway = gateway_over(&client);
        let (conn, _rx) = ConnectionHandle::channel();
        let session = gateway.open_session(conn, identity());

        assert!(matches!(
            gateway.subscribe(&session, "tasks").await,
            Ok(Subscription::Added)
        ));
        assert!(matches!(
            gateway.subscribe(&session, "tasks").await,
            Ok(Subscription::AlreadyHeld)
        ));
        assert_eq!(gateway.subscriptions().refcount("tasks").await, 1);
    }

    #[tokio::test]
    async fn subscribe_then_unsubscribe_restores_global_state() {
        let client = Arc::new(MemoryBusClient::new());
        let gateway = gateway_over(&client);
        let (conn, _rx) = ConnectionHandle::channel();
        let session = gateway.open_session(conn, identity());

        let _ = gateway.subscribe(&session, "tasks").await;
        assert!(gateway.unsubscribe(&session, "tasks").await);
        assert_eq!(client.subscribe_calls(), client.unsubscribe_calls());
        assert!(!client.has_handler("tasks"));
        assert!(gateway.subscriptions().channels().await.is_empty());
        assert!(!gateway.unsubscribe(&session, "tasks").await);
    }

    #[tokio::test]
    async fn failed_subscribe_rolls_back_session() {
        let client = Arc::new(MemoryBusClient::new());
        client.fail_subscribe(true);
        let gateway = gateway_over(&client);
        let (conn, _rx) = ConnectionHandle::channel();
        let session = gateway.open_session(conn, identity());

        let result = gateway.subscribe(&session, "tasks").await;
        assert!(matches!(result, Err(GatewayError::SubscribeFailed { .. })));
        assert!(!session.holds("tasks"));
        assert_eq!(gateway.subscriptions().refcount("tasks").await, 0);
    }

    #[tokio::test]
    async fn close_session_releases_each_channel_once() {
        let client = Arc::new(MemoryBusClient::new());
        let gateway = gateway_over(&client);
        let (c1, _r1) = ConnectionHandle::channel();
        let (c2, _r2) = ConnectionHandle::channel();
        let leaving = gateway.open_session(c1, identity());
        let staying = gateway.open_session(c2, identity());
        for channel in ["a", "b", "c"] {
            let _ = gateway.subscribe(&leaving, channel).await;
        }
        let _ = gateway.subscribe(&staying, "a").await;

        assert_eq!(gateway.close_session(leaving.id()).await, 3);
        assert_eq!(gateway.subscriptions().refcount("a").await, 1);
        assert_eq!(gateway.subscriptions().refcount("b").await, 0);
        assert_eq!(client.unsubscribe_calls(), 2);
        assert_eq!(gateway.close_session(leaving.id()).await, 0);
        assert_eq!(client.unsubscribe_calls(), 2);
    }

    #[tokio::test]
    async fn concurrent_subscribers_share_one_upstream_subscribe() {
        let client = Arc::new(MemoryBusClient::new());
        client.set_subscribe_delay(Duration::from_millis(20));
        let gateway = gateway_over(&client);
        let (c1, _r1) = ConnectionHandle::channel();
        let (c2, _r2) = ConnectionHandle::channel();
        let a = gateway.open_session(c1, identity());
        let b = gateway.open_session(c2, identity());

        let (ra, rb) = tokio::join!(gateway.subscribe(&a, "fresh"), gateway.subscribe(&b, "fresh"));
        assert!(ra.is_ok() && rb.is_ok());
        assert_eq!(client.subscribe_calls(), 1);
        assert_eq!(gateway.subscriptions().refcount("fresh").await, 2);
    }

    #[tokio::test]
    async fn publish_through_ready_bus_reaches_subscribers() {
        let client = Arc::new(MemoryBusClient::new());
        let gateway = gateway_over(&client);
        let (conn, mut rx) = ConnectionHandle::channel();
        let session = gateway.open_session(conn, identity());
        let _ = gateway.subscribe(&session, "tasks").await;

        let delivery = gateway.publish("tasks", &serde_json::json!({"n": 1})).await;
        assert!(matches!(delivery, Ok(Delivery::Upstream)));
        let Some(text) = rx.recv().await else {
            panic!("notification expected");
        };
        assert!(text.contains(r#""channel":"tasks""#));
    }

    #[tokio::test]
    async fn degraded_publish_delivers_locally_without_bus_calls() {
        let client = Arc::new(MemoryBusClient::new());
        client.fail_connect(true);
        let gateway = gateway_over(&client);
        let (c1, mut r1) = ConnectionHandle::channel();
        let (c2, mut r2) = ConnectionHandle::channel();
        let a = gateway.open_session(c1, identity());
        let b = gateway.open_session(c2, identity());
        let _ = gateway.subscribe(&a, "tasks").await;
        let _ = gateway.subscribe(&b, "tasks").await;
        assert_eq!(gateway.bus().state(), BusState::Degraded);

        let delivery = gateway.publish("tasks", &"hello").await;
        assert!(matches!(delivery, Ok(Delivery::Local(2))));
        assert!(r1.recv().await.is_some());
        assert!(r2.recv().await.is_some());
        assert_eq!(client.subscribe_calls(), 0);
        assert_eq!(client.publish_calls(), 0);
    }

    #[tokio::test]
    async fn disabled_bus_is_local_only() {
        let gateway = Gateway::new(None, Duration::from_secs(1));
        assert_eq!(gateway.bus().state(), BusState::Degraded);
        let (conn, mut rx) = ConnectionHandle::channel();
        let session = gateway.open_session(conn, identity());
        assert!(gateway.subscribe(&session, "tasks").await.is_ok());
        assert_eq!(gateway.subscriptions().refcount("tasks").await, 1);
        let delivery = gateway.publish("tasks", &1).await;
        assert!(matches!(delivery, Ok(Delivery::Local(1))));
        assert!(rx.recv().await.is_some());
    }
}
