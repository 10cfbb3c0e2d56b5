//! Redis pub/sub client.
//!
//! Publishing goes through a multiplexed connection. Subscriptions use a
//! dedicated pub/sub connection split into a sink (SUBSCRIBE/UNSUBSCRIBE)
//! and a stream drained by a reader task that routes each message to the
//! handler registered for its channel.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use async_trait::async_trait;
use futures_util::{Stream, StreamExt};
use redis::AsyncCommands;
use redis::aio::{MultiplexedConnection, PubSubSink};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use super::{BusClient, BusError, MessageHandler};

type HandlerMap = Arc<RwLock<HashMap<String, MessageHandler>>>;

struct Connections {
    publisher: MultiplexedConnection,
    sink: Mutex<PubSubSink>,
    reader: JoinHandle<()>,
}

/// [`BusClient`] backed by Redis pub/sub.
pub struct RedisBusClient {
    client: redis::Client,
    connections: OnceLock<Connections>,
    handlers: HandlerMap,
    live: Arc<AtomicBool>,
}

impl fmt::Debug for RedisBusClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisBusClient")
            .field("addr", &self.client.get_connection_info().addr)
            .field("connected", &self.connections.get().is_some())
            .finish_non_exhaustive()
    }
}

impl RedisBusClient {
    /// Creates a client for `url`. No connection is made until
    /// [`BusClient::connect`].
    ///
    /// # Errors
    ///
    /// Returns [`BusError::Connect`] if the URL is invalid.
    pub fn open(url: &str) -> Result<Self, BusError> {
        let client = redis::Client::open(url).map_err(|e| BusError::Connect(e.to_string()))?;
        Ok(Self {
            client,
            connections: OnceLock::new(),
            handlers: Arc::new(RwLock::new(HashMap::new())),
            live: Arc::new(AtomicBool::new(false)),
        })
    }

    fn connections(&self) -> Result<&Connections, BusError> {
        self.connections.get().ok_or(BusError::Unavailable)
    }
}

impl Drop for RedisBusClient {
    fn drop(&mut self) {
        if let Some(conns) = self.connections.get() {
            conns.reader.abort();
        }
    }
}

/// Routes every message on `stream` to its channel's handler. Clears
/// `live` when the stream ends.
async fn route_messages<S>(mut stream: S, handlers: HandlerMap, live: Arc<AtomicBool>)
where
    S: Stream<Item = redis::Msg> + Unpin,
{
    while let Some(msg) = stream.next().await {
        let channel = msg.get_channel_name();
        let payload: String = match msg.get_payload() {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!(channel, error = %e, "dropping undecodable bus message");
                continue;
            }
        };
        let handler = handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(channel)
            .cloned();
        if let Some(handler) = handler {
            handler.call(&payload);
        }
    }
    live.store(false, Ordering::SeqCst);
    tracing::error!("redis pub/sub stream closed");
}

#[async_trait]
impl BusClient for RedisBusClient {
    async fn connect(&self) -> Result<(), BusError> {
        let publisher = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| BusError::Connect(e.to_string()))?;
        let pubsub = self
            .client
            .get_async_pubsub()
            .await
            .map_err(|e| BusError::Connect(e.to_string()))?;
        let (sink, stream) = pubsub.split();
        self.live.store(true, Ordering::SeqCst);
        let reader = tokio::spawn(route_messages(
            stream,
            Arc::clone(&self.handlers),
            Arc::clone(&self.live),
        ));

        self.connections
            .set(Connections {
                publisher,
                sink: Mutex::new(sink),
                reader,
            })
            .map_err(|conns| {
                conns.reader.abort();
                BusError::Connect("already connected".to_string())
            })
    }

    async fn subscribe(&self, channel: &str, handler: MessageHandler) -> Result<(), BusError> {
        let conns = self.connections()?;
        self.handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(channel.to_string(), handler);

        let result = conns.sink.lock().await.subscribe(channel).await;
        result.map_err(|e| {
            self.handlers
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(channel);
            BusError::Subscribe {
                channel: channel.to_string(),
                reason: e.to_string(),
            }
        })
    }

    async fn unsubscribe(&self, channel: &str) -> Result<(), BusError> {
        let conns = self.connections()?;
        self.handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(channel);

        conns
            .sink
            .lock()
            .await
            .unsubscribe(channel)
            .await
            .map_err(|e| BusError::Unsubscribe {
                channel: channel.to_string(),
                reason: e.to_string(),
            })
    }

    async fn publish(&self, channel: &str, payload: &str) -> Result<(), BusError> {
        let mut publisher = self.connections()?.publisher.clone();
        publisher
            .publish::<_, _, ()>(channel, payload)
            .await
            .map_err(|e| BusError::Publish {
                channel: channel.to_string(),
                reason: e.to_string(),
            })
    }

    fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn rejects_invalid_url() {
        assert!(matches!(
            RedisBusClient::open("not a url"),
            Err(BusError::Connect(_))
        ));
    }

    #[tokio::test]
    async fn operations_before_connect_are_unavailable() {
        let Ok(client) = RedisBusClient::open("redis://127.0.0.1:6379") else {
            panic!("valid url");
        };
        let result = client.publish("tasks", "{}").await;
        assert!(matches!(result, Err(BusError::Unavailable)));
        let result = client.subscribe("tasks", MessageHandler::new(|_| {})).await;
        assert!(matches!(result, Err(BusError::Unavailable)));
        assert!(!client.is_live());
    }

    #[tokio::test]
    async fn ended_stream_clears_liveness() {
        let live = Arc::new(AtomicBool::new(true));
        let handlers: HandlerMap = Arc::new(RwLock::new(HashMap::new()));
        route_messages(
            futures_util::stream::empty::<redis::Msg>(),
            handlers,
            Arc::clone(&live),
        )
        .await;
        assert!(!live.load(Ordering::SeqCst));
    }
}
