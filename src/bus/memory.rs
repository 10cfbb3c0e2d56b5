//! In-process bus client.
//!
//! [`MemoryBusClient`] behaves like a single-node pub/sub server: a publish
//! is handed synchronously to the handler registered for the channel. It
//! counts every call and can be told to fail or to stall, which makes it
//! the bus used throughout the test suite.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use super::{BusClient, BusError, MessageHandler};

/// In-memory [`BusClient`] with call counters and failure injection.
#[derive(Debug, Default)]
pub struct MemoryBusClient {
    handlers: Mutex<HashMap<String, MessageHandler>>,
    connect_calls: AtomicUsize,
    subscribe_calls: AtomicUsize,
    unsubscribe_calls: AtomicUsize,
    publish_calls: AtomicUsize,
    fail_connect: AtomicBool,
    fail_subscribe: AtomicBool,
    fail_publish: AtomicBool,
    stream_closed: AtomicBool,
    connect_delay: Mutex<Duration>,
    subscribe_delay: Mutex<Duration>,
}

impl MemoryBusClient {
    /// Creates a healthy client with no registered channels.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes subsequent `connect` calls fail.
    pub fn fail_connect(&self, fail: bool) {
        self.fail_connect.store(fail, Ordering::SeqCst);
    }

    /// Makes subsequent `subscribe` calls fail.
    pub fn fail_subscribe(&self, fail: bool) {
        self.fail_subscribe.store(fail, Ordering::SeqCst);
    }

    /// Makes subsequent `publish` calls fail.
    pub fn fail_publish(&self, fail: bool) {
        self.fail_publish.store(fail, Ordering::SeqCst);
    }

    /// Simulates the inbound message stream ending.
    pub fn close_stream(&self) {
        self.stream_closed.store(true, Ordering::SeqCst);
    }

    /// Delays every `connect` call.
    pub fn set_connect_delay(&self, delay: Duration) {
        *self
            .connect_delay
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = delay;
    }

    /// Delays every `subscribe` call, widening race windows in tests.
    pub fn set_subscribe_delay(&self, delay: Duration) {
        *self
            .subscribe_delay
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = delay;
    }

    /// Number of `connect` calls so far.
    #[must_use]
    pub fn connect_calls(&self) -> usize {
        self.connect_calls.load(Ordering::SeqCst)
    }

    /// Number of `subscribe` calls so far.
    #[must_use]
    pub fn subscribe_calls(&self) -> usize {
        self.subscribe_calls.load(Ordering::SeqCst)
    }

    /// Number of `unsubscribe` calls so far.
    #[must_use]
    pub fn unsubscribe_calls(&self) -> usize {
        self.unsubscribe_calls.load(Ordering::SeqCst)
    }

    /// Number of `publish` calls so far.
    #[must_use]
    pub fn publish_calls(&self) -> usize {
        self.publish_calls.load(Ordering::SeqCst)
    }

    /// Returns `true` if a handler is registered for `channel`.
    #[must_use]
    pub fn has_handler(&self, channel: &str) -> bool {
        self.handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(channel)
    }

    fn delay(slot: &Mutex<Duration>) -> Duration {
        *slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl BusClient for MemoryBusClient {
    async fn connect(&self) -> Result<(), BusError> {
        self.connect_calls.fetch_add(1, Ordering::SeqCst);
        let delay = Self::delay(&self.connect_delay);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if self.fail_connect.load(Ordering::SeqCst) {
            return Err(BusError::Connect("connection refused".to_string()));
        }
        Ok(())
    }

    async fn subscribe(&self, channel: &str, handler: MessageHandler) -> Result<(), BusError> {
        self.subscribe_calls.fetch_add(1, Ordering::SeqCst);
        let delay = Self::delay(&self.subscribe_delay);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if self.fail_subscribe.load(Ordering::SeqCst) {
            return Err(BusError::Subscribe {
                channel: channel.to_string(),
                reason: "injected failure".to_string(),
            });
        }
        self.handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(channel.to_string(), handler);
        Ok(())
    }

    async fn unsubscribe(&self, channel: &str) -> Result<(), BusError> {
        self.unsubscribe_calls.fetch_add(1, Ordering::SeqCst);
        self.handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(channel);
        Ok(())
    }

    async fn publish(&self, channel: &str, payload: &str) -> Result<(), BusError> {
        self.publish_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_publish.load(Ordering::SeqCst) {
            return Err(BusError::Publish {
                channel: channel.to_string(),
                reason: "injected failure".to_string(),
            });
        }
        let handler = self
            .handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(channel)
            .cloned();
        if let Some(handler) = handler {
            handler.call(payload);
        }
        Ok(())
    }

    fn is_live(&self) -> bool {
        !self.stream_closed.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[tokio::test]
    async fn publish_reaches_registered_handler() {
        let client = MemoryBusClient::new();
        let received = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&received);
        let handler = MessageHandler::new(move |p| {
            sink.lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(p.to_string());
        });
        tokio_test::assert_ok!(client.subscribe("tasks", handler).await);
        tokio_test::assert_ok!(client.publish("tasks", "hello").await);
        tokio_test::assert_ok!(client.publish("other", "ignored").await);
        let received = received.lock().unwrap_or_else(PoisonError::into_inner);
        assert_eq!(*received, vec!["hello".to_string()]);
    }

    #[tokio::test]
    async fn unsubscribe_removes_handler() {
        let client = MemoryBusClient::new();
        tokio_test::assert_ok!(client.subscribe("tasks", MessageHandler::new(|_| {})).await);
        assert!(client.has_handler("tasks"));
        tokio_test::assert_ok!(client.unsubscribe("tasks").await);
        assert!(!client.has_handler("tasks"));
        assert_eq!(client.subscribe_calls(), 1);
        assert_eq!(client.unsubscribe_calls(), 1);
    }

    #[tokio::test]
    async fn injected_subscribe_failure_keeps_no_handler() {
        let client = MemoryBusClient::new();
        client.fail_subscribe(true);
        let result = client.subscribe("tasks", MessageHandler::new(|_| {})).await;
        tokio_test::assert_err!(result);
        assert!(!client.has_handler("tasks"));
    }
}
