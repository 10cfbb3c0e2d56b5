//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::auth::AuthGate;
use crate::bus::{BusClient, RedisBusClient};
use crate::config::GatewayConfig;
use crate::domain::TaskStore;
use crate::error::GatewayError;
use crate::gateway::{Gateway, RpcDispatcher};
use crate::service::TaskService;

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Sessions, subscriptions and bus.
    pub gateway: Arc<Gateway>,
    /// Request router for WebSocket frames.
    pub dispatcher: RpcDispatcher,
    /// Token verification and issuance.
    pub auth: Arc<AuthGate>,
    /// Task mutations and event publishing.
    pub task_service: Arc<TaskService>,
    /// Path the WebSocket endpoint is mounted on.
    pub ws_path: Arc<str>,
}

impl AppState {
    /// Wires the state for `config` around an already-built bus client.
    ///
    /// `None` disables the bus entirely.
    #[must_use]
    pub fn with_bus(config: &GatewayConfig, client: Option<Arc<dyn BusClient>>) -> Self {
        let gateway = Arc::new(Gateway::new(client, config.bus_connect_timeout));
        let store = Arc::new(TaskStore::new());
        let dispatcher = RpcDispatcher::new(Arc::clone(&gateway), Arc::clone(&store));
        let task_service = Arc::new(TaskService::new(store, Arc::clone(&gateway)));
        let auth = Arc::new(AuthGate::new(&config.jwt_secret, config.token_ttl_secs));
        Self {
            gateway,
            dispatcher,
            auth,
            task_service,
            ws_path: Arc::from(config.ws_path.as_str()),
        }
    }

    /// Wires the state for `config`, using Redis as the bus when enabled.
    ///
    /// # Errors
    ///
    /// Returns a [`GatewayError::Bus`] if `REDIS_URL` is malformed.
    pub fn from_config(config: &GatewayConfig) -> Result<Self, GatewayError> {
        let client: Option<Arc<dyn BusClient>> = if config.bus_enabled {
            Some(Arc::new(RedisBusClient::open(&config.redis_url)?))
        } else {
            None
        };
        Ok(Self::with_bus(config, client))
    }
}
