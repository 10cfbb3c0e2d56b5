//! # todo-gateway
//!
//! Real-time WebSocket gateway that multiplexes authenticated client
//! connections onto one shared publish/subscribe bus.
//!
//! Clients connect with a bearer token, issue JSON-RPC shaped requests
//! (`callTool`, `subscribe`, `unsubscribe`) and receive notifications for
//! the channels they subscribed to. Upstream bus subscriptions are
//! reference counted per channel; when the bus is unavailable the gateway
//! keeps delivering to locally connected sessions.
//!
//! ## Architecture
//!
//! ```text
//! Clients (HTTP, WebSocket)
//!     │
//!     ├── REST Handlers (api/) ──► TaskService (service/) ──► TaskStore (domain/)
//!     ├── WS Handler (ws/) ──► AuthGate (auth)
//!     │                   │
//!     │                   ▼
//!     ├── Gateway (gateway/)
//!     │     ├── SessionRegistry
//!     │     ├── RpcDispatcher
//!     │     ├── SubscriptionRefCounter
//!     │     └── NotificationFanout
//!     │
//!     └── NotificationBus (bus/) ──► Redis pub/sub
//! ```

pub mod api;
pub mod app_state;
pub mod auth;
pub mod bus;
pub mod config;
pub mod domain;
pub mod error;
pub mod gateway;
pub mod server;
pub mod service;
pub mod ws;
