//! WebSocket layer: upgrade, connection loop, envelopes.
//!
//! The WebSocket endpoint (default `/mcp/ws`) carries JSON-RPC shaped
//! requests from the client and responses plus channel notifications from
//! the server.

pub mod connection;
pub mod handler;
pub mod messages;
