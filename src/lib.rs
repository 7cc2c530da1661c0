//! chatrelay - session-scoped WebSocket chat relay.
//!
//! Participants join a password-protected session and exchange short text
//! messages in real time. The core is the session registry
//! ([`state::ConnectionRegistry`]) and fan-out ([`state::BroadcastRelay`]);
//! each connection runs a [`network::SessionConnectionHandler`] that binds
//! it to one session and pumps its messages into the relay.

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod http;
pub mod metrics;
pub mod network;
pub mod server;
pub mod state;
pub mod telemetry;
