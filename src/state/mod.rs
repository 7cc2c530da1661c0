//! State management module.
//!
//! Contains the Hub (shared relay state) and the session registry, relay
//! and connection handles it is built from.

pub mod actor;
mod connection;
mod hub;
mod registry;
mod relay;
mod uid;

pub use connection::{CloseReason, ConnectionHandle, SendFailure};
pub use hub::Hub;
pub use registry::ConnectionRegistry;
pub use relay::{BroadcastRelay, FanoutReport};
pub use uid::{ConnectionId, ConnectionIdGenerator};
