//! Network module.
//!
//! Contains the Gateway (WebSocket listener) and the per-connection
//! handler that binds a chat stream to its session.

mod connection;
mod gateway;

pub use connection::{Connection, FrameSource, HandlerState, SessionConnectionHandler};
pub use gateway::{Gateway, STREAM_PATH};
