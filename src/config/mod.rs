//! Configuration loading and management.
//!
//! This module is split into logical submodules:
//! - [`types`]: Core config struct definitions (Config, ServerConfig, DatabaseConfig)
//! - [`listen`]: Network listener configuration (ListenConfig, WebSocketConfig)
//! - [`relay`]: Fan-out and connection timing (RelayConfig)
//! - [`validation`]: Startup validation collecting every problem at once

mod listen;
mod relay;
mod types;
mod validation;

pub use listen::{ListenConfig, WebSocketConfig};
pub use relay::RelayConfig;
pub use types::{Config, ConfigError, DatabaseConfig, ServerConfig};
pub use validation::{ValidationError, validate};
