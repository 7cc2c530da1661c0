//! Integration test common infrastructure.
//!
//! Provides an in-process test server and a WebSocket chat client for
//! asserting on frame flows.

#![allow(dead_code)]

pub mod client;
pub mod server;

#[allow(unused_imports)]
pub use client::TestClient;
#[allow(unused_imports)]
pub use server::TestServer;
