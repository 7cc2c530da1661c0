//! # chatrelay-proto
//!
//! Wire types and framing for the chatrelay session chat protocol.
//!
//! ## Features
//!
//! - [`ChatMessage`] and the inbound [`MessagePayload`] it is built from
//! - Case-normalized [`SessionId`]
//! - Tagged JSON frames ([`ClientFrame`], [`ServerFrame`]) with size-limited decoding
//! - WebSocket upgrade validation (origin allow-list, subprotocol negotiation)
//!   and connection-time credential extraction from the upgrade URI
//! - Optional Tokio integration: a split WebSocket frame transport
//!
//! ## Quick Start
//!
//! ```rust
//! use chatrelay_proto::{ClientFrame, SessionId};
//!
//! let raw = r##"{"type":"handshake","sessionId":"abcd1234","username":"alice","color":"#00ff00"}"##;
//! let frame = ClientFrame::decode(raw, 4096).expect("valid handshake");
//!
//! if let ClientFrame::Handshake(handshake) = frame {
//!     let session = handshake.session_id().expect("non-empty id");
//!     assert_eq!(session, SessionId::parse("ABCD1234").unwrap());
//! }
//! ```

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod error;
pub mod frame;
pub mod message;
#[cfg(feature = "tokio")]
pub mod transport;
pub mod websocket;

pub use self::error::{ErrorCode, ProtocolError};
pub use self::frame::{ClientFrame, Handshake, ServerFrame};
pub use self::message::{ChatMessage, MessagePayload, SenderIdentity, SessionId, DEFAULT_COLOR};
#[cfg(feature = "tokio")]
pub use self::transport::{split, FrameReader, FrameWriter, TransportReadError};
pub use self::websocket::{Credentials, HandshakeResult, WebSocketConfig, SUBPROTOCOL};

/// Default upper bound on a single inbound text frame, in bytes.
pub const MAX_FRAME_LEN: usize = 16 * 1024;
