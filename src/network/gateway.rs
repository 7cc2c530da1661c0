//! Gateway - WebSocket listener that accepts chat streams.
//!
//! The Gateway binds the chat stream socket, performs the WebSocket upgrade
//! with origin validation, and spawns a Connection task for each client.
//! Credentials ride in the upgrade URI and are checked after the upgrade,
//! so a refused client still gets an `error` frame explaining why.

use crate::auth::SessionAuthenticator;
use crate::config::WebSocketConfig;
use crate::network::Connection;
use crate::state::Hub;
use chatrelay_proto::Credentials;
use chatrelay_proto::websocket::{HandshakeResult, build_handshake_response, validate_handshake};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::accept_hdr_async_with_config;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig as StreamLimits;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{Instrument, error, info, instrument, warn};

/// Path clients open chat streams on.
pub const STREAM_PATH: &str = "/chat/stream";

/// The Gateway accepts incoming WebSocket connections and spawns handlers.
pub struct Gateway {
    listener: TcpListener,
    handshake: chatrelay_proto::WebSocketConfig,
    max_frame_len: usize,
    hub: Arc<Hub>,
    authenticator: Arc<dyn SessionAuthenticator>,
}

impl Gateway {
    /// Bind the gateway to the configured address.
    pub async fn bind(
        config: &WebSocketConfig,
        hub: Arc<Hub>,
        authenticator: Arc<dyn SessionAuthenticator>,
    ) -> anyhow::Result<Self> {
        let listener = TcpListener::bind(config.address).await?;
        info!(address = %listener.local_addr()?, "WebSocket listener bound");

        Ok(Self {
            listener,
            handshake: config.handshake_config(),
            max_frame_len: config.max_message_bytes,
            hub,
            authenticator,
        })
    }

    /// Address actually bound (useful when configured with port 0).
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept connections until `shutdown` fires, then wait for every
    /// connection task to finish.
    #[instrument(skip(self, shutdown), name = "gateway")]
    pub async fn run(self, shutdown: CancellationToken) -> anyhow::Result<()> {
        let tracker = TaskTracker::new();

        loop {
            let accepted = tokio::select! {
                _ = shutdown.cancelled() => break,
                accepted = self.listener.accept() => accepted,
            };

            match accepted {
                Ok((stream, addr)) => {
                    let id = self.hub.conn_ids.next();
                    let span = crate::telemetry::spans::connection(&id.to_string(), &addr);
                    let hub = Arc::clone(&self.hub);
                    let authenticator = Arc::clone(&self.authenticator);
                    let handshake = self.handshake.clone();
                    let max_frame_len = self.max_frame_len;

                    tracker.spawn(
                        async move {
                            let Some((ws_stream, credentials)) =
                                upgrade(stream, addr, &handshake, max_frame_len).await
                            else {
                                return;
                            };
                            let connection = Connection::new(
                                id,
                                ws_stream,
                                addr,
                                credentials,
                                hub,
                                authenticator,
                                max_frame_len,
                            );
                            match connection.run().await {
                                Ok(()) => info!("connection closed"),
                                Err(e) => info!(code = e.error_code(), error = %e, "connection closed with error"),
                            }
                        }
                        .instrument(span),
                    );
                }
                Err(e) => {
                    error!(error = %e, "Failed to accept WebSocket connection");
                }
            }
        }

        tracker.close();
        info!(open = tracker.len(), "gateway stopped accepting, waiting for connections");
        tracker.wait().await;
        Ok(())
    }
}

/// WebSocket read limits so an oversized message is refused from its
/// header instead of being buffered first.
fn stream_limits(max_frame_len: usize) -> StreamLimits {
    let mut limits = StreamLimits::default();
    limits.max_message_size = Some(max_frame_len);
    limits.max_frame_size = Some(max_frame_len);
    limits
}

/// Perform the WebSocket upgrade, capturing credentials from the URI.
async fn upgrade(
    stream: TcpStream,
    addr: SocketAddr,
    handshake: &chatrelay_proto::WebSocketConfig,
    max_frame_len: usize,
) -> Option<(
    tokio_tungstenite::WebSocketStream<TcpStream>,
    Option<Credentials>,
)> {
    let mut query = None;

    let callback = |req: &Request, response: Response| -> Result<Response, ErrorResponse> {
        if req.uri().path() != STREAM_PATH {
            let mut rejection = ErrorResponse::new(Some("not found".to_string()));
            *rejection.status_mut() = StatusCode::NOT_FOUND;
            return Err(rejection);
        }

        let verdict = validate_handshake(req, handshake);
        if let HandshakeResult::Reject { status, reason } = &verdict {
            warn!(%addr, status, %reason, "WebSocket upgrade rejected");
        }
        query = req.uri().query().map(str::to_owned);
        build_handshake_response(&verdict, handshake, response)
    };

    let upgraded =
        accept_hdr_async_with_config(stream, callback, Some(stream_limits(max_frame_len))).await;
    match upgraded {
        Ok(ws_stream) => {
            let credentials = Credentials::from_query(query.as_deref());
            Some((ws_stream, credentials))
        }
        Err(e) => {
            warn!(%addr, error = %e, "WebSocket handshake failed");
            None
        }
    }
}
