//! Server assembly: database, hub, gateway and HTTP API.
//!
//! [`start`] binds both listeners and returns once they accept, so callers
//! (the binary and the integration tests) learn the real addresses.

use crate::auth::SessionAuthenticator;
use crate::config::Config;
use crate::db::Database;
use crate::http::{self, AppState};
use crate::network::Gateway;
use crate::state::Hub;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// A running server.
pub struct RunningServer {
    /// HTTP API address.
    pub http_addr: SocketAddr,
    /// Chat stream (WebSocket) address.
    pub ws_addr: SocketAddr,
    /// Shared relay state.
    pub hub: Arc<Hub>,
    /// Session store.
    pub db: Database,
    shutdown: CancellationToken,
    gateway: JoinHandle<anyhow::Result<()>>,
    api: JoinHandle<anyhow::Result<()>>,
}

impl RunningServer {
    /// Token that stops the server when cancelled.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Wait until both listeners have stopped.
    pub async fn wait(self) -> anyhow::Result<()> {
        let (gateway, api) = tokio::join!(self.gateway, self.api);
        gateway??;
        api??;
        info!("server stopped");
        Ok(())
    }

    /// Stop accepting, close every connection, and wait.
    pub async fn shutdown(self) -> anyhow::Result<()> {
        self.shutdown.cancel();
        self.wait().await
    }
}

/// Open the database, bind both listeners and start serving.
pub async fn start(config: Config) -> anyhow::Result<RunningServer> {
    crate::metrics::init();

    let db = Database::new(&config.database.path).await?;
    let shutdown = CancellationToken::new();
    let hub = Arc::new(Hub::new(config.relay.clone(), shutdown.clone()));
    let authenticator: Arc<dyn SessionAuthenticator> = Arc::new(db.clone());

    let gateway = Gateway::bind(&config.websocket, Arc::clone(&hub), authenticator).await?;
    let ws_addr = gateway.local_addr()?;

    let listener = TcpListener::bind(config.listen.address).await?;
    let http_addr = listener.local_addr()?;

    info!(
        server = %config.server.name,
        %http_addr,
        %ws_addr,
        "chatrelay started"
    );

    let gateway = tokio::spawn(gateway.run(shutdown.clone()));
    let state = AppState {
        db: db.clone(),
        hub: Arc::clone(&hub),
    };
    let api_shutdown = shutdown.clone();
    let api = tokio::spawn(async move {
        let result = http::serve(listener, state, api_shutdown.clone()).await;
        if let Err(ref e) = result {
            warn!(error = %e, "HTTP API stopped with error");
            api_shutdown.cancel();
        }
        result
    });

    Ok(RunningServer {
        http_addr,
        ws_addr,
        hub,
        db,
        shutdown,
        gateway,
        api,
    })
}
