//! Test server management.
//!
//! Starts chatrelay in-process on ephemeral ports with a throwaway
//! database, and shuts it down on drop.

use chatrelay::config::Config;
use chatrelay::http::CreateSessionResponse;
use chatrelay::server::{self, RunningServer};
use serde_json::json;
use std::time::Duration;
use tempfile::TempDir;

/// A test server instance.
pub struct TestServer {
    server: Option<RunningServer>,
    http: reqwest::Client,
    _data_dir: TempDir,
}

impl TestServer {
    /// Start a server with default relay settings.
    pub async fn spawn() -> anyhow::Result<Self> {
        Self::spawn_with(|_| {}).await
    }

    /// Start a server after letting the caller adjust the config.
    pub async fn spawn_with<F>(adjust: F) -> anyhow::Result<Self>
    where
        F: FnOnce(&mut Config),
    {
        let data_dir = tempfile::tempdir()?;
        let db_path = data_dir.path().join("chatrelay.db");

        let mut config = Config::from_toml(&format!(
            r#"
[server]
name = "test.chatrelay"

[listen]
address = "127.0.0.1:0"

[websocket]
address = "127.0.0.1:0"

[database]
path = "{}"

[relay]
send_timeout_ms = 500
handshake_timeout_ms = 2000
"#,
            db_path.display()
        ))?;
        adjust(&mut config);

        let server = server::start(config).await?;
        Ok(Self {
            server: Some(server),
            http: reqwest::Client::new(),
            _data_dir: data_dir,
        })
    }

    fn running(&self) -> &RunningServer {
        self.server
            .as_ref()
            .expect("server already shut down")
    }

    /// Full URL of an HTTP API path.
    pub fn http_url(&self, path: &str) -> String {
        format!("http://{}{}", self.running().http_addr, path)
    }

    /// Chat stream URL with the given query string.
    pub fn stream_url(&self, query: &str) -> String {
        format!("ws://{}/chat/stream?{}", self.running().ws_addr, query)
    }

    /// Chat stream URL for password credentials.
    pub fn password_url(&self, session_id: &str, password: &str) -> String {
        self.stream_url(&format!("sessionId={session_id}&password={password}"))
    }

    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// Create a session through the HTTP API.
    pub async fn create_session(
        &self,
        host_name: &str,
        password: &str,
    ) -> anyhow::Result<CreateSessionResponse> {
        let response = self
            .http
            .post(self.http_url("/chat/sessions"))
            .json(&json!({ "hostName": host_name, "password": password }))
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json().await?)
    }

    /// Open a stream with password credentials, read the welcome and
    /// send the handshake.
    pub async fn join(
        &self,
        session_id: &str,
        password: &str,
        username: &str,
    ) -> anyhow::Result<super::client::TestClient> {
        let mut client =
            super::client::TestClient::connect(&self.password_url(session_id, password), username)
                .await?;
        client.expect_welcome().await?;
        client.handshake(session_id).await?;
        Ok(client)
    }

    /// Members currently registered under `session_id`.
    pub async fn member_count(&self, session_id: &str) -> usize {
        let session = chatrelay_proto::SessionId::parse(session_id).expect("valid session id");
        self.running().hub.registry.members_of(&session).await.len()
    }

    /// Poll until `session_id` has exactly `count` members.
    pub async fn wait_for_members(&self, session_id: &str, count: usize) -> anyhow::Result<()> {
        for _ in 0..100 {
            if self.member_count(session_id).await == count {
                return Ok(());
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        anyhow::bail!(
            "session {session_id} has {} members, expected {count}",
            self.member_count(session_id).await
        )
    }

    /// Stop the server and wait for every task to finish.
    pub async fn shutdown(mut self) -> anyhow::Result<()> {
        match self.server.take() {
            Some(server) => server.shutdown().await,
            None => Ok(()),
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(server) = &self.server {
            server.shutdown_token().cancel();
        }
    }
}
