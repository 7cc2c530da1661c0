//! Integration tests for chat stream lifecycle.
//!
//! Covers connection-time authentication, handshake rules, protocol errors,
//! deactivation and shutdown.

mod common;

use chatrelay_proto::ErrorCode;
use common::{TestClient, TestServer};
use serde_json::json;
use std::time::Duration;

#[tokio::test]
async fn missing_credentials_get_error_frame() {
    let server = TestServer::spawn().await.expect("Failed to spawn test server");
    let mut client = TestClient::connect(&server.stream_url(""), "nobody").await.unwrap();

    let (code, _) = client.expect_error().await.unwrap();
    assert_eq!(code, ErrorCode::MissingCredentials);
    client.expect_closed().await.unwrap();
}

#[tokio::test]
async fn bad_credentials_are_refused_with_reason() {
    let server = TestServer::spawn().await.expect("Failed to spawn test server");
    let session = server.create_session("host", "right").await.unwrap();

    let url = server.password_url(&session.session_id, "wrong");
    let mut client = TestClient::connect(&url, "x").await.unwrap();
    assert_eq!(client.expect_error().await.unwrap().0, ErrorCode::InvalidCredential);
    client.expect_closed().await.unwrap();

    let url = server.password_url("NOPE0000", "right");
    let mut client = TestClient::connect(&url, "x").await.unwrap();
    assert_eq!(client.expect_error().await.unwrap().0, ErrorCode::SessionNotFound);

    let url = server.stream_url("link=00000000-0000-0000-0000-000000000000");
    let mut client = TestClient::connect(&url, "x").await.unwrap();
    assert_eq!(client.expect_error().await.unwrap().0, ErrorCode::SessionNotFound);

    assert_eq!(server.member_count(&session.session_id).await, 0);
}

#[tokio::test]
async fn handshake_for_other_session_is_rejected() {
    let server = TestServer::spawn().await.expect("Failed to spawn test server");
    let mine = server.create_session("me", "pw").await.unwrap();
    let theirs = server.create_session("them", "pw").await.unwrap();

    let url = server.password_url(&mine.session_id, "pw");
    let mut client = TestClient::connect(&url, "sneaky").await.unwrap();
    client.expect_welcome().await.unwrap();
    client.handshake(&theirs.session_id).await.unwrap();

    assert_eq!(client.expect_error().await.unwrap().0, ErrorCode::SessionMismatch);
    client.expect_closed().await.unwrap();
    assert_eq!(server.member_count(&theirs.session_id).await, 0);
}

#[tokio::test]
async fn malformed_frame_closes_only_that_connection() {
    let server = TestServer::spawn().await.expect("Failed to spawn test server");
    let session = server.create_session("host", "pw").await.unwrap();
    let id = session.session_id.as_str();

    let mut good = server.join(id, "pw", "good").await.unwrap();
    let mut bad = server.join(id, "pw", "bad").await.unwrap();
    server.wait_for_members(id, 2).await.unwrap();

    bad.send_json(&json!({ "type": "shout", "text": "HEY" })).await.unwrap();
    assert_eq!(bad.expect_error().await.unwrap().0, ErrorCode::MalformedFrame);
    bad.expect_closed().await.unwrap();
    server.wait_for_members(id, 1).await.unwrap();

    good.say("still fine").await.unwrap();
    assert_eq!(good.expect_message().await.unwrap().text, "still fine");
}

#[tokio::test]
async fn oversized_frame_gets_error_before_close() {
    let server = TestServer::spawn_with(|config| config.websocket.max_message_bytes = 1024)
        .await
        .expect("Failed to spawn test server");
    let session = server.create_session("host", "pw").await.unwrap();
    let id = session.session_id.as_str();
    let mut client = server.join(id, "pw", "loud").await.unwrap();
    server.wait_for_members(id, 1).await.unwrap();

    client.say(&"x".repeat(8 * 1024)).await.unwrap();

    assert_eq!(client.expect_error().await.unwrap().0, ErrorCode::FrameTooLong);
    client.expect_closed().await.unwrap();
    server.wait_for_members(id, 0).await.unwrap();
}

#[tokio::test]
async fn message_naming_other_session_is_rejected() {
    let server = TestServer::spawn().await.expect("Failed to spawn test server");
    let session = server.create_session("host", "pw").await.unwrap();
    let id = session.session_id.as_str();
    let mut client = server.join(id, "pw", "alice").await.unwrap();

    client
        .send_json(&json!({
            "type": "message",
            "id": "x-1",
            "sessionId": "FFFF0000",
            "username": "alice",
            "text": "wrong room",
            "color": "#00ff00",
            "timestamp": "2024-01-01T12:00:00Z"
        }))
        .await
        .unwrap();

    assert_eq!(client.expect_error().await.unwrap().0, ErrorCode::SessionMismatch);
    server.wait_for_members(id, 0).await.unwrap();
}

#[tokio::test]
async fn silent_client_hits_handshake_timeout() {
    let server = TestServer::spawn_with(|config| config.relay.handshake_timeout_ms = 100)
        .await
        .expect("Failed to spawn test server");
    let session = server.create_session("host", "pw").await.unwrap();

    let url = server.password_url(&session.session_id, "pw");
    let mut client = TestClient::connect(&url, "quiet").await.unwrap();
    client.expect_welcome().await.unwrap();

    assert_eq!(client.expect_error().await.unwrap().0, ErrorCode::HandshakeTimeout);
    client.expect_closed().await.unwrap();
}

#[tokio::test]
async fn deactivation_closes_live_streams() {
    let server = TestServer::spawn().await.expect("Failed to spawn test server");
    let session = server.create_session("host", "pw").await.unwrap();
    let id = session.session_id.as_str();

    let mut a = server.join(id, "pw", "a").await.unwrap();
    let mut b = server.join(id, "pw", "b").await.unwrap();
    server.wait_for_members(id, 2).await.unwrap();

    let status = server
        .http()
        .post(server.http_url(&format!("/chat/sessions/{id}/deactivate")))
        .json(&json!({ "password": "pw" }))
        .send()
        .await
        .unwrap()
        .status();
    assert_eq!(status, reqwest::StatusCode::NO_CONTENT);

    assert_eq!(a.expect_error().await.unwrap().0, ErrorCode::SessionClosed);
    assert_eq!(b.expect_error().await.unwrap().0, ErrorCode::SessionClosed);
    server.wait_for_members(id, 0).await.unwrap();

    // New streams are refused once inactive.
    let mut late = TestClient::connect(&server.password_url(id, "pw"), "late").await.unwrap();
    assert_eq!(late.expect_error().await.unwrap().0, ErrorCode::SessionInactive);
}

#[tokio::test]
async fn abrupt_disconnect_releases_membership() {
    let server = TestServer::spawn().await.expect("Failed to spawn test server");
    let session = server.create_session("host", "pw").await.unwrap();
    let id = session.session_id.as_str();

    let mut stay = server.join(id, "pw", "stay").await.unwrap();
    let gone = server.join(id, "pw", "gone").await.unwrap();
    server.wait_for_members(id, 2).await.unwrap();

    // Dropped without a close frame.
    drop(gone);
    server.wait_for_members(id, 1).await.unwrap();

    stay.say("after drop").await.unwrap();
    assert_eq!(stay.expect_message().await.unwrap().text, "after drop");
}

#[tokio::test]
async fn disallowed_origin_is_refused_at_upgrade() {
    let server = TestServer::spawn_with(|config| {
        config.websocket.allow_origins = vec!["https://chat.example".to_string()];
    })
    .await
    .expect("Failed to spawn test server");
    let session = server.create_session("host", "pw").await.unwrap();
    let url = server.password_url(&session.session_id, "pw");

    let refused = TestClient::connect_with_origin(&url, "x", Some("https://evil.example")).await;
    assert!(refused.is_err());

    let mut allowed = TestClient::connect_with_origin(&url, "x", Some("https://chat.example"))
        .await
        .unwrap();
    allowed.expect_welcome().await.unwrap();
}

#[tokio::test]
async fn unknown_path_is_refused_at_upgrade() {
    let server = TestServer::spawn().await.expect("Failed to spawn test server");
    let url = server
        .stream_url("link=x")
        .replace("/chat/stream", "/somewhere/else");
    assert!(TestClient::connect(&url, "x").await.is_err());
}

#[tokio::test]
async fn shutdown_closes_connections_and_returns() {
    let server = TestServer::spawn().await.expect("Failed to spawn test server");
    let session = server.create_session("host", "pw").await.unwrap();
    let id = session.session_id.clone();

    let mut client = server.join(&id, "pw", "alice").await.unwrap();
    server.wait_for_members(&id, 1).await.unwrap();

    tokio::time::timeout(Duration::from_secs(5), server.shutdown())
        .await
        .expect("shutdown hung")
        .unwrap();
    client.expect_closed().await.unwrap();
}
