//! Integration tests for message fan-out within sessions.

mod common;

use common::{TestClient, TestServer};
use std::time::Duration;

#[tokio::test]
async fn two_participants_then_one() {
    let server = TestServer::spawn().await.expect("Failed to spawn test server");
    let session = server.create_session("host", "pw").await.unwrap();
    let id = session.session_id.as_str();

    let mut alice = server.join(id, "pw", "alice").await.unwrap();
    let mut bob = server.join(id, "pw", "bob").await.unwrap();
    server.wait_for_members(id, 2).await.unwrap();

    alice.say("hello").await.unwrap();
    let to_alice = alice.expect_message().await.unwrap();
    let to_bob = bob.expect_message().await.unwrap();
    assert_eq!(to_alice.text, "hello");
    assert_eq!(to_bob.text, "hello");
    assert_eq!(to_bob.username, "alice");
    assert_eq!(to_bob.session_id, id);
    assert_eq!(to_alice.id, to_bob.id);

    bob.close().await.unwrap();
    server.wait_for_members(id, 1).await.unwrap();

    alice.say("anyone?").await.unwrap();
    assert_eq!(alice.expect_message().await.unwrap().text, "anyone?");
    alice.expect_silence(Duration::from_millis(100)).await.unwrap();

    alice.close().await.unwrap();
    server.wait_for_members(id, 0).await.unwrap();
}

#[tokio::test]
async fn sessions_do_not_leak_into_each_other() {
    let server = TestServer::spawn().await.expect("Failed to spawn test server");
    let red = server.create_session("red", "pw").await.unwrap();
    let blue = server.create_session("blue", "pw").await.unwrap();

    let mut r = server.join(&red.session_id, "pw", "r").await.unwrap();
    let mut b = server.join(&blue.session_id, "pw", "b").await.unwrap();
    server.wait_for_members(&red.session_id, 1).await.unwrap();
    server.wait_for_members(&blue.session_id, 1).await.unwrap();

    r.say("red only").await.unwrap();
    assert_eq!(r.expect_message().await.unwrap().text, "red only");
    b.expect_silence(Duration::from_millis(150)).await.unwrap();
}

#[tokio::test]
async fn lower_case_session_id_joins_same_session() {
    let server = TestServer::spawn().await.expect("Failed to spawn test server");
    let session = server.create_session("host", "pw").await.unwrap();
    let lower = session.session_id.to_lowercase();

    let mut a = server.join(&session.session_id, "pw", "a").await.unwrap();
    let mut b = server.join(&lower, "pw", "b").await.unwrap();
    server.wait_for_members(&session.session_id, 2).await.unwrap();

    b.say("case-insensitive").await.unwrap();
    assert_eq!(a.expect_message().await.unwrap().text, "case-insensitive");
    assert_eq!(b.expect_message().await.unwrap().text, "case-insensitive");
}

#[tokio::test]
async fn messages_from_one_sender_arrive_in_order() {
    let server = TestServer::spawn().await.expect("Failed to spawn test server");
    let session = server.create_session("host", "pw").await.unwrap();
    let id = session.session_id.as_str();

    let mut sender = server.join(id, "pw", "sender").await.unwrap();
    let mut listener = server.join(id, "pw", "listener").await.unwrap();
    server.wait_for_members(id, 2).await.unwrap();

    for i in 0..25 {
        sender.say(&format!("m{i}")).await.unwrap();
    }
    for i in 0..25 {
        assert_eq!(listener.expect_message().await.unwrap().text, format!("m{i}"));
    }
}

#[tokio::test]
async fn public_link_credentials_join_the_session() {
    let server = TestServer::spawn().await.expect("Failed to spawn test server");
    let session = server.create_session("host", "pw").await.unwrap();
    let id = session.session_id.as_str();

    let mut host = server.join(id, "pw", "host").await.unwrap();

    let url = server.stream_url(&format!("link={}", session.public_link_id));
    let mut guest = TestClient::connect(&url, "guest").await.unwrap();
    assert_eq!(guest.expect_welcome().await.unwrap(), id);
    guest.handshake(id).await.unwrap();
    server.wait_for_members(id, 2).await.unwrap();

    guest.say("via link").await.unwrap();
    assert_eq!(host.expect_message().await.unwrap().text, "via link");
}

#[tokio::test]
async fn message_text_alias_is_accepted() {
    let server = TestServer::spawn().await.expect("Failed to spawn test server");
    let session = server.create_session("host", "pw").await.unwrap();
    let id = session.session_id.as_str();
    let mut client = server.join(id, "pw", "legacy").await.unwrap();

    client
        .send_json(&serde_json::json!({
            "type": "message",
            "id": "legacy-1",
            "username": "legacy",
            "message": "old field name",
            "color": "#123456",
            "timestamp": "2024-01-01T12:00:00Z"
        }))
        .await
        .unwrap();

    let received = client.expect_message().await.unwrap();
    assert_eq!(received.text, "old field name");
    assert_eq!(received.color, "#123456");
}
