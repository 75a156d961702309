//! End-to-end `/hub` WebSocket tests: handshake auth, role assignment,
//! join broadcasts, and in-band permission errors, driven with a real
//! WebSocket client.

mod common;

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::Message;

use common::{archive_bytes, spawn_server, DESCRIPTOR};
use sigame_pack::uid_hex;

type Ws = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

async fn connect(addr: &str, uid_hex: &str, role: &str, token: &str) -> Ws {
    let mut request = format!("ws://{addr}/hub?pack_uid={uid_hex}&role={role}")
        .into_client_request()
        .unwrap();
    request
        .headers_mut()
        .insert("Authorization", token.parse().unwrap());
    let (ws, _) = tokio_tungstenite::connect_async(request).await.unwrap();
    ws
}

async fn next_text(ws: &mut Ws) -> String {
    loop {
        let message = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timed out waiting for frame")
            .expect("socket closed")
            .expect("socket error");
        match message {
            Message::Text(text) => return text.to_string(),
            Message::Binary(bytes) => return String::from_utf8(bytes.to_vec()).unwrap(),
            _ => continue,
        }
    }
}

fn client_frame(kind: &str, token: &str) -> Message {
    Message::Text(
        serde_json::json!({ "Type": kind, "Token": token })
            .to_string()
            .into(),
    )
}

#[tokio::test]
async fn test_hub_join_start_flow_over_websocket() {
    let server = spawn_server("ws-flow").await;
    let uid = server.packs.save_archive(&archive_bytes(DESCRIPTOR)).unwrap();
    let uid = uid_hex(&uid);

    let leader_token = server.auth.issue(1, "Q", 3600).unwrap();
    let alice_token = server.auth.issue(2, "Alice", 3600).unwrap();

    let mut leader = connect(&server.addr, &uid, "leader", &leader_token).await;
    let mut alice = connect(&server.addr, &uid, "user", &alice_token).await;

    // Alice joins: both sockets observe the broadcast.
    alice
        .send(client_frame("join", &alice_token))
        .await
        .unwrap();

    let seen: serde_json::Value =
        serde_json::from_str(&next_text(&mut leader).await).unwrap();
    assert_eq!(seen["Type"], "join_server");
    assert_eq!(seen["Data"]["QueueID"], 1);
    assert_eq!(seen["Data"]["Nickname"], "Alice");

    let seen: serde_json::Value =
        serde_json::from_str(&next_text(&mut alice).await).unwrap();
    assert_eq!(seen["Type"], "join_server");

    // A user may not start the game; the error is in-band, not a close.
    alice
        .send(client_frame("start_game", &alice_token))
        .await
        .unwrap();
    assert_eq!(next_text(&mut alice).await, "permission denied");

    // The leader may.
    leader
        .send(client_frame("start_game", &leader_token))
        .await
        .unwrap();
    let seen: serde_json::Value =
        serde_json::from_str(&next_text(&mut alice).await).unwrap();
    assert_eq!(seen["Type"], "greetings_server");
    assert_eq!(seen["Data"]["Name"], "Capitals");
    assert!(seen["Exp"].as_i64().unwrap() > 0);

    let _ = std::fs::remove_dir_all(server.root);
}

#[tokio::test]
async fn test_hub_rejects_bad_token_at_handshake() {
    let server = spawn_server("ws-badtoken").await;
    let uid = server.packs.save_archive(&archive_bytes(DESCRIPTOR)).unwrap();

    let mut request =
        format!("ws://{}/hub?pack_uid={}&role=user", server.addr, uid_hex(&uid))
            .into_client_request()
            .unwrap();
    request
        .headers_mut()
        .insert("Authorization", "not-a-token".parse().unwrap());

    let err = tokio_tungstenite::connect_async(request).await.unwrap_err();
    match err {
        tokio_tungstenite::tungstenite::Error::Http(response) => {
            assert_eq!(response.status(), 401);
        }
        other => panic!("expected http rejection, got {other:?}"),
    }

    let _ = std::fs::remove_dir_all(server.root);
}

#[tokio::test]
async fn test_hub_rejects_unknown_pack() {
    let server = spawn_server("ws-nopack").await;
    let token = server.auth.issue(1, "Q", 3600).unwrap();

    let mut request = format!(
        "ws://{}/hub?pack_uid={}&role=user",
        server.addr,
        "00".repeat(32)
    )
    .into_client_request()
    .unwrap();
    request
        .headers_mut()
        .insert("Authorization", token.parse().unwrap());

    let err = tokio_tungstenite::connect_async(request).await.unwrap_err();
    match err {
        tokio_tungstenite::tungstenite::Error::Http(response) => {
            assert_eq!(response.status(), 400);
        }
        other => panic!("expected http rejection, got {other:?}"),
    }

    let _ = std::fs::remove_dir_all(server.root);
}

#[tokio::test]
async fn test_second_leader_connection_is_refused() {
    let server = spawn_server("ws-twoleaders").await;
    let uid = server.packs.save_archive(&archive_bytes(DESCRIPTOR)).unwrap();
    let uid = uid_hex(&uid);

    let first_token = server.auth.issue(1, "Q", 3600).unwrap();
    let second_token = server.auth.issue(2, "Q2", 3600).unwrap();

    let _first = connect(&server.addr, &uid, "leader", &first_token).await;
    let mut second = connect(&server.addr, &uid, "leader", &second_token).await;

    // The upgrade succeeds, but registration fails and the socket is
    // told why before it closes.
    let message = tokio::time::timeout(Duration::from_secs(5), second.next())
        .await
        .expect("timed out")
        .expect("stream ended")
        .expect("socket error");
    match message {
        Message::Text(text) => {
            assert_eq!(text.as_str(), "a leader is already registered")
        }
        other => panic!("expected text frame, got {other:?}"),
    }

    let _ = std::fs::remove_dir_all(server.root);
}
