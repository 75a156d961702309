//! The `/hub` WebSocket endpoint: handshake, client registration, and
//! the per-connection read/write tasks.
//!
//! The handshake authenticates the bearer token, resolves (or creates)
//! the room for `pack_uid`, and registers a [`Client`] with the room's
//! hub. After the upgrade, two tasks pump the socket:
//!
//! - the **read task** decodes frames into
//!   [`ClientEvent`]s and forwards them to the game loop;
//! - the **write task** drains the client's bounded outbound queue with
//!   a write deadline.
//!
//! Per-client failures (malformed frames excepted) end in
//! unregistration; the room plays on.

use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::{header, HeaderMap};
use axum::response::Response;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;

use sigame_pack::parse_uid;
use sigame_protocol::{ClientEvent, Role};
use sigame_room::{Client, Outbound, RoomHandle};

use crate::error::ApiError;
use crate::server::AppState;

/// A write that stalls longer than this drops the connection.
const WRITE_DEADLINE: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
pub struct HubQuery {
    /// Hex-encoded sha-256 of the pack archive.
    pub pack_uid: String,
    /// `leader` claims the host seat; anything else plays.
    #[serde(default)]
    pub role: String,
}

/// `GET /hub` — authenticate, resolve the room, upgrade.
pub async fn upgrade(
    ws: WebSocketUpgrade,
    Query(query): Query<HubQuery>,
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Result<Response, ApiError> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("")
        .to_owned();
    state.auth.verify(&token)?;

    let uid = parse_uid(&query.pack_uid)?;
    let role = Role::from_query(&query.role);
    let room = state.rooms.open(&uid).await?;

    Ok(ws.on_upgrade(move |socket| serve_socket(socket, room, token, role)))
}

/// Runs one connection from registration to close.
async fn serve_socket(socket: WebSocket, room: RoomHandle, token: String, role: Role) {
    let (client, outbound_rx) = Client::new(token.clone(), role);
    if let Err(err) = room.hub.register(client).await {
        tracing::info!(error = %err, "registration refused");
        let mut socket = socket;
        let _ = socket.send(Message::Text(err.to_string().into())).await;
        let _ = socket.close().await;
        return;
    }

    let (sink, stream) = socket.split();
    let mut writer = tokio::spawn(write_loop(sink, outbound_rx));

    // Either half failing ends the connection: a dead write side must
    // not linger in the roster until its read side happens to notice.
    tokio::select! {
        _ = read_loop(stream, &room) => {
            // Read ended (EOF, error, or queue overflow): unregister;
            // the hub's close sentinel stops the writer.
            room.hub.unregister(&token).await;
            let _ = writer.await;
        }
        _ = &mut writer => {
            // Write deadline or socket error: unregister immediately.
            room.hub.unregister(&token).await;
        }
    }
}

/// Pumps socket frames into the game loop.
async fn read_loop(mut stream: SplitStream<WebSocket>, room: &RoomHandle) {
    while let Some(message) = stream.next().await {
        let message = match message {
            Ok(message) => message,
            Err(err) => {
                tracing::debug!(error = %err, "socket read failed");
                return;
            }
        };

        let frame = match message {
            Message::Text(text) => text.as_bytes().to_vec(),
            Message::Binary(bytes) => bytes.to_vec(),
            Message::Close(_) => return,
            // Ping/pong are handled by the socket layer.
            _ => continue,
        };

        match ClientEvent::from_frame(&frame) {
            Ok(event) => {
                if !room.game.try_event(event) {
                    // Game queue full or game gone: this client is done.
                    tracing::warn!("game queue refused event, dropping client");
                    return;
                }
            }
            Err(err) => {
                // Protocol error: drop the frame, keep the connection.
                tracing::debug!(error = %err, "unreadable frame ignored");
            }
        }
    }
}

/// Drains the outbound queue to the socket under a write deadline.
async fn write_loop(
    mut sink: SplitSink<WebSocket, Message>,
    mut outbound: mpsc::Receiver<Outbound>,
) {
    while let Some(message) = outbound.recv().await {
        let frame = match message {
            Outbound::Frame(frame) => frame,
            Outbound::Close => break,
        };

        let message = match String::from_utf8(frame) {
            Ok(text) => Message::Text(text.into()),
            Err(err) => Message::Binary(err.into_bytes().into()),
        };

        match tokio::time::timeout(WRITE_DEADLINE, sink.send(message)).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                tracing::debug!(error = %err, "socket write failed");
                break;
            }
            Err(_) => {
                tracing::warn!("socket write deadline exceeded");
                break;
            }
        }
    }

    let _ = sink.close().await;
}
