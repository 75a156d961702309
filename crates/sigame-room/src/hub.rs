//! The per-room hub: a single-task fan-out loop.
//!
//! The hub exclusively owns the client map. Registration, removal,
//! broadcast, and shutdown all arrive as commands on one bounded
//! channel and are applied inside the loop, which removes locking
//! entirely — external callers only ever hold a [`HubHandle`].
//!
//! Roster changes are forwarded to the game loop as
//! [`GameInput::Connected`] / [`GameInput::Gone`] notifications, so the
//! game maintains its own mirror without touching hub state.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};

use sigame_protocol::Role;

use crate::client::{Client, Outbound};
use crate::game::GameInput;
use crate::RoomError;

/// Command queue depth for a hub. Applies to the broadcast path too:
/// the game loop never buffers more than this many undelivered frames.
pub const HUB_QUEUE_CAPACITY: usize = 64;

/// Commands accepted by a hub loop.
enum HubCommand {
    /// Admit a client. Rejected when a Leader is already seated and the
    /// newcomer also claims Leader.
    Register {
        client: Arc<Client>,
        reply: oneshot::Sender<Result<(), RoomError>>,
    },
    /// Remove a client by token and close its outbound queue. Idempotent.
    Unregister(String),
    /// Deliver a pre-serialized frame to every registered client in
    /// registration order. Clients whose queue is full are dropped —
    /// the message is never dropped for the others.
    Broadcast(Vec<u8>),
    /// Drain and exit, closing every client.
    Close,
}

/// Handle for talking to a running hub. Cheap to clone.
#[derive(Clone)]
pub struct HubHandle {
    tx: mpsc::Sender<HubCommand>,
}

impl HubHandle {
    /// Registers a client, waiting for the hub's verdict.
    pub async fn register(&self, client: Arc<Client>) -> Result<(), RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(HubCommand::Register {
                client,
                reply: reply_tx,
            })
            .await
            .map_err(|_| RoomError::Closed)?;
        reply_rx.await.map_err(|_| RoomError::Closed)?
    }

    /// Removes a client. A no-op if the token is unknown or the hub is
    /// already gone.
    pub async fn unregister(&self, token: &str) {
        let _ = self
            .tx
            .send(HubCommand::Unregister(token.to_owned()))
            .await;
    }

    /// Queues a frame for fan-out.
    pub async fn broadcast(&self, frame: Vec<u8>) {
        let _ = self.tx.send(HubCommand::Broadcast(frame)).await;
    }

    /// Asks the hub to drain and exit.
    pub async fn close(&self) {
        let _ = self.tx.send(HubCommand::Close).await;
    }
}

/// The hub loop state. Owned by exactly one task.
pub struct Hub {
    clients: HashMap<String, Arc<Client>>,
    /// Tokens in registration order; broadcasts walk this.
    order: Vec<String>,
    game: mpsc::Sender<GameInput>,
    rx: mpsc::Receiver<HubCommand>,
}

impl Hub {
    /// Spawns a hub task wired to the given game input channel.
    pub fn spawn(game: mpsc::Sender<GameInput>) -> HubHandle {
        let (tx, rx) = mpsc::channel(HUB_QUEUE_CAPACITY);
        let hub = Hub {
            clients: HashMap::new(),
            order: Vec::new(),
            game,
            rx,
        };
        tokio::spawn(hub.run());
        HubHandle { tx }
    }

    async fn run(mut self) {
        tracing::debug!("hub loop started");

        while let Some(cmd) = self.rx.recv().await {
            match cmd {
                HubCommand::Register { client, reply } => {
                    let _ = reply.send(self.handle_register(client));
                }
                HubCommand::Unregister(token) => {
                    self.remove(&token);
                }
                HubCommand::Broadcast(frame) => {
                    self.fan_out(frame);
                }
                HubCommand::Close => break,
            }
        }

        for client in self.clients.values() {
            let _ = client.try_send(Outbound::Close);
        }
        tracing::debug!(clients = self.clients.len(), "hub loop stopped");
    }

    fn handle_register(&mut self, client: Arc<Client>) -> Result<(), RoomError> {
        if client.role() == Role::Leader && self.has_leader() {
            tracing::warn!("second leader rejected");
            let _ = client.try_send(Outbound::Close);
            return Err(RoomError::LeaderTaken);
        }

        // A reconnecting token supersedes its previous connection.
        if self.clients.contains_key(client.token()) {
            self.remove(client.token());
        }

        self.order.push(client.token().to_owned());
        self.clients.insert(client.token().to_owned(), Arc::clone(&client));
        tracing::info!(role = %client.role(), clients = self.clients.len(), "client registered");

        self.notify(GameInput::Connected(client));
        Ok(())
    }

    /// Forwards a roster notification without waiting. The hub must
    /// never block on the game loop (and vice versa), so under a
    /// saturated game queue the notification is dropped instead.
    fn notify(&self, input: GameInput) {
        if self.game.try_send(input).is_err() {
            tracing::warn!("game queue saturated, roster notification dropped");
        }
    }

    fn has_leader(&self) -> bool {
        self.clients.values().any(|c| c.role() == Role::Leader)
    }

    fn fan_out(&mut self, frame: Vec<u8>) {
        let mut dropped = Vec::new();
        for token in &self.order {
            let Some(client) = self.clients.get(token) else {
                continue;
            };
            if client.try_send(Outbound::Frame(frame.clone())).is_err() {
                // Slow or gone: drop the client, never the message.
                dropped.push(token.clone());
            }
        }

        for token in dropped {
            tracing::warn!("dropping slow client");
            self.remove(&token);
        }
    }

    fn remove(&mut self, token: &str) {
        let Some(client) = self.clients.remove(token) else {
            return;
        };
        self.order.retain(|t| t != token);
        let _ = client.try_send(Outbound::Close);
        tracing::info!(clients = self.clients.len(), "client unregistered");

        self.notify(GameInput::Gone(token.to_owned()));
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::OUTBOUND_CAPACITY;
    use std::time::Duration;
    use tokio::sync::mpsc::Receiver;

    fn wired() -> (HubHandle, Receiver<GameInput>) {
        let (game_tx, game_rx) = mpsc::channel(64);
        (Hub::spawn(game_tx), game_rx)
    }

    async fn recv_frame(rx: &mut Receiver<Outbound>) -> Vec<u8> {
        match tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("timed out waiting for frame")
            .expect("outbound queue closed")
        {
            Outbound::Frame(frame) => frame,
            Outbound::Close => panic!("unexpected close"),
        }
    }

    #[tokio::test]
    async fn test_register_notifies_game() {
        let (hub, mut game_rx) = wired();
        let (client, _rx) = Client::new("a".into(), Role::User);

        hub.register(client).await.unwrap();

        match game_rx.recv().await.unwrap() {
            GameInput::Connected(c) => assert_eq!(c.token(), "a"),
            _ => panic!("expected Connected"),
        }
    }

    #[tokio::test]
    async fn test_broadcast_reaches_all_in_registration_order() {
        let (hub, _game_rx) = wired();
        let (a, mut a_rx) = Client::new("a".into(), Role::User);
        let (b, mut b_rx) = Client::new("b".into(), Role::User);
        hub.register(a).await.unwrap();
        hub.register(b).await.unwrap();

        hub.broadcast(b"one".to_vec()).await;
        hub.broadcast(b"two".to_vec()).await;

        // Per-client delivery preserves emission order.
        assert_eq!(recv_frame(&mut a_rx).await, b"one");
        assert_eq!(recv_frame(&mut a_rx).await, b"two");
        assert_eq!(recv_frame(&mut b_rx).await, b"one");
        assert_eq!(recv_frame(&mut b_rx).await, b"two");
    }

    #[tokio::test]
    async fn test_second_leader_rejected() {
        let (hub, _game_rx) = wired();
        let (first, _first_rx) = Client::new("q".into(), Role::Leader);
        let (second, mut second_rx) = Client::new("q2".into(), Role::Leader);

        hub.register(first).await.unwrap();
        let result = hub.register(second).await;

        assert!(matches!(result, Err(RoomError::LeaderTaken)));
        // The rejected client is told to close.
        assert_eq!(second_rx.recv().await.unwrap(), Outbound::Close);
    }

    #[tokio::test]
    async fn test_user_after_leader_is_accepted() {
        let (hub, _game_rx) = wired();
        let (leader, _l_rx) = Client::new("q".into(), Role::Leader);
        let (user, _u_rx) = Client::new("u".into(), Role::User);

        hub.register(leader).await.unwrap();
        hub.register(user).await.unwrap();
    }

    #[tokio::test]
    async fn test_slow_client_dropped_others_still_delivered() {
        let (hub, mut game_rx) = wired();
        let (slow, _slow_rx) = Client::new("slow".into(), Role::User);
        let (ok, mut ok_rx) = Client::new("ok".into(), Role::User);
        hub.register(Arc::clone(&slow)).await.unwrap();
        hub.register(ok).await.unwrap();
        // Drain the Connected notifications.
        let _ = game_rx.recv().await;
        let _ = game_rx.recv().await;

        // Fill the slow client's queue to the brim.
        for _ in 0..OUTBOUND_CAPACITY {
            slow.try_send(Outbound::Frame(Vec::new())).unwrap();
        }

        hub.broadcast(b"event".to_vec()).await;

        // The healthy client observes the event exactly once.
        assert_eq!(recv_frame(&mut ok_rx).await, b"event");

        // The slow client was unregistered.
        match tokio::time::timeout(Duration::from_secs(1), game_rx.recv())
            .await
            .unwrap()
            .unwrap()
        {
            GameInput::Gone(token) => assert_eq!(token, "slow"),
            _ => panic!("expected Gone"),
        }
    }

    #[tokio::test]
    async fn test_unregister_closes_and_notifies() {
        let (hub, mut game_rx) = wired();
        let (client, mut client_rx) = Client::new("a".into(), Role::User);
        hub.register(client).await.unwrap();
        let _ = game_rx.recv().await;

        hub.unregister("a").await;

        assert_eq!(client_rx.recv().await.unwrap(), Outbound::Close);
        match game_rx.recv().await.unwrap() {
            GameInput::Gone(token) => assert_eq!(token, "a"),
            _ => panic!("expected Gone"),
        }
    }

    #[tokio::test]
    async fn test_unregister_unknown_token_is_noop() {
        let (hub, _game_rx) = wired();
        hub.unregister("ghost").await;
        // Hub stays functional.
        let (client, _rx) = Client::new("a".into(), Role::User);
        hub.register(client).await.unwrap();
    }

    #[tokio::test]
    async fn test_close_sends_close_to_all_clients() {
        let (hub, _game_rx) = wired();
        let (a, mut a_rx) = Client::new("a".into(), Role::User);
        let (b, mut b_rx) = Client::new("b".into(), Role::User);
        hub.register(a).await.unwrap();
        hub.register(b).await.unwrap();

        hub.close().await;

        assert_eq!(a_rx.recv().await.unwrap(), Outbound::Close);
        assert_eq!(b_rx.recv().await.unwrap(), Outbound::Close);

        // Register after close fails.
        let (late, _late_rx) = Client::new("late".into(), Role::User);
        assert!(matches!(hub.register(late).await, Err(RoomError::Closed)));
    }

    #[tokio::test]
    async fn test_reregistering_token_supersedes_old_connection() {
        let (hub, _game_rx) = wired();
        let (old, mut old_rx) = Client::new("a".into(), Role::User);
        let (new, mut new_rx) = Client::new("a".into(), Role::User);

        hub.register(old).await.unwrap();
        hub.register(new).await.unwrap();

        assert_eq!(old_rx.recv().await.unwrap(), Outbound::Close);

        hub.broadcast(b"x".to_vec()).await;
        assert_eq!(recv_frame(&mut new_rx).await, b"x");
    }
}
