//! The room registry: one `(Hub, Game)` pair per pack uid.
//!
//! Rooms are created on the first join referencing a uid and prune
//! themselves when their game loop exits — the loop reports its uid on a
//! channel and the registry's pruner task drops the handle. The pack
//! store's lease mechanism guarantees the extracted pack files outlive
//! every room playing them.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};

use sigame_auth::Authenticator;
use sigame_pack::{uid_hex, PackStore, PackUid};

use crate::game::{Game, GameHandle, EVENT_QUEUE_CAPACITY};
use crate::hub::{Hub, HubHandle};
use crate::RoomError;

/// Entry points into a running room. Cheap to clone.
#[derive(Clone)]
pub struct RoomHandle {
    /// Registration, unregistration, and fan-out.
    pub hub: HubHandle,
    /// Client event intake.
    pub game: GameHandle,
}

/// Tracks every active room, keyed by pack uid.
pub struct RoomRegistry {
    store: PackStore,
    auth: Arc<Authenticator>,
    rooms: Mutex<HashMap<PackUid, RoomHandle>>,
    closed_tx: mpsc::UnboundedSender<PackUid>,
}

impl RoomRegistry {
    /// Creates the registry and spawns its pruner task.
    pub fn new(store: PackStore, auth: Arc<Authenticator>) -> Arc<Self> {
        let (closed_tx, mut closed_rx) = mpsc::unbounded_channel();
        let registry = Arc::new(Self {
            store,
            auth,
            rooms: Mutex::new(HashMap::new()),
            closed_tx,
        });

        let pruner = Arc::clone(&registry);
        tokio::spawn(async move {
            while let Some(uid) = closed_rx.recv().await {
                pruner.rooms.lock().await.remove(&uid);
                tracing::info!(uid = %uid_hex(&uid), "room pruned");
            }
        });

        registry
    }

    /// Returns the room for `uid`, creating it on first reference.
    ///
    /// Creation opens the pack (extracting it if this is the first
    /// lease) and spawns the room's hub and game tasks.
    pub async fn open(&self, uid: &PackUid) -> Result<RoomHandle, RoomError> {
        let mut rooms = self.rooms.lock().await;
        if let Some(handle) = rooms.get(uid) {
            return Ok(handle.clone());
        }

        let (pack, lease) = self.store.open(uid)?;

        let (game_tx, game_rx) = mpsc::channel(EVENT_QUEUE_CAPACITY);
        let hub = Hub::spawn(game_tx.clone());
        let game = Game::new(
            pack,
            Some(lease),
            hub.clone(),
            Arc::clone(&self.auth),
            game_rx,
            self.closed_tx.clone(),
        );
        tokio::spawn(game.run());

        let handle = RoomHandle {
            hub,
            game: GameHandle::new(game_tx),
        };
        rooms.insert(*uid, handle.clone());
        tracing::info!(uid = %uid_hex(uid), "room opened");

        Ok(handle)
    }

    /// Number of rooms currently tracked.
    pub async fn room_count(&self) -> usize {
        self.rooms.lock().await.len()
    }
}
