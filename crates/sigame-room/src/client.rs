//! A registered WebSocket participant.
//!
//! The `Client` is created at upgrade time and is immutable afterwards:
//! the token it presented, the role it was assigned, and the sending
//! half of its outbound queue. The receiving half goes to the socket
//! write task. The hub owns the authoritative client map; the game holds
//! `Arc` back-references in its roster and never extends a client's
//! lifetime past unregistration in any way that matters — once the hub
//! pushes [`Outbound::Close`], the write task shuts the socket down.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use sigame_protocol::Role;

/// Outbound queue depth per client. A client that falls this far behind
/// a broadcast is dropped rather than allowed to stall the room.
pub const OUTBOUND_CAPACITY: usize = 256;

/// What the socket write task pulls off a client's outbound queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// A serialized server frame to deliver.
    Frame(Vec<u8>),
    /// Orderly shutdown: close the socket and exit the write task.
    Close,
}

/// One connected participant of a room.
pub struct Client {
    token: String,
    role: Role,
    outbound: mpsc::Sender<Outbound>,
}

impl Client {
    /// Creates a client and the receiving half of its outbound queue.
    ///
    /// The receiver belongs to the socket write task; everything else
    /// talks to the client through the bounded sender inside.
    pub fn new(token: String, role: Role) -> (Arc<Self>, mpsc::Receiver<Outbound>) {
        let (tx, rx) = mpsc::channel(OUTBOUND_CAPACITY);
        (
            Arc::new(Self {
                token,
                role,
                outbound: tx,
            }),
            rx,
        )
    }

    /// The bearer token presented at the handshake. Also the client's
    /// key in the hub map and the game roster.
    pub fn token(&self) -> &str {
        &self.token
    }

    /// The role assigned at registration.
    pub fn role(&self) -> Role {
        self.role
    }

    /// Enqueues a message without waiting.
    ///
    /// A `Full` error is the slow-client signal: the hub unregisters the
    /// client rather than dropping the message or blocking the room.
    pub fn try_send(&self, msg: Outbound) -> Result<(), TrySendError<Outbound>> {
        self.outbound.try_send(msg)
    }

    /// Enqueues an in-band error string for this client only.
    pub fn send_error(&self, text: &str) {
        let _ = self.try_send(Outbound::Frame(text.as_bytes().to_vec()));
    }
}
