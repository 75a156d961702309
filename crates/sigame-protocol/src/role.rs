//! Client roles and the event access table.
//!
//! Roles are assigned once, at registration time, from the `role` query
//! parameter of the `/hub` handshake. Access control is a data-driven
//! lookup from event kind to the set of roles allowed to send it —
//! there is no per-role type hierarchy.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::events::ClientEventKind;

/// The part a connected client plays in a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The host: starts the game and adjudicates answers.
    Leader,
    /// A playing client: picks questions, answers, earns and loses points.
    User,
    /// Observes the room but cannot act. Reserved for clients demoted
    /// after failing a role check while their connection stays open.
    Spectator,
}

impl Role {
    /// Parses the `role` handshake query parameter.
    ///
    /// Only `leader` claims the Leader seat; anything else (including a
    /// missing parameter) defaults to `User`. Spectator is never claimed
    /// directly.
    pub fn from_query(value: &str) -> Self {
        match value {
            "leader" => Role::Leader,
            _ => Role::User,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Leader => write!(f, "leader"),
            Role::User => write!(f, "user"),
            Role::Spectator => write!(f, "spectator"),
        }
    }
}

/// Returns the roles allowed to send the given event.
///
/// An empty slice means the event is open to every role. The game loop
/// checks membership before dispatching and answers violations with an
/// in-band `permission denied` message.
pub fn required_roles(kind: ClientEventKind) -> &'static [Role] {
    match kind {
        ClientEventKind::StartGame => &[Role::Leader],
        ClientEventKind::Join => &[],
        ClientEventKind::Disconnect => &[],
        ClientEventKind::GetQuest => &[Role::User],
        ClientEventKind::ChooseQuest => &[Role::User],
        ClientEventKind::GiveAnswer => &[Role::User],
        ClientEventKind::DeclineAnswer => &[Role::Leader],
        ClientEventKind::AcceptAnswer => &[Role::Leader],
    }
}
