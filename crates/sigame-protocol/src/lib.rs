//! Wire protocol for the SI-Game realtime server.
//!
//! This crate defines the "language" that game clients and the server
//! speak over the `/hub` WebSocket:
//!
//! - **Events** ([`ClientEvent`], [`ServerEvent`]) — the tagged frames
//!   that travel on the wire, plus every typed `Data` payload.
//! - **Roles** ([`Role`], [`required_roles`]) — who is allowed to send
//!   which event. The access table is data, not a class hierarchy.
//! - **Errors** ([`ProtocolError`]) — what can go wrong while encoding
//!   or decoding a frame.
//!
//! # Architecture
//!
//! The protocol layer sits between the socket (raw bytes) and the game
//! engine (state machine). It doesn't know about connections, rooms, or
//! scores — it only knows how frames are shaped.
//!
//! ```text
//! Socket (bytes) → Protocol (ClientEvent) → Game (state transitions)
//! ```

mod error;
mod events;
mod role;

pub use error::ProtocolError;
pub use events::{
    ChooseQuestPayload, ClientEvent, ClientEventKind, DisconnectPayload,
    FinalPayload, GetQuestPayload, GreetingsPayload, JoinPayload,
    ReadingRoundPayload, ReadingThemesPayload, ScoreChangedPayload,
    ServerEvent, ServerEventKind, TakenQuestPayload,
};
pub use role::{required_roles, Role};
