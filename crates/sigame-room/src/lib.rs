//! Per-room runtime for the SI-Game server.
//!
//! A room is one quiz session: a [`Hub`](hub) fanning frames out to the
//! connected sockets, and a [`Game`](game) driving the timed
//! question/answer state machine. Both run as isolated Tokio tasks
//! communicating only through channels — no shared mutable state, no
//! locks.
//!
//! ```text
//!  socket read ──ClientEvent──▶ Game loop ──ServerEvent──▶ Hub loop
//!                                   ▲                          │
//!                                   └──roster notifications────┘
//!                                                              ▼
//!                                             per-client outbound queues
//! ```
//!
//! Rooms are created and tracked by the [`RoomRegistry`], keyed by the
//! pack uid, and hold a [`PackLease`](sigame_pack::PackLease) so the
//! extracted pack outlives every room playing it — and nothing more.

mod client;
mod error;
mod game;
mod hub;
mod registry;
mod timer;

pub use client::{Client, Outbound, OUTBOUND_CAPACITY};
pub use error::RoomError;
pub use game::{Game, GameHandle, GameInput, Step, EVENT_QUEUE_CAPACITY};
pub use hub::{Hub, HubHandle, HUB_QUEUE_CAPACITY};
pub use registry::{RoomHandle, RoomRegistry};
pub use timer::RoundTimer;
