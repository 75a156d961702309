//! SI-Game server: HTTP/WS surface over the room runtime.
//!
//! The binary in `main.rs` wires this library to configuration, the
//! database pool, and the filesystem. Integration tests assemble the
//! same [`AppState`](server::AppState) by hand.

pub mod config;
pub mod error;
pub mod routes;
pub mod server;
pub mod users;
