//! Player identity for the SI-Game server.
//!
//! This crate handles the two identity concerns every other layer leans on:
//!
//! 1. **Bearer tokens** — compact `header.payload.signature` tokens signed
//!    with HMAC-SHA-256 over a process-wide secret ([`Authenticator`]).
//!    The payload carries `{id, login, exp}` and nothing else.
//! 2. **Password hashing** — argon2id PHC strings for the credentials
//!    endpoints ([`password`]).
//!
//! # How it fits in the stack
//!
//! ```text
//! HTTP endpoints  ← issue tokens on login/register, verify on upload
//!     ↕
//! Auth layer (this crate)
//!     ↕
//! Game loop       ← re-verifies the token embedded in every client event
//! ```
//!
//! The game loop's re-check matters: a token that was valid at the
//! WebSocket handshake can expire mid-session, and the next event from
//! that client must get it unregistered.

mod error;
pub mod password;
mod token;

pub use error::AuthError;
pub use token::{Authenticator, Claims};
