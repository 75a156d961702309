//! Quiz packs: the immutable content a room plays through.
//!
//! A pack is a self-contained archive (`.siq`-style zip) holding a JSON
//! descriptor plus media files. This crate covers both halves of its
//! lifecycle:
//!
//! - **Model** ([`Pack`] → [`Round`] → [`Theme`] → [`Question`] →
//!   [`SceneObject`]) — the parsed tree the game engine walks. The tree
//!   is immutable except for one sanctioned mutation: the engine sets a
//!   question's `price` to `-1` to mark it consumed.
//! - **Store** ([`PackStore`]) — content-addressed archive storage keyed
//!   by the sha-256 of the archive bytes, plus refcounted extraction
//!   into a temporary directory for the lifetime of the rooms playing it.

mod error;
mod model;
mod store;

pub use error::PackError;
pub use model::{
    parse_uid, uid_hex, ObjectKind, Pack, PackUid, Question, Round,
    SceneObject, Theme,
};
pub use store::{PackLease, PackStore};
