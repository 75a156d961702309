//! The parsed pack tree.
//!
//! Field names mirror the descriptor format (`rounds`, `themes`,
//! `quests`, `scenes`, `answers`, `question_type`, `src`), so the tree
//! serializes back to an equivalent descriptor — the wall broadcast
//! reuses these derives to ship the theme grid to clients.

use serde::{Deserialize, Serialize};

use crate::PackError;

/// Content hash of the pack archive: sha-256 over the full file.
pub type PackUid = [u8; 32];

/// Parses a 64-character hex uid (as carried in the `pack_uid` query
/// parameter) into its binary form.
pub fn parse_uid(s: &str) -> Result<PackUid, PackError> {
    let bytes = hex::decode(s).map_err(|_| PackError::BadUid)?;
    bytes.try_into().map_err(|_| PackError::BadUid)
}

/// Hex form of a uid, used for filenames and log fields.
pub fn uid_hex(uid: &PackUid) -> String {
    hex::encode(uid)
}

/// One media fragment within a question's scene or answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectKind {
    Text,
    Image,
    Voice,
    Video,
    Auction,
    Answer,
    Final,
    Marker,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SceneObject {
    pub id: usize,
    /// Fragment type; `src` points into the extracted pack directory.
    #[serde(rename = "question_type")]
    pub kind: ObjectKind,
    pub src: String,
}

/// A question on the wall.
///
/// `price` is positive while the question is on offer and becomes `-1`
/// once consumed; it is never reset within a room's lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub id: usize,
    pub price: i64,
    #[serde(rename = "scenes")]
    pub scene: Vec<SceneObject>,
    #[serde(rename = "answers")]
    pub answer: Vec<SceneObject>,
}

impl Question {
    /// Whether the question is still on offer.
    pub fn available(&self) -> bool {
        self.price >= 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Theme {
    pub id: usize,
    pub name: String,
    #[serde(rename = "quests")]
    pub quests: Vec<Question>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Round {
    pub id: usize,
    pub name: String,
    pub themes: Vec<Theme>,
}

/// A fully parsed pack.
///
/// The uid is not part of the descriptor — it is the content hash of the
/// archive, assigned by the store when the pack is opened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pack {
    #[serde(skip)]
    pub uid: PackUid,
    pub name: String,
    pub author: String,
    pub date: String,
    pub rounds: Vec<Round>,
}

impl Pack {
    /// Parses a descriptor and checks its structural invariants.
    pub fn from_descriptor(bytes: &[u8]) -> Result<Self, PackError> {
        let pack: Pack = serde_json::from_slice(bytes)?;
        pack.validate()?;
        Ok(pack)
    }

    /// Structural invariants: at least one round, no empty theme, and no
    /// negative price before play begins.
    pub fn validate(&self) -> Result<(), PackError> {
        if self.rounds.is_empty() {
            return Err(PackError::Invalid("pack has no rounds".into()));
        }
        for round in &self.rounds {
            if round.themes.is_empty() {
                return Err(PackError::Invalid(format!(
                    "round {} has no themes",
                    round.id
                )));
            }
            for theme in &round.themes {
                if theme.quests.is_empty() {
                    return Err(PackError::Invalid(format!(
                        "theme {} has no questions",
                        theme.id
                    )));
                }
                for quest in &theme.quests {
                    if quest.price < 0 {
                        return Err(PackError::Invalid(format!(
                            "question {} has negative price",
                            quest.id
                        )));
                    }
                }
            }
        }
        Ok(())
    }
}

// =========================================================================
// Tests
// =========================================================================
