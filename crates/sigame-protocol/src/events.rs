//! Client and server events — everything that travels on the `/hub` wire.
//!
//! Every frame is a small JSON envelope with a `Type` tag and a
//! type-specific `Data` payload:
//!
//! ```text
//! client → server   { "Type": "choose_quest", "Token": "<jwt>", "Data": {...} }
//! server → client   { "Type": "wall_server",  "Exp": 1712345678, "Data": {...} }
//! ```
//!
//! `Exp` is an absolute deadline (unix seconds, UTC) that clients use to
//! render a countdown synchronized with the server's round timer. Events
//! that do not advance the timer carry `Exp = 0`.

use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

use crate::ProtocolError;

// ---------------------------------------------------------------------------
// Client → server
// ---------------------------------------------------------------------------

/// Every action a client can request.
///
/// The snake_case tag is the wire representation; an unknown tag fails
/// decode, which the read loop treats as a protocol error (frame dropped,
/// connection kept).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientEventKind {
    StartGame,
    Join,
    Disconnect,
    GetQuest,
    ChooseQuest,
    /// Reserved on the wire: role-checked but currently has no
    /// state-machine effect (answering is adjudicated by the leader).
    GiveAnswer,
    DeclineAnswer,
    AcceptAnswer,
}

/// A single frame received from a client.
///
/// `Data` is kept raw: only the handler for the specific event kind knows
/// the payload shape, and most events carry none at all.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientEvent {
    #[serde(rename = "Type")]
    pub kind: ClientEventKind,

    /// The bearer token the client authenticated with. Re-verified on
    /// every event so an in-session expiry disconnects the client.
    #[serde(rename = "Token")]
    pub token: String,

    #[serde(rename = "Data", default)]
    pub data: Option<Box<RawValue>>,
}

impl ClientEvent {
    /// Decodes a raw WebSocket frame.
    pub fn from_frame(bytes: &[u8]) -> Result<Self, ProtocolError> {
        serde_json::from_slice(bytes).map_err(ProtocolError::Decode)
    }

    /// Decodes the `Data` payload into the handler's expected shape.
    pub fn payload<'a, T: Deserialize<'a>>(&'a self) -> Result<T, ProtocolError> {
        let raw = self.data.as_deref().map(RawValue::get).unwrap_or("null");
        serde_json::from_str(raw).map_err(ProtocolError::Decode)
    }
}

/// `Data` for `choose_quest`: 1-based indices into the current round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChooseQuestPayload {
    #[serde(rename = "ThemeID")]
    pub theme_id: usize,
    #[serde(rename = "QuestionID")]
    pub question_id: usize,
}

// ---------------------------------------------------------------------------
// Server → client
// ---------------------------------------------------------------------------

/// Every event the server broadcasts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ServerEventKind {
    #[serde(rename = "greetings_server")]
    Greetings,
    #[serde(rename = "reading_round")]
    ReadingRound,
    #[serde(rename = "reading_themes_server")]
    ReadingThemes,
    #[serde(rename = "wall_server")]
    Wall,
    #[serde(rename = "get_quest_server")]
    GetQuest,
    #[serde(rename = "join_server")]
    Join,
    #[serde(rename = "disconnect_server")]
    Disconnect,
    #[serde(rename = "choose_quest_server")]
    ChooseQuest,
    #[serde(rename = "taken_quest_server")]
    TakenQuest,
    #[serde(rename = "score_changed")]
    ScoreChanged,
    #[serde(rename = "answer_accepted_server")]
    AnswerAccepted,
    #[serde(rename = "answer_declined_server")]
    AnswerDeclined,
    #[serde(rename = "final_server")]
    Final,
}

/// An authoritative server event, ready to broadcast.
///
/// Constructed once per transition; the Hub fans the serialized frame out
/// to every registered client unchanged, so all participants observe the
/// same `Exp` deadline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerEvent {
    #[serde(rename = "Type")]
    pub kind: ServerEventKind,

    /// Absolute deadline in unix seconds UTC; 0 when the event does not
    /// re-arm the round timer.
    #[serde(rename = "Exp")]
    pub exp: i64,

    #[serde(rename = "Data")]
    pub data: serde_json::Value,
}

impl ServerEvent {
    /// Builds an event from any serializable payload.
    pub fn new<T: Serialize>(
        kind: ServerEventKind,
        exp: i64,
        payload: &T,
    ) -> Result<Self, ProtocolError> {
        Ok(Self {
            kind,
            exp,
            data: serde_json::to_value(payload).map_err(ProtocolError::Encode)?,
        })
    }

    /// Builds an event with no payload (`Data: null`).
    pub fn empty(kind: ServerEventKind, exp: i64) -> Self {
        Self {
            kind,
            exp,
            data: serde_json::Value::Null,
        }
    }

    /// Serializes the event into a wire frame.
    pub fn to_frame(&self) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(self).map_err(ProtocolError::Encode)
    }
}

// ---------------------------------------------------------------------------
// Server event payloads
// ---------------------------------------------------------------------------

/// `greetings_server`: pack metadata shown while players settle in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GreetingsPayload {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Author")]
    pub author: String,
    #[serde(rename = "Date")]
    pub date: String,
}

/// `reading_round`: the name of the round about to start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadingRoundPayload {
    #[serde(rename = "Name")]
    pub name: String,
}

/// `reading_themes_server`: theme names read out before the wall appears.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadingThemesPayload {
    #[serde(rename = "ThemeNames")]
    pub theme_names: Vec<String>,
}

/// `join_server`: a player (or the leader, with `QueueID` 0) entered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinPayload {
    #[serde(rename = "QueueID")]
    pub queue_id: usize,
    #[serde(rename = "Nickname")]
    pub nickname: String,
    #[serde(rename = "ImageUID")]
    pub image_uid: String,
}

/// `disconnect_server`: the player with this queue id left the roster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisconnectPayload {
    #[serde(rename = "QueueID")]
    pub queue_id: usize,
}

/// `get_quest_server`: whose turn it is to pick from the wall.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetQuestPayload {
    #[serde(rename = "QueueID")]
    pub queue_id: usize,
}

/// `taken_quest_server`: the player who buzzed in and now answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TakenQuestPayload {
    #[serde(rename = "QueueID")]
    pub queue_id: usize,
}

/// `score_changed`: a score update, paired with the queue id of the
/// player who picks next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreChangedPayload {
    #[serde(rename = "QueueID")]
    pub queue_id: usize,
    #[serde(rename = "Score")]
    pub score: i64,
}

/// `final_server`: the game is over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalPayload {
    #[serde(rename = "WinnerID")]
    pub winner_id: usize,
}

// =========================================================================
// Tests
// =========================================================================
