//! Error types for the protocol layer.

/// Errors that can occur while encoding or decoding a wire frame.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning an event into bytes).
    #[error("encode failed: {0}")]
    Encode(#[source] serde_json::Error),

    /// Deserialization failed (turning bytes into an event).
    ///
    /// Common causes: malformed JSON, an unknown `Type` tag, missing
    /// required fields, or a truncated frame. The caller logs and drops
    /// the frame; the connection stays open.
    #[error("decode failed: {0}")]
    Decode(#[source] serde_json::Error),
}
