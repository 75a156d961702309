//! Error types for the auth layer.

/// Errors that can occur while issuing or verifying credentials.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The token is not a well-formed compact token, or its payload does
    /// not carry the expected claims.
    #[error("malformed token")]
    Malformed,

    /// The signature does not match the process secret. Either a stale
    /// secret or a forgery attempt.
    #[error("bad token signature")]
    BadSignature,

    /// The `exp` claim is in the past.
    #[error("token expired")]
    Expired,

    /// Signing a new token failed.
    #[error("token signing failed: {0}")]
    Signing(jsonwebtoken::errors::Error),

    /// Hashing or verifying a password failed. Covers both corrupt
    /// stored hashes and wrong passwords; callers treat either as an
    /// authentication failure.
    #[error("password hash error: {0}")]
    Password(argon2::password_hash::Error),
}
