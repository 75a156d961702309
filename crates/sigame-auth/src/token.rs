//! Compact bearer tokens: `{id, login, exp}` signed with HMAC-SHA-256.
//!
//! The [`Authenticator`] is stateless — it owns nothing but the derived
//! keys, so one instance is cheaply shared by the HTTP endpoints and by
//! every game loop. Verification is pure: given the same secret and
//! token, the result is always the same.

use chrono::Utc;
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};

use crate::AuthError;

/// The claims carried in every token payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// User id; 0 for guest sessions.
    pub id: i64,
    /// Display name, shown as the nickname on join.
    pub login: String,
    /// Expiry, unix seconds UTC.
    pub exp: i64,
}

impl Claims {
    /// Whether the token has expired as of `now` (unix seconds).
    ///
    /// The game loop calls this on every event in addition to the
    /// signature check, so a token that outlived its `exp` mid-session
    /// is rejected even though it verified at handshake time.
    pub fn is_expired_at(&self, now: i64) -> bool {
        self.exp < now
    }
}

/// Issues and verifies bearer tokens against a shared HMAC secret.
pub struct Authenticator {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl Authenticator {
    /// Derives signing and verification keys from the process secret
    /// (the `SECRET_KEY` environment variable in production).
    pub fn new(secret: &[u8]) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // No leeway: `exp` is an exact deadline, and the countdown UI
        // depends on server and verifier agreeing on it.
        validation.leeway = 0;

        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
        }
    }

    /// Issues a token for the given identity, valid for `ttl_secs`.
    pub fn issue(
        &self,
        id: i64,
        login: &str,
        ttl_secs: i64,
    ) -> Result<String, AuthError> {
        let claims = Claims {
            id,
            login: login.to_owned(),
            exp: Utc::now().timestamp() + ttl_secs,
        };

        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(AuthError::Signing)
    }

    /// Verifies a compact token and returns its claims.
    ///
    /// Failure modes map onto [`AuthError`]: a token that does not parse
    /// is [`Malformed`](AuthError::Malformed), a wrong signature is
    /// [`BadSignature`](AuthError::BadSignature), and a valid but stale
    /// token is [`Expired`](AuthError::Expired).
    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        use jsonwebtoken::errors::ErrorKind;

        jsonwebtoken::decode::<Claims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|err| match err.kind() {
                ErrorKind::ExpiredSignature => AuthError::Expired,
                ErrorKind::InvalidSignature => AuthError::BadSignature,
                _ => AuthError::Malformed,
            })
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"test-secret";

    fn authority() -> Authenticator {
        Authenticator::new(SECRET)
    }

    #[test]
    fn test_issue_then_verify_round_trips_claims() {
        let auth = authority();
        let token = auth.issue(42, "alice", 3600).unwrap();

        let claims = auth.verify(&token).unwrap();
        assert_eq!(claims.id, 42);
        assert_eq!(claims.login, "alice");
        assert!(claims.exp > Utc::now().timestamp());
    }

    #[test]
    fn test_issue_guest_token_carries_zero_id() {
        let auth = authority();
        let token = auth.issue(0, "guest-7", 3600).unwrap();
        assert_eq!(auth.verify(&token).unwrap().id, 0);
    }

    #[test]
    fn test_verify_expired_token_returns_expired() {
        let auth = authority();
        // Negative TTL puts `exp` in the past.
        let token = auth.issue(1, "alice", -10).unwrap();

        assert!(matches!(auth.verify(&token), Err(AuthError::Expired)));
    }

    #[test]
    fn test_verify_wrong_secret_returns_bad_signature() {
        let token = authority().issue(1, "alice", 3600).unwrap();

        let other = Authenticator::new(b"a-different-secret");
        assert!(matches!(other.verify(&token), Err(AuthError::BadSignature)));
    }

    #[test]
    fn test_verify_garbage_returns_malformed() {
        let auth = authority();
        assert!(matches!(auth.verify("not-a-token"), Err(AuthError::Malformed)));
        assert!(matches!(auth.verify(""), Err(AuthError::Malformed)));
        assert!(matches!(auth.verify("a.b.c"), Err(AuthError::Malformed)));
    }

    #[test]
    fn test_verify_tampered_payload_rejected() {
        let auth = authority();
        let token = auth.issue(1, "alice", 3600).unwrap();

        // Flip a character inside the payload segment.
        let mut parts: Vec<String> =
            token.split('.').map(str::to_owned).collect();
        let mut payload: Vec<char> = parts[1].chars().collect();
        payload[0] = if payload[0] == 'A' { 'B' } else { 'A' };
        parts[1] = payload.into_iter().collect();
        let tampered = parts.join(".");

        assert!(auth.verify(&tampered).is_err());
    }

    #[test]
    fn test_claims_is_expired_at_boundary() {
        let claims = Claims { id: 1, login: "a".into(), exp: 100 };
        assert!(!claims.is_expired_at(100));
        assert!(!claims.is_expired_at(99));
        assert!(claims.is_expired_at(101));
    }
}
