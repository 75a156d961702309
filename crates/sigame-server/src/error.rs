//! The HTTP error type: every handler failure maps onto a status code
//! and a plain-text body.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use sigame_auth::AuthError;
use sigame_pack::PackError;
use sigame_room::RoomError;

/// Errors surfaced by the HTTP endpoints.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The request body or parameters don't parse or validate.
    #[error("{0}")]
    BadRequest(String),

    /// Missing, malformed, expired, or otherwise rejected credentials.
    #[error("{0}")]
    Unauthorized(String),

    /// Duplicate pack upload. Kept as its own variant so the body is
    /// exactly `pack already exists`, which clients match on.
    #[error("pack already exists")]
    PackExists,

    /// Anything the client can't fix.
    #[error("{0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            // The duplicate-upload contract answers 500.
            ApiError::PackExists => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(error = %self, "request rejected");
        }
        (status, self.to_string()).into_response()
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Signing(_) | AuthError::Password(_) => {
                ApiError::Internal(err.to_string())
            }
            _ => ApiError::Unauthorized(err.to_string()),
        }
    }
}

impl From<PackError> for ApiError {
    fn from(err: PackError) -> Self {
        match err {
            PackError::AlreadyExists => ApiError::PackExists,
            PackError::BadUid => ApiError::BadRequest(err.to_string()),
            PackError::NotFound(_) => ApiError::BadRequest(err.to_string()),
            _ => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<RoomError> for ApiError {
    fn from(err: RoomError) -> Self {
        match err {
            RoomError::Pack(pack) => pack.into(),
            _ => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        ApiError::Internal(format!("database error: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pack_exists_maps_to_500_with_exact_body() {
        let err: ApiError = PackError::AlreadyExists.into();
        assert!(matches!(err, ApiError::PackExists));
        assert_eq!(err.to_string(), "pack already exists");
    }

    #[test]
    fn test_auth_errors_map_to_unauthorized() {
        assert!(matches!(
            ApiError::from(AuthError::Expired),
            ApiError::Unauthorized(_)
        ));
        assert!(matches!(
            ApiError::from(AuthError::BadSignature),
            ApiError::Unauthorized(_)
        ));
        assert!(matches!(
            ApiError::from(AuthError::Malformed),
            ApiError::Unauthorized(_)
        ));
    }

    #[test]
    fn test_bad_uid_maps_to_bad_request() {
        assert!(matches!(
            ApiError::from(PackError::BadUid),
            ApiError::BadRequest(_)
        ));
    }
}
