//! Pack upload: multipart `.siq` archives into the content-addressed
//! store.

use axum::extract::{Multipart, State};
use axum::http::{header, HeaderMap, StatusCode};

use crate::error::ApiError;
use crate::server::AppState;

/// Multipart form field carrying the archive.
pub const SI_GAME_FIELD: &str = "si_game_pack";

/// Upload ceiling; requests beyond it are rejected.
pub const MAX_PACK_SIZE: usize = 150 * (1 << 20);

/// `POST /pack/upload` — stores an archive under its sha-256 digest.
///
/// Requires a valid bearer token in `Authorization`. A duplicate upload
/// answers 500 with the body `pack already exists` and leaves the
/// filesystem untouched.
pub async fn upload(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<StatusCode, ApiError> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("");
    state.auth.verify(token)?;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| ApiError::BadRequest(err.to_string()))?
    {
        if field.name() != Some(SI_GAME_FIELD) {
            continue;
        }

        let bytes = field
            .bytes()
            .await
            .map_err(|err| ApiError::BadRequest(err.to_string()))?;
        if bytes.len() > MAX_PACK_SIZE {
            return Err(ApiError::BadRequest("file size > 150 MB".into()));
        }

        state.packs.save_archive(&bytes)?;
        return Ok(StatusCode::OK);
    }

    Err(ApiError::BadRequest(format!(
        "missing {SI_GAME_FIELD} form field"
    )))
}
