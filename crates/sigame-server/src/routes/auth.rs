//! Identity endpoints: credential login, guest login, token
//! introspection, and registration.
//!
//! Every success answer is a small JSON object; every failure maps
//! through [`ApiError`]. Tokens are issued by the shared
//! [`Authenticator`](sigame_auth::Authenticator) with the configured
//! lifetime.

use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use sigame_auth::password;

use crate::error::ApiError;
use crate::server::AppState;
use crate::users::{Credentials, NewUser};

#[derive(Debug, Deserialize)]
pub struct GuestRequest {
    pub login: String,
}

#[derive(Debug, Deserialize)]
pub struct TokenRequest {
    pub access_token: String,
}

/// `POST /auth/credentials` — password login.
pub async fn credentials(
    State(state): State<AppState>,
    Json(credentials): Json<Credentials>,
) -> Result<Json<Value>, ApiError> {
    credentials.validate().map_err(ApiError::BadRequest)?;

    if !state.users.is_exist_by_login(&credentials.login).await? {
        return Err(ApiError::Unauthorized("user does not exist".into()));
    }

    let id = state
        .users
        .get_user_by_credentials(&credentials)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("invalid credentials".into()))?;

    let token = state
        .auth
        .issue(id, &credentials.login, state.token_ttl_secs)?;
    tracing::info!(login = %credentials.login, "credentials login");

    Ok(Json(json!({ "access_token": token })))
}

/// `POST /auth/guest` — nickname-only login, user id 0.
pub async fn guest(
    State(state): State<AppState>,
    Json(request): Json<GuestRequest>,
) -> Result<Json<Value>, ApiError> {
    if request.login.trim().is_empty() {
        return Err(ApiError::BadRequest("login must not be empty".into()));
    }

    let token = state.auth.issue(0, &request.login, state.token_ttl_secs)?;
    tracing::info!(login = %request.login, "guest login");

    Ok(Json(json!({ "access_token": token })))
}

/// `POST /auth/access` — 200 iff the token verifies and is unexpired.
pub async fn access(
    State(state): State<AppState>,
    Json(request): Json<TokenRequest>,
) -> Result<Json<Value>, ApiError> {
    state.auth.verify(&request.access_token)?;
    Ok(Json(json!({})))
}

/// `POST /get/login` — extracts the login claim from a valid token.
pub async fn get_login(
    State(state): State<AppState>,
    Json(request): Json<TokenRequest>,
) -> Result<Json<Value>, ApiError> {
    let claims = state.auth.verify(&request.access_token)?;
    Ok(Json(json!({ "login": claims.login })))
}

/// `POST /register` — creates a user and logs them in.
pub async fn register(
    State(state): State<AppState>,
    Json(user): Json<NewUser>,
) -> Result<Json<Value>, ApiError> {
    user.validate().map_err(ApiError::BadRequest)?;

    if state.users.is_exist_by_login(&user.login).await? {
        return Err(ApiError::BadRequest("user already exists".into()));
    }

    let hash = password::hash(&user.password)?;
    let id = state.users.create_user(&user.login, &hash).await?;
    let token = state.auth.issue(id, &user.login, state.token_ttl_secs)?;
    tracing::info!(login = %user.login, id, "user registered");

    Ok(Json(json!({ "access_token": token })))
}
