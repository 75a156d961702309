//! Shared server state and router assembly.

use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, Request};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post};
use axum::Router;
use tracing::Instrument;

use sigame_auth::Authenticator;
use sigame_pack::PackStore;
use sigame_room::RoomRegistry;

use crate::routes;
use crate::routes::pack::MAX_PACK_SIZE;
use crate::users::UserRepository;

/// Header echoed into every request's tracing span, so one client
/// request can be followed across log lines.
const REQUEST_TOKEN_HEADER: &str = "X-REQUEST-TOKEN";

/// State shared by every handler. Cheap to clone per request.
#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<Authenticator>,
    pub users: UserRepository,
    pub packs: PackStore,
    pub rooms: Arc<RoomRegistry>,
    /// Issued-token lifetime from `jwt.expirationTime`.
    pub token_ttl_secs: i64,
}

/// Builds the full route table over the given state.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/hub", get(routes::hub::upgrade))
        .route("/auth/credentials", post(routes::auth::credentials))
        .route("/auth/access", post(routes::auth::access))
        .route("/auth/guest", post(routes::auth::guest))
        .route("/get/login", post(routes::auth::get_login))
        .route("/register", post(routes::auth::register))
        .route(
            "/pack/upload",
            post(routes::pack::upload)
                // Multipart framing adds overhead on top of the archive.
                .layer(DefaultBodyLimit::max(MAX_PACK_SIZE + (1 << 20))),
        )
        .layer(middleware::from_fn(request_context))
        .with_state(state)
}

/// Wraps each request in a span carrying the endpoint and the client's
/// request token header.
async fn request_context(request: Request, next: Next) -> Response {
    let request_token = request
        .headers()
        .get(REQUEST_TOKEN_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("")
        .to_owned();
    let span = tracing::info_span!(
        "request",
        endpoint = %request.uri().path(),
        %request_token,
    );
    next.run(request).instrument(span).await
}
