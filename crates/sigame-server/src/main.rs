//! SI-Game server entry point.
//!
//! Wires configuration, logging, the database pool, the pack store, and
//! the room registry into the axum router, then serves until terminated.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::EnvFilter;

use sigame_auth::Authenticator;
use sigame_pack::PackStore;
use sigame_room::RoomRegistry;

use sigame_server::config;
use sigame_server::server::{build_router, AppState};
use sigame_server::users::UserRepository;

const CONFIG_PATH: &str = "./config/config.yaml";
const SECRET_KEY_ENV: &str = "SECRET_KEY";

#[derive(Debug, Parser)]
#[command(name = "sigame-server", about = "Realtime SI-Game quiz server")]
struct Args {
    /// Directory holding uploaded pack archives.
    #[arg(long = "packs-path", short = 'p', default_value = "./packs")]
    packs_path: PathBuf,

    /// Directory for temporary pack extractions.
    #[arg(long = "packs-temp-path", default_value = "./packs_temporary")]
    packs_temp_path: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let secret = std::env::var(SECRET_KEY_ENV)
        .with_context(|| format!("{SECRET_KEY_ENV} must be set"))?;

    let config = config::load(CONFIG_PATH)
        .with_context(|| format!("failed to load {CONFIG_PATH}"))?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.app.log_level)),
        )
        .init();

    let pool = PgPoolOptions::new()
        .max_connections(8)
        .connect(&config.db.connection_string())
        .await
        .context("failed to connect to database")?;

    let packs = PackStore::new(&args.packs_path, &args.packs_temp_path)
        .context("failed to open pack store")?;

    let auth = Arc::new(Authenticator::new(secret.as_bytes()));
    let rooms = RoomRegistry::new(packs.clone(), Arc::clone(&auth));

    let state = AppState {
        auth,
        users: UserRepository::new(pool),
        packs,
        rooms,
        token_ttl_secs: config.jwt.expiration_time,
    };

    let addr = format!("0.0.0.0:{}", config.app.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    tracing::info!(
        port = config.app.port,
        log_level = %config.app.log_level,
        database = %config.db.dbname,
        packs_path = %args.packs_path.display(),
        "SI-Game server started"
    );

    axum::serve(listener, build_router(state))
        .await
        .context("server exited")?;

    Ok(())
}
