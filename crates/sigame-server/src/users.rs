//! User records and the SQL repository behind the auth endpoints.
//!
//! The engine consumes exactly three operations: existence by login,
//! credential lookup, and creation. Password verification lives here so
//! callers never see stored hashes.

use serde::Deserialize;
use sqlx::PgPool;

use sigame_auth::password;

/// Login + password as posted to `/auth/credentials`.
#[derive(Debug, Clone, Deserialize)]
pub struct Credentials {
    pub login: String,
    pub password: String,
}

impl Credentials {
    /// Rejects obviously unusable credentials before touching the
    /// database.
    pub fn validate(&self) -> Result<(), String> {
        if self.login.trim().is_empty() {
            return Err("login must not be empty".into());
        }
        if self.password.is_empty() {
            return Err("password must not be empty".into());
        }
        Ok(())
    }
}

/// Registration payload for `/register`.
#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    pub login: String,
    pub password: String,
}

impl NewUser {
    pub fn validate(&self) -> Result<(), String> {
        if self.login.trim().len() < 3 {
            return Err("login must be at least 3 characters".into());
        }
        if self.password.len() < 6 {
            return Err("password must be at least 6 characters".into());
        }
        Ok(())
    }
}

/// SQL-backed user storage. Cheap to clone — wraps a pool.
#[derive(Clone)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Whether a user with this login exists.
    pub async fn is_exist_by_login(&self, login: &str) -> Result<bool, sqlx::Error> {
        let row: Option<(i64,)> =
            sqlx::query_as("SELECT id FROM users WHERE login = $1")
                .bind(login)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.is_some())
    }

    /// Resolves credentials to a user id.
    ///
    /// Returns `Ok(None)` both for an unknown login and for a wrong
    /// password — the endpoint answers 401 either way, and the caller
    /// must not be able to tell the cases apart.
    pub async fn get_user_by_credentials(
        &self,
        credentials: &Credentials,
    ) -> Result<Option<i64>, sqlx::Error> {
        let row: Option<(i64, String)> =
            sqlx::query_as("SELECT id, password FROM users WHERE login = $1")
                .bind(&credentials.login)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.and_then(|(id, stored)| {
            password::verify(&credentials.password, &stored)
                .is_ok()
                .then_some(id)
        }))
    }

    /// Inserts a user with an already-hashed password, returning the id.
    pub async fn create_user(
        &self,
        login: &str,
        password_hash: &str,
    ) -> Result<i64, sqlx::Error> {
        let (id,): (i64,) = sqlx::query_as(
            "INSERT INTO users (login, password) VALUES ($1, $2) RETURNING id",
        )
        .bind(login)
        .bind(password_hash)
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }
}
