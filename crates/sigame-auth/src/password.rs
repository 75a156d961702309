//! Password hashing with argon2id.
//!
//! Hashes are stored as PHC strings (`$argon2id$v=19$...`), which embed
//! the salt and parameters, so verification needs nothing but the stored
//! string and the candidate password.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

use crate::AuthError;

/// Hashes a plaintext password into a PHC string for storage.
pub fn hash(plain: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(AuthError::Password)
}

/// Verifies a plaintext password against a stored PHC string.
///
/// A wrong password and a corrupt stored hash both come back as
/// [`AuthError::Password`]; the credentials endpoint answers 401 either way.
pub fn verify(plain: &str, stored: &str) -> Result<(), AuthError> {
    let parsed = PasswordHash::new(stored).map_err(AuthError::Password)?;
    Argon2::default()
        .verify_password(plain.as_bytes(), &parsed)
        .map_err(AuthError::Password)
}
