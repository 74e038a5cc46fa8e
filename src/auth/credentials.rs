//! One-way credential hashing.
//!
//! The same argon2id scheme covers both user passwords and API token
//! secrets. Hashes are salted per call, so two hashes of the same secret
//! differ in bytes while both verify — which is also why token lookup must
//! scan-and-verify rather than hash the presented secret and index on it.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;

use crate::error::{Error, Result};

/// Hash a secret with a fresh random salt. The output is a PHC string
/// (`$argon2id$...`) with the salt embedded.
pub fn hash_secret(secret: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(secret.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| Error::Internal(format!("credential hashing failed: {e}")))
}

/// Verify a secret against a stored PHC hash.
///
/// Never errors: a malformed or truncated hash verifies false.
pub fn verify_secret(secret: &str, stored_hash: &str) -> bool {
    match PasswordHash::new(stored_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(secret.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}
