//! Session tokens: signed, time-bound assertions of a user id.
//!
//! Sessions are stateless — there is no server-side session table. Every
//! request re-verifies the HS256 signature and expiry.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Owning user id.
    pub sub: i64,
    /// Expiration (unix seconds).
    pub exp: i64,
    /// Issued at (unix seconds).
    pub iat: i64,
}

/// Mint a session token for a user, valid for `ttl_minutes` from `now`.
pub fn issue_session(
    secret_key: &str,
    user_id: i64,
    ttl_minutes: u64,
    now: DateTime<Utc>,
) -> Result<String> {
    let claims = SessionClaims {
        sub: user_id,
        exp: (now + Duration::minutes(ttl_minutes as i64)).timestamp(),
        iat: now.timestamp(),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret_key.as_bytes()),
    )
    .map_err(|e| Error::Internal(format!("session token minting failed: {e}")))
}

/// Verify signature and expiry, returning the claims.
///
/// Expired sessions surface as [`Error::Expired`]; every other failure
/// (bad signature, malformed token) collapses to [`Error::Unauthorized`].
pub fn verify_session(secret_key: &str, token: &str) -> Result<SessionClaims> {
    decode::<SessionClaims>(
        token,
        &DecodingKey::from_secret(secret_key.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => Error::Expired,
        _ => Error::Unauthorized,
    })
}
