//! API token authority: issue, resolve, revoke, and permission checks.
//!
//! Tokens are opaque secrets presented by non-interactive callers. Only the
//! argon2id hash is stored, so [`resolve`] must scan every active token and
//! verify the presented secret against each hash — O(active tokens) per
//! call. That bound is a documented consequence of salted hashing, not a
//! bug; the known O(1) alternative is a two-part token with a public lookup
//! id and a hashed secret suffix.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use rand::RngCore;
use rusqlite::{params, Connection};
use serde::Serialize;
use std::collections::HashMap;

use crate::auth::credentials::{hash_secret, verify_secret};
use crate::error::{Error, Result};

/// Permission map: resource name → allowed actions,
/// e.g. `{"memory": ["read", "write"]}`.
pub type Permissions = HashMap<String, Vec<String>>;

/// Returned from [`issue`]. `secret` is the plaintext token, shown exactly
/// once — it is not recoverable afterwards.
#[derive(Debug, Serialize)]
pub struct IssuedToken {
    pub id: i64,
    pub token_name: String,
    pub secret: String,
    pub expires_at: Option<String>,
}

/// A successfully resolved token with its attached authorization state.
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedToken {
    pub id: i64,
    pub user_id: i64,
    pub token_name: String,
    pub permissions: Permissions,
    pub rate_limit_per_hour: u32,
    pub last_used_at: Option<String>,
    pub expires_at: Option<String>,
    pub is_active: bool,
}

/// Generate an opaque URL-safe token secret (32 random bytes).
pub fn generate_secret() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Store a freshly hashed token for a user. When `secret` is `None` a new
/// one is generated. The plaintext is returned once in [`IssuedToken`].
pub fn issue(
    conn: &Connection,
    user_id: i64,
    token_name: &str,
    permissions: &Permissions,
    rate_limit_per_hour: u32,
    expires_at: Option<DateTime<Utc>>,
    secret: Option<String>,
) -> Result<IssuedToken> {
    let secret = secret.unwrap_or_else(generate_secret);
    let token_hash = hash_secret(&secret)?;
    let permissions_json = serde_json::to_string(permissions)
        .map_err(|e| Error::Internal(format!("permission serialization failed: {e}")))?;
    let expires_at = expires_at.map(|t| t.to_rfc3339());
    let now = Utc::now().to_rfc3339();

    conn.execute(
        "INSERT INTO api_tokens \
         (user_id, token_name, token_hash, permissions, rate_limit_per_hour, expires_at, created_at, is_active) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 1)",
        params![
            user_id,
            token_name,
            token_hash,
            permissions_json,
            rate_limit_per_hour,
            expires_at,
            now,
        ],
    )?;

    Ok(IssuedToken {
        id: conn.last_insert_rowid(),
        token_name: token_name.to_string(),
        secret,
        expires_at,
    })
}

/// Resolve a presented secret against the active token set.
///
/// Scans every active token's hash until one verifies (see module docs for
/// the scaling bound). A matched-but-expired token yields [`Error::Expired`];
/// no match yields [`Error::Unauthorized`] without distinguishing malformed
/// from unknown secrets. On success the token's `last_used_at` is bumped
/// best-effort — a failed bump is logged and swallowed.
pub fn resolve(conn: &Connection, presented: &str, now: DateTime<Utc>) -> Result<ResolvedToken> {
    if presented.is_empty() {
        return Err(Error::Unauthorized);
    }

    let mut stmt = conn.prepare(
        "SELECT id, user_id, token_name, token_hash, permissions, rate_limit_per_hour, \
         last_used_at, expires_at, is_active \
         FROM api_tokens WHERE is_active = 1",
    )?;

    let candidates = stmt
        .query_map([], |row| {
            let permissions_json: String = row.get(4)?;
            Ok((
                row.get::<_, String>(3)?,
                ResolvedToken {
                    id: row.get(0)?,
                    user_id: row.get(1)?,
                    token_name: row.get(2)?,
                    permissions: serde_json::from_str(&permissions_json).unwrap_or_default(),
                    rate_limit_per_hour: row.get(5)?,
                    last_used_at: row.get(6)?,
                    expires_at: row.get(7)?,
                    is_active: row.get(8)?,
                },
            ))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    for (token_hash, token) in candidates {
        if !verify_secret(presented, &token_hash) {
            continue;
        }

        if let Some(expires_at) = token.expires_at.as_deref() {
            if is_past(expires_at, now) {
                return Err(Error::Expired);
            }
        }

        // Telemetry, not an invariant: lost updates under race are fine
        if let Err(e) = touch_last_used(conn, token.id, now) {
            tracing::warn!(token_id = token.id, error = %e, "failed to bump last_used_at");
        }

        return Ok(token);
    }

    Err(Error::Unauthorized)
}

/// Soft-deactivate a token owned by `owner_user_id`.
///
/// Returns `false` (never an error) when the token does not exist, is not
/// owned by the caller, or is already revoked — indistinguishable by design.
pub fn revoke(conn: &Connection, token_id: i64, owner_user_id: i64) -> Result<bool> {
    let rows = conn.execute(
        "UPDATE api_tokens SET is_active = 0 \
         WHERE id = ?1 AND user_id = ?2 AND is_active = 1",
        params![token_id, owner_user_id],
    )?;
    Ok(rows > 0)
}

/// Check a two-part `resource:action` permission key against the token's
/// permission map. Malformed keys are simply false.
pub fn has_permission(token: &ResolvedToken, required: &str) -> bool {
    let parts: Vec<&str> = required.split(':').collect();
    let [resource, action] = parts.as_slice() else {
        return false;
    };
    token
        .permissions
        .get(*resource)
        .is_some_and(|actions| actions.iter().any(|a| a == action))
}

/// All active tokens for a user (metadata only, no hashes).
pub fn list_for_user(conn: &Connection, user_id: i64) -> Result<Vec<ResolvedToken>> {
    let mut stmt = conn.prepare(
        "SELECT id, user_id, token_name, permissions, rate_limit_per_hour, \
         last_used_at, expires_at, is_active \
         FROM api_tokens WHERE user_id = ?1 AND is_active = 1 ORDER BY id",
    )?;
    let tokens = stmt
        .query_map(params![user_id], |row| {
            let permissions_json: String = row.get(3)?;
            Ok(ResolvedToken {
                id: row.get(0)?,
                user_id: row.get(1)?,
                token_name: row.get(2)?,
                permissions: serde_json::from_str(&permissions_json).unwrap_or_default(),
                rate_limit_per_hour: row.get(4)?,
                last_used_at: row.get(5)?,
                expires_at: row.get(6)?,
                is_active: row.get(7)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(tokens)
}

/// Does a user have any active token? Used by AI registration to avoid
/// minting duplicates.
pub fn user_has_active_token(conn: &Connection, user_id: i64) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM api_tokens WHERE user_id = ?1 AND is_active = 1",
        params![user_id],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

fn touch_last_used(conn: &Connection, token_id: i64, now: DateTime<Utc>) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE api_tokens SET last_used_at = ?1 WHERE id = ?2",
        params![now.to_rfc3339(), token_id],
    )?;
    Ok(())
}

/// RFC 3339 timestamp strictly before `now`. Unparseable stamps count as
/// past, which fails closed.
fn is_past(stamp: &str, now: DateTime<Utc>) -> bool {
    match DateTime::parse_from_rfc3339(stamp) {
        Ok(t) => t.with_timezone(&Utc) < now,
        Err(_) => true,
    }
}
