//! Access gate: resolves the caller's identity before any store or query
//! code runs.
//!
//! Two independent credential paths, both stateless per request:
//!
//! - **Session**: the presented string is a signed JWT asserting a user id;
//!   verify signature + expiry, load the user, reject inactive accounts.
//! - **Bearer token**: the presented string is an opaque API token secret,
//!   resolved by [`tokens::resolve`]'s scan-and-verify.
//!
//! Failures short-circuit — a request that does not authenticate never
//! reaches the memory store or query engine.

use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, Connection};

use crate::auth::session;
use crate::auth::tokens::{self, ResolvedToken};
use crate::auth::users::{self, User};
use crate::error::{Error, Result};

/// The caller's effective identity after the gate.
#[derive(Debug, Clone)]
pub enum Principal {
    /// Web caller with a verified session.
    Session { user: User },
    /// AI/service caller with a resolved API token.
    Token { token: ResolvedToken },
}

impl Principal {
    pub fn user_id(&self) -> i64 {
        match self {
            Principal::Session { user } => user.id,
            Principal::Token { token } => token.user_id,
        }
    }

    /// Audit string recorded on memories written by this principal.
    pub fn created_by(&self) -> String {
        match self {
            Principal::Session { user } => format!("user:{}", user.id),
            Principal::Token { token } => format!("api_token:{}", token.id),
        }
    }

    /// Permission check. Session callers act with their full account
    /// authority; token callers are bounded by the token's permission map.
    pub fn can(&self, permission: &str) -> bool {
        match self {
            Principal::Session { .. } => true,
            Principal::Token { token } => tokens::has_permission(token, permission),
        }
    }

    pub fn token_id(&self) -> Option<i64> {
        match self {
            Principal::Session { .. } => None,
            Principal::Token { token } => Some(token.id),
        }
    }
}

/// Session path: verify the JWT, load the user, reject inactive accounts.
pub fn authenticate_session(
    conn: &Connection,
    secret_key: &str,
    presented: &str,
) -> Result<Principal> {
    let claims = session::verify_session(secret_key, presented)?;
    let user = users::get_by_id(conn, claims.sub)?.ok_or(Error::Unauthorized)?;
    if !user.is_active {
        return Err(Error::Unauthorized);
    }
    Ok(Principal::Session { user })
}

/// Bearer path: resolve the opaque secret via the token authority.
pub fn authenticate_bearer(
    conn: &Connection,
    presented: &str,
    now: DateTime<Utc>,
) -> Result<Principal> {
    let token = tokens::resolve(conn, presented, now)?;
    Ok(Principal::Token { token })
}

/// Accept either credential kind: a session JWT or an API token secret.
///
/// Tried as a session first; anything that is not a well-formed session
/// token falls through to the bearer path. An `Expired` session does not
/// fall through — it names the right remedy already.
pub fn authenticate(
    conn: &Connection,
    secret_key: &str,
    presented: &str,
    now: DateTime<Utc>,
) -> Result<Principal> {
    match authenticate_session(conn, secret_key, presented) {
        Ok(principal) => Ok(principal),
        Err(Error::Expired) => Err(Error::Expired),
        Err(_) => authenticate_bearer(conn, presented, now),
    }
}

/// Enforce a token's hourly ceiling against the usage log. Session callers
/// have no per-token ceiling and pass through.
pub fn check_rate_limit(conn: &Connection, principal: &Principal, now: DateTime<Utc>) -> Result<()> {
    let Principal::Token { token } = principal else {
        return Ok(());
    };

    let window_start = (now - Duration::hours(1)).to_rfc3339();
    let used: i64 = conn.query_row(
        "SELECT COUNT(*) FROM api_usage WHERE token_id = ?1 AND created_at >= ?2",
        params![token.id, window_start],
        |row| row.get(0),
    )?;

    if used >= token.rate_limit_per_hour as i64 {
        return Err(Error::RateLimited);
    }
    Ok(())
}

/// Append an api_usage row. Best-effort telemetry: failures are logged at
/// warn and never surfaced to the caller.
pub fn record_usage(
    conn: &Connection,
    principal: &Principal,
    endpoint: &str,
    response_status: u16,
    response_time_ms: Option<i64>,
    now: DateTime<Utc>,
) {
    let Some(token_id) = principal.token_id() else {
        return;
    };
    let result = conn.execute(
        "INSERT INTO api_usage (user_id, token_id, endpoint, response_status, response_time_ms, created_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            principal.user_id(),
            token_id,
            endpoint,
            response_status,
            response_time_ms,
            now.to_rfc3339(),
        ],
    );
    if let Err(e) = result {
        tracing::warn!(endpoint, error = %e, "failed to record api usage");
    }
}
