//! Token management for web users. Session-only: an API token cannot mint,
//! list, or revoke tokens.

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::auth::gate;
use crate::auth::tokens::{self, IssuedToken, Permissions, ResolvedToken};
use crate::error::{Error, Result};
use crate::http::{bearer_from_headers, ApiResponse, AppState};

#[derive(Debug, Deserialize)]
pub struct CreateTokenRequest {
    pub token_name: String,
    /// Resource → allowed actions, e.g. `{"memory": ["read", "write"]}`.
    /// Empty grants nothing.
    #[serde(default)]
    pub permissions: Permissions,
    pub rate_limit_per_hour: Option<u32>,
    pub expires_in_days: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct RevokeResponse {
    pub revoked: bool,
}

/// `POST /api/v1/tokens`
pub async fn create(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<CreateTokenRequest>,
) -> Result<Json<ApiResponse<IssuedToken>>> {
    if req.token_name.trim().is_empty() {
        return Err(Error::Validation("token_name must not be empty".into()));
    }

    let jwt = bearer_from_headers(&headers)?;
    let config = Arc::clone(&state.config);
    state
        .with_db(move |conn| {
            let principal = gate::authenticate_session(conn, &config.auth.secret_key, &jwt)?;
            let expires_at = req
                .expires_in_days
                .map(|days| Utc::now() + Duration::days(days as i64));
            let issued = tokens::issue(
                conn,
                principal.user_id(),
                req.token_name.trim(),
                &req.permissions,
                req.rate_limit_per_hour
                    .unwrap_or(config.auth.default_rate_limit_per_hour),
                expires_at,
                None,
            )?;
            tracing::info!(
                user_id = principal.user_id(),
                token_id = issued.id,
                "api token issued"
            );
            Ok(issued)
        })
        .await
        .map(ApiResponse::ok)
}

/// `GET /api/v1/tokens`
pub async fn list(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ApiResponse<Vec<ResolvedToken>>>> {
    let jwt = bearer_from_headers(&headers)?;
    let config = Arc::clone(&state.config);
    state
        .with_db(move |conn| {
            let principal = gate::authenticate_session(conn, &config.auth.secret_key, &jwt)?;
            tokens::list_for_user(conn, principal.user_id())
        })
        .await
        .map(ApiResponse::ok)
}

/// `DELETE /api/v1/tokens/{id}`
///
/// `revoked: false` covers unknown, unowned, and already-revoked ids alike;
/// none of them is an error.
pub async fn revoke(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<RevokeResponse>>> {
    let jwt = bearer_from_headers(&headers)?;
    let config = Arc::clone(&state.config);
    state
        .with_db(move |conn| {
            let principal = gate::authenticate_session(conn, &config.auth.secret_key, &jwt)?;
            let revoked = tokens::revoke(conn, id, principal.user_id())?;
            Ok(RevokeResponse { revoked })
        })
        .await
        .map(ApiResponse::ok)
}
