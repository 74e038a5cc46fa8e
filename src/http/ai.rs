//! AI-facing endpoints.
//!
//! These are GET routes with the credential in the query string so that an
//! LLM tool-call can hit them with nothing but a URL. Registration is
//! zero-friction: a `(uid, namespace)` pair maps to a synthetic user with a
//! derived email, and gets a long-lived memory read/write token minted on
//! first contact. If the user already holds an active token the response
//! masks it instead of minting another.

use axum::extract::{Query, State};
use axum::Json;
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

use crate::auth::tokens::Permissions;
use crate::auth::{gate, tokens, users};
use crate::error::{Error, Result};
use crate::http::{resolve_page, ApiResponse, AppState};
use crate::memory::query::MemoryQuery;
use crate::memory::store;
use crate::memory::types::{Memory, NewMemory};

/// Placeholder returned when registration finds an existing active token.
/// The real secret is shown exactly once, at mint time.
const MASKED_TOKEN: &str = "***existing***";

#[derive(Debug, Deserialize)]
pub struct RegisterParams {
    pub uid: String,
    pub namespace: String,
    /// Caller-supplied token secret to store instead of generating one.
    pub token: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub uid: String,
    pub namespace: String,
    pub email: String,
    pub token: String,
    pub expires_at: Option<String>,
    pub message: String,
}

/// `GET /api/v1/ai/register`
pub async fn register(
    State(state): State<AppState>,
    Query(params): Query<RegisterParams>,
) -> Result<Json<ApiResponse<RegisterResponse>>> {
    if params.uid.trim().is_empty() || params.namespace.trim().is_empty() {
        return Err(Error::Validation(
            "uid and namespace must not be empty".into(),
        ));
    }

    let config = Arc::clone(&state.config);
    state
        .with_db(move |conn| {
            let email = format!("{}@{}.ai", params.uid, params.namespace);
            let now = Utc::now();

            let user = match users::get_by_email(conn, &email)? {
                Some(user) => {
                    if tokens::user_has_active_token(conn, user.id)? {
                        return Ok(RegisterResponse {
                            uid: params.uid,
                            namespace: params.namespace,
                            email,
                            token: MASKED_TOKEN.into(),
                            expires_at: None,
                            message: "already registered with an active token".into(),
                        });
                    }
                    user
                }
                // Synthetic account; the random password is never shown and
                // never usable for login
                None => users::create(
                    conn,
                    &email,
                    &tokens::generate_secret(),
                    Some(&format!("AI {}", params.uid)),
                    users::Plan::Ai,
                )?,
            };

            let mut permissions = Permissions::new();
            permissions.insert("memory".into(), vec!["read".into(), "write".into()]);
            let expires_at = now + Duration::days(config.auth.ai_token_ttl_days as i64);
            let issued = tokens::issue(
                conn,
                user.id,
                &format!("ai:{}", params.uid),
                &permissions,
                config.auth.ai_rate_limit_per_hour,
                Some(expires_at),
                params.token,
            )?;
            tracing::info!(user_id = user.id, token_id = issued.id, "ai registration");

            Ok(RegisterResponse {
                uid: params.uid,
                namespace: params.namespace,
                email,
                token: issued.secret,
                expires_at: issued.expires_at,
                message: "registration successful".into(),
            })
        })
        .await
        .map(ApiResponse::ok)
}

#[derive(Debug, Deserialize)]
pub struct ValidateParams {
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct TokenStatus {
    pub valid: bool,
    pub token_name: String,
    pub user_id: i64,
    pub permissions: Permissions,
    pub rate_limit_per_hour: u32,
    pub expires_at: Option<String>,
}

/// `GET /api/v1/ai/token/validate`
pub async fn validate_token(
    State(state): State<AppState>,
    Query(params): Query<ValidateParams>,
) -> Result<Json<ApiResponse<TokenStatus>>> {
    state
        .with_db(move |conn| {
            let resolved = tokens::resolve(conn, &params.token, Utc::now())?;
            Ok(TokenStatus {
                valid: true,
                token_name: resolved.token_name,
                user_id: resolved.user_id,
                permissions: resolved.permissions,
                rate_limit_per_hour: resolved.rate_limit_per_hour,
                expires_at: resolved.expires_at,
            })
        })
        .await
        .map(ApiResponse::ok)
}

#[derive(Debug, Deserialize)]
pub struct AiSaveParams {
    pub token: String,
    pub uid: String,
    pub text: String,
    pub namespace: Option<String>,
    /// Comma-separated tag list.
    pub tags: Option<String>,
}

/// `GET /api/v1/ai/memory/save`
pub async fn save(
    State(state): State<AppState>,
    Query(params): Query<AiSaveParams>,
) -> Result<Json<ApiResponse<Memory>>> {
    let started = Instant::now();
    state
        .with_db(move |conn| {
            let now = Utc::now();
            let principal = gate::authenticate_bearer(conn, &params.token, now)?;
            if !principal.can("memory:write") {
                return Err(Error::Unauthorized);
            }
            gate::check_rate_limit(conn, &principal, now)?;

            let namespace = params
                .namespace
                .filter(|n| !n.trim().is_empty())
                .unwrap_or_else(|| params.uid.clone());
            let memory = store::create(
                conn,
                NewMemory {
                    uid: params.uid,
                    namespace,
                    text: params.text,
                    tags: split_tags(params.tags.as_deref()),
                    created_by: Some(principal.created_by()),
                    user_id: Some(principal.user_id()),
                },
            )?;
            gate::record_usage(
                conn,
                &principal,
                "/api/v1/ai/memory/save",
                200,
                Some(started.elapsed().as_millis() as i64),
                now,
            );
            Ok(memory)
        })
        .await
        .map(ApiResponse::ok)
}

#[derive(Debug, Deserialize)]
pub struct AiQueryParams {
    pub token: String,
    pub uid: String,
    pub namespace: Option<String>,
    /// Comma-separated tag filter.
    pub tags: Option<String>,
    /// Full-text query; switches ordering from recency to relevance.
    pub query: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// `GET /api/v1/ai/memory/query`
pub async fn query(
    State(state): State<AppState>,
    Query(params): Query<AiQueryParams>,
) -> Result<Json<ApiResponse<Vec<Memory>>>> {
    let started = Instant::now();
    let config = Arc::clone(&state.config);
    state
        .with_db(move |conn| {
            let now = Utc::now();
            let principal = gate::authenticate_bearer(conn, &params.token, now)?;
            if !principal.can("memory:read") {
                return Err(Error::Unauthorized);
            }
            gate::check_rate_limit(conn, &principal, now)?;

            let (limit, offset) = resolve_page(params.limit, params.offset, &config.query)?;
            let namespace = params
                .namespace
                .filter(|n| !n.trim().is_empty())
                .unwrap_or_else(|| params.uid.clone());
            let memories = crate::memory::query::run(
                conn,
                &MemoryQuery {
                    uid: params.uid,
                    namespace: Some(namespace),
                    tags: split_tags(params.tags.as_deref()),
                    text: params.query.filter(|q| !q.trim().is_empty()),
                    limit,
                    offset,
                    owner_user_id: Some(principal.user_id()),
                },
            )?;
            gate::record_usage(
                conn,
                &principal,
                "/api/v1/ai/memory/query",
                200,
                Some(started.elapsed().as_millis() as i64),
                now,
            );
            Ok(memories)
        })
        .await
        .map(ApiResponse::ok)
}

/// Split a comma-separated tag parameter, trimming and dropping empties.
fn split_tags(raw: Option<&str>) -> Vec<String> {
    raw.map(|s| {
        s.split(',')
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect()
    })
    .unwrap_or_default()
}
