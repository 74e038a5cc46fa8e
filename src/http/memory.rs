//! Authenticated memory endpoints for web and service callers.
//!
//! All routes take the credential from the `Authorization: Bearer` header
//! and accept either a session JWT or an API token secret. Every read is
//! ownership-scoped to the resolved user: queries never return another
//! user's records even inside a shared `(uid, namespace)` partition, and a
//! memory owned by another user is indistinguishable from one that does
//! not exist.

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;

use crate::auth::gate;
use crate::error::{Error, Result};
use crate::http::{bearer_from_headers, resolve_page, ApiResponse, AppState};
use crate::memory::query::MemoryQuery;
use crate::memory::store;
use crate::memory::types::{Memory, MemoryPatch, NewMemory};

#[derive(Debug, Deserialize)]
pub struct SaveRequest {
    pub uid: String,
    pub namespace: Option<String>,
    pub text: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// `POST /api/v1/memory/save`
pub async fn save(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<SaveRequest>,
) -> Result<Json<ApiResponse<Memory>>> {
    let credential = bearer_from_headers(&headers)?;
    let config = Arc::clone(&state.config);
    state
        .with_db(move |conn| {
            let now = Utc::now();
            let principal = gate::authenticate(conn, &config.auth.secret_key, &credential, now)?;
            if !principal.can("memory:write") {
                return Err(Error::Unauthorized);
            }
            gate::check_rate_limit(conn, &principal, now)?;

            let namespace = req
                .namespace
                .filter(|n| !n.trim().is_empty())
                .unwrap_or_else(|| req.uid.clone());
            let memory = store::create(
                conn,
                NewMemory {
                    uid: req.uid,
                    namespace,
                    text: req.text,
                    tags: req.tags,
                    created_by: Some(principal.created_by()),
                    user_id: Some(principal.user_id()),
                },
            )?;
            gate::record_usage(conn, &principal, "/api/v1/memory/save", 200, None, now);
            Ok(memory)
        })
        .await
        .map(ApiResponse::ok)
}

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub uid: String,
    pub namespace: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Full-text query; switches ordering from recency to relevance.
    pub query: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// `POST /api/v1/memory/query`
pub async fn query(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<QueryRequest>,
) -> Result<Json<ApiResponse<Vec<Memory>>>> {
    let credential = bearer_from_headers(&headers)?;
    let config = Arc::clone(&state.config);
    state
        .with_db(move |conn| {
            let now = Utc::now();
            let principal = gate::authenticate(conn, &config.auth.secret_key, &credential, now)?;
            if !principal.can("memory:read") {
                return Err(Error::Unauthorized);
            }
            gate::check_rate_limit(conn, &principal, now)?;

            let (limit, offset) = resolve_page(req.limit, req.offset, &config.query)?;
            let namespace = req
                .namespace
                .filter(|n| !n.trim().is_empty())
                .unwrap_or_else(|| req.uid.clone());
            let memories = crate::memory::query::run(
                conn,
                &MemoryQuery {
                    uid: req.uid,
                    namespace: Some(namespace),
                    tags: req.tags,
                    text: req.query.filter(|q| !q.trim().is_empty()),
                    limit,
                    offset,
                    owner_user_id: Some(principal.user_id()),
                },
            )?;
            gate::record_usage(conn, &principal, "/api/v1/memory/query", 200, None, now);
            Ok(memories)
        })
        .await
        .map(ApiResponse::ok)
}

/// `GET /api/v1/memory/{id}`
pub async fn get_one(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<Memory>>> {
    let credential = bearer_from_headers(&headers)?;
    let config = Arc::clone(&state.config);
    state
        .with_db(move |conn| {
            let now = Utc::now();
            let principal = gate::authenticate(conn, &config.auth.secret_key, &credential, now)?;
            if !principal.can("memory:read") {
                return Err(Error::Unauthorized);
            }
            let memory = store::get_by_id(conn, id, Some(principal.user_id()))?;
            gate::record_usage(conn, &principal, "/api/v1/memory/{id}", 200, None, now);
            Ok(memory)
        })
        .await
        .map(ApiResponse::ok)
}

/// `PATCH /api/v1/memory/{id}`
pub async fn patch_one(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(patch): Json<MemoryPatch>,
) -> Result<Json<ApiResponse<Memory>>> {
    let credential = bearer_from_headers(&headers)?;
    let config = Arc::clone(&state.config);
    state
        .with_db(move |conn| {
            let now = Utc::now();
            let principal = gate::authenticate(conn, &config.auth.secret_key, &credential, now)?;
            if !principal.can("memory:write") {
                return Err(Error::Unauthorized);
            }
            let updated = store::update(conn, id, patch, Some(principal.user_id()))?;
            gate::record_usage(conn, &principal, "/api/v1/memory/{id}", 200, None, now);
            Ok(updated)
        })
        .await
        .map(ApiResponse::ok)
}

/// `DELETE /api/v1/memory/{id}`
pub async fn delete_one(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<serde_json::Value>>> {
    let credential = bearer_from_headers(&headers)?;
    let config = Arc::clone(&state.config);
    state
        .with_db(move |conn| {
            let now = Utc::now();
            let principal = gate::authenticate(conn, &config.auth.secret_key, &credential, now)?;
            if !principal.can("memory:write") {
                return Err(Error::Unauthorized);
            }
            if !store::delete(conn, id, Some(principal.user_id()))? {
                return Err(Error::NotFound);
            }
            gate::record_usage(conn, &principal, "/api/v1/memory/{id}", 200, None, now);
            Ok(serde_json::json!({ "deleted": id }))
        })
        .await
        .map(ApiResponse::ok)
}
