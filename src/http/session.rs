//! Web session lifecycle: account registration and login.
//!
//! Both routes hand back a short-lived HS256 session token. There is no
//! server-side session state to revoke; expiry does the cleanup.

use axum::extract::State;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::auth::users::{self, Plan, User};
use crate::auth::session;
use crate::error::{Error, Result};
use crate::http::{ApiResponse, AppState};

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub token: String,
    pub user: User,
}

/// `POST /api/v1/auth/register`
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<Json<ApiResponse<SessionResponse>>> {
    if req.password.len() < 8 {
        return Err(Error::Validation(
            "password must be at least 8 characters".into(),
        ));
    }

    let config = Arc::clone(&state.config);
    state
        .with_db(move |conn| {
            let user = users::create(
                conn,
                req.email.trim(),
                &req.password,
                req.name.as_deref(),
                Plan::Free,
            )?;
            let token = session::issue_session(
                &config.auth.secret_key,
                user.id,
                config.auth.session_ttl_minutes,
                Utc::now(),
            )?;
            tracing::info!(user_id = user.id, "user registered");
            Ok(SessionResponse { token, user })
        })
        .await
        .map(ApiResponse::ok)
}

/// `POST /api/v1/auth/login`
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<ApiResponse<SessionResponse>>> {
    let config = Arc::clone(&state.config);
    state
        .with_db(move |conn| {
            let user = users::verify_login(conn, req.email.trim(), &req.password)?;
            let token = session::issue_session(
                &config.auth.secret_key,
                user.id,
                config.auth.session_ttl_minutes,
                Utc::now(),
            )?;
            Ok(SessionResponse { token, user })
        })
        .await
        .map(ApiResponse::ok)
}
