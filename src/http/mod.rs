//! HTTP surface: axum router, shared state, and the error → response
//! mapping.
//!
//! The core never touches raw wire bytes — axum hands handlers parsed
//! query/body parameters and handlers hand back typed JSON. Every handler
//! runs its database work on the blocking pool via [`AppState::with_db`].

pub mod ai;
pub mod memory;
pub mod session;
pub mod tokens;

use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use rusqlite::Connection;
use serde::Serialize;
use std::sync::{Arc, Mutex};

use crate::config::{MnemoConfig, QueryConfig};
use crate::error::{Error, Result};

#[derive(Clone)]
pub struct AppState {
    db: Arc<Mutex<Connection>>,
    pub config: Arc<MnemoConfig>,
}

impl AppState {
    pub fn new(conn: Connection, config: MnemoConfig) -> Self {
        Self {
            db: Arc::new(Mutex::new(conn)),
            config: Arc::new(config),
        }
    }

    /// Run a closure against the shared connection on the blocking pool.
    pub async fn with_db<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || {
            let mut conn = db
                .lock()
                .map_err(|_| Error::Internal("db lock poisoned".into()))?;
            f(&mut conn)
        })
        .await
        .map_err(|e| Error::Internal(format!("db task failed: {e}")))?
    }
}

/// Uniform response envelope.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data,
        })
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            Error::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized"),
            Error::Expired => (StatusCode::UNAUTHORIZED, "expired"),
            Error::NotFound => (StatusCode::NOT_FOUND, "not_found"),
            Error::Validation(_) => (StatusCode::BAD_REQUEST, "validation"),
            Error::RateLimited => (StatusCode::TOO_MANY_REQUESTS, "rate_limited"),
            Error::Store(_) | Error::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal")
            }
        };

        // Internal detail is logged here and never echoed to the caller
        let message = if self.is_internal() {
            tracing::error!(error = %self, "internal error");
            "internal server error".to_string()
        } else {
            self.to_string()
        };

        let body = serde_json::json!({
            "success": false,
            "error": { "code": code, "message": message },
        });
        (status, Json(body)).into_response()
    }
}

/// Pull the bearer credential out of the Authorization header.
pub(crate) fn bearer_from_headers(headers: &HeaderMap) -> Result<String> {
    let value = headers
        .get(axum::http::header::AUTHORIZATION)
        .ok_or(Error::Unauthorized)?
        .to_str()
        .map_err(|_| Error::Unauthorized)?;
    value
        .strip_prefix("Bearer ")
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .ok_or(Error::Unauthorized)
}

/// Apply paging defaults and the operator-configured ceiling. The query
/// engine enforces its own hard bounds; this rejects limits above
/// `query.max_limit` before a query is built.
pub(crate) fn resolve_page(
    limit: Option<i64>,
    offset: Option<i64>,
    config: &QueryConfig,
) -> Result<(i64, i64)> {
    let limit = limit.unwrap_or(config.default_limit);
    if limit > config.max_limit {
        return Err(Error::Validation(format!(
            "limit must not exceed {}",
            config.max_limit
        )));
    }
    Ok((limit, offset.unwrap_or(0)))
}

/// Build the full API router.
pub fn router(state: AppState) -> Router {
    Router::new()
        // AI / LLM callers (GET, token in query string)
        .route("/api/v1/ai/register", get(ai::register))
        .route("/api/v1/ai/token/validate", get(ai::validate_token))
        .route("/api/v1/ai/memory/save", get(ai::save))
        .route("/api/v1/ai/memory/query", get(ai::query))
        // Web session lifecycle
        .route("/api/v1/auth/register", post(session::register))
        .route("/api/v1/auth/login", post(session::login))
        // Authenticated memory operations (session JWT or bearer token)
        .route("/api/v1/memory/save", post(memory::save))
        .route("/api/v1/memory/query", post(memory::query))
        .route(
            "/api/v1/memory/{id}",
            get(memory::get_one)
                .patch(memory::patch_one)
                .delete(memory::delete_one),
        )
        // Token management (session only)
        .route("/api/v1/tokens", get(tokens::list).post(tokens::create))
        .route("/api/v1/tokens/{id}", axum::routing::delete(tokens::revoke))
        .with_state(state)
}

/// Open the database and run the API server until ctrl-c.
pub async fn serve(config: MnemoConfig) -> anyhow::Result<()> {
    let db_path = config.resolved_db_path();
    let conn = crate::db::open_database(&db_path)?;
    tracing::info!(db = %db_path.display(), "database ready");

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let app = router(AppState::new(conn, config));

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(addr = %bind_addr, "mnemo API listening at http://{bind_addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c()
                .await
                .expect("failed to listen for ctrl-c");
            tracing::info!("shutting down");
        })
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bearer_extraction() {
        let mut headers = HeaderMap::new();
        assert!(bearer_from_headers(&headers).is_err());

        headers.insert(
            axum::http::header::AUTHORIZATION,
            "Bearer abc123".parse().unwrap(),
        );
        assert_eq!(bearer_from_headers(&headers).unwrap(), "abc123");

        headers.insert(
            axum::http::header::AUTHORIZATION,
            "Basic abc123".parse().unwrap(),
        );
        assert!(bearer_from_headers(&headers).is_err());

        headers.insert(axum::http::header::AUTHORIZATION, "Bearer ".parse().unwrap());
        assert!(bearer_from_headers(&headers).is_err());
    }

    #[test]
    fn paging_defaults_and_configured_ceiling() {
        let config = QueryConfig {
            default_limit: 10,
            max_limit: 25,
        };

        assert_eq!(resolve_page(None, None, &config).unwrap(), (10, 0));
        assert_eq!(resolve_page(Some(25), Some(50), &config).unwrap(), (25, 50));

        // The operator-configured ceiling is enforced, not the hard default
        assert!(matches!(
            resolve_page(Some(26), None, &config),
            Err(Error::Validation(_))
        ));
    }
}
