//! Crate-wide error taxonomy.
//!
//! Every fallible operation in the core returns [`Result`]. The variants map
//! one-to-one onto caller-visible outcomes: auth failures never distinguish
//! "token does not exist" from "token malformed", and [`Error::NotFound`]
//! covers both true absence and ownership mismatch so nothing leaks about
//! other tenants' data.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Missing, malformed, or non-matching credential.
    #[error("unauthorized")]
    Unauthorized,

    /// Credential matched but is past its validity window. Surfaced
    /// distinctly from `Unauthorized` so callers know to re-issue rather
    /// than retry verbatim.
    #[error("credential expired")]
    Expired,

    /// Entity absent, or present but not owned by the caller.
    #[error("not found")]
    NotFound,

    /// Malformed input; the message names the violated constraint.
    #[error("{0}")]
    Validation(String),

    /// Caller exceeded their hourly request ceiling.
    #[error("rate limit exceeded")]
    RateLimited,

    /// Underlying persistence failure. Logged with detail at the HTTP
    /// boundary, surfaced to callers as an opaque internal error.
    #[error("storage failure: {0}")]
    Store(#[from] rusqlite::Error),

    /// Non-storage internal failure (hashing, token minting). Surfaced
    /// opaquely, same as `Store`.
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// `true` for variants whose detail must never reach a caller.
    pub fn is_internal(&self) -> bool {
        matches!(self, Error::Store(_) | Error::Internal(_))
    }
}
