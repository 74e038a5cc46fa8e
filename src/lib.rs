//! Multi-tenant memory API for humans and AI agents.
//!
//! mnemo stores short text records ("memories") tagged with labels and
//! partitioned by a `(uid, namespace)` pair, and serves them back through
//! exact filters, tag-overlap filters, and full-text relevance search.
//! Two credential paths gate every request:
//!
//! | Caller | Credential | Verification |
//! |--------|------------|--------------|
//! | **Web** | signed session token (JWT) | signature + expiry, per request |
//! | **AI / service** | opaque bearer API token | scan-and-verify against the hashed token set |
//!
//! # Architecture
//!
//! - **Storage**: SQLite with FTS5 (`porter unicode61` tokenizer) for the
//!   derived search index, plus a tag junction table for set-overlap filters
//! - **Auth**: argon2id hashing for passwords and API tokens (never stored in
//!   plaintext), HS256 JWTs for sessions
//! - **Transport**: plain HTTP via axum
//!
//! # Modules
//!
//! - [`config`] — Configuration loading from TOML files and environment variables
//! - [`db`] — SQLite database initialization, schema, and migrations
//! - [`error`] — Crate-wide error taxonomy
//! - [`auth`] — Credential hashing, session tokens, API token authority, access gate
//! - [`memory`] — Core memory engine: store, patch, delete, and the query engine
//! - [`http`] — axum router and request handlers

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod http;
pub mod memory;

pub use error::{Error, Result};
