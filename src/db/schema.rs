//! SQL DDL for all mnemo tables.
//!
//! Defines `users`, `api_tokens`, `api_usage`, `memories`, `memory_tags`,
//! `memories_fts` (FTS5), and `schema_meta`. All DDL uses `IF NOT EXISTS`
//! for idempotent initialization.
//!
//! The index set on `memories` is load-bearing for the query engine:
//! `(uid, namespace)` for partition filters, `memory_tags(tag)` for
//! set-overlap filters, the FTS5 table for relevance ranking, and
//! `created_at` for the default recency ordering.

use rusqlite::Connection;

const SCHEMA_SQL: &str = r#"
-- Registered identities (human or synthetic AI users)
CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY,
    email TEXT NOT NULL UNIQUE,
    name TEXT,
    password_hash TEXT NOT NULL,
    plan TEXT NOT NULL DEFAULT 'free' CHECK(plan IN ('free','ai','enterprise')),
    is_active INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

-- Bearer credentials; only the argon2id hash is ever stored
CREATE TABLE IF NOT EXISTS api_tokens (
    id INTEGER PRIMARY KEY,
    user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    token_name TEXT NOT NULL,
    token_hash TEXT NOT NULL,
    permissions TEXT NOT NULL DEFAULT '{}',
    rate_limit_per_hour INTEGER NOT NULL DEFAULT 5,
    last_used_at TEXT,
    expires_at TEXT,
    created_at TEXT NOT NULL,
    is_active INTEGER NOT NULL DEFAULT 1
);

CREATE INDEX IF NOT EXISTS idx_api_tokens_user ON api_tokens(user_id);
CREATE INDEX IF NOT EXISTS idx_api_tokens_active ON api_tokens(is_active);

-- Append-only request audit, also backs the hourly rate window
CREATE TABLE IF NOT EXISTS api_usage (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    token_id INTEGER NOT NULL REFERENCES api_tokens(id) ON DELETE CASCADE,
    endpoint TEXT NOT NULL,
    response_status INTEGER NOT NULL,
    response_time_ms INTEGER,
    created_at TEXT NOT NULL
);

-- Core memory storage; tags column is the authoritative JSON array,
-- memory_tags mirrors it for overlap queries
CREATE TABLE IF NOT EXISTS memories (
    id INTEGER PRIMARY KEY,
    user_id INTEGER REFERENCES users(id) ON DELETE CASCADE,
    uid TEXT NOT NULL,
    namespace TEXT NOT NULL,
    text TEXT NOT NULL,
    tags TEXT NOT NULL DEFAULT '[]',
    created_by TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_memories_uid_namespace ON memories(uid, namespace);
CREATE INDEX IF NOT EXISTS idx_memories_user ON memories(user_id);
CREATE INDEX IF NOT EXISTS idx_memories_created ON memories(created_at);

CREATE TABLE IF NOT EXISTS memory_tags (
    memory_id INTEGER NOT NULL REFERENCES memories(id) ON DELETE CASCADE,
    tag TEXT NOT NULL,
    PRIMARY KEY (memory_id, tag)
) WITHOUT ROWID;

CREATE INDEX IF NOT EXISTS idx_memory_tags_tag ON memory_tags(tag);

-- Schema metadata
CREATE TABLE IF NOT EXISTS schema_meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;

/// Derived search index. The document is `text + " " + tags joined`, written
/// in the same transaction as the row it indexes. Porter stemming plus
/// unicode61 case folding gives the normalization the ranking relies on.
const FTS_TABLE_SQL: &str = r#"
CREATE VIRTUAL TABLE IF NOT EXISTS memories_fts USING fts5(
    doc,
    tokenize = 'porter unicode61'
);
"#;

/// Initialize all schema tables. Idempotent (uses IF NOT EXISTS).
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;
    conn.execute_batch(FTS_TABLE_SQL)?;

    // Set initial schema version if not already present
    conn.execute(
        "INSERT OR IGNORE INTO schema_meta (key, value) VALUES ('schema_version', '1')",
        [],
    )?;

    Ok(())
}
