#![allow(dead_code)]

use chrono::{Duration, Utc};
use mnemo::auth::tokens::{self, IssuedToken, Permissions};
use mnemo::auth::users::{self, Plan, User};
use mnemo::db;
use mnemo::memory::store;
use mnemo::memory::types::NewMemory;
use rusqlite::Connection;

/// Open a fresh in-memory database with schema and migrations applied.
pub fn test_db() -> Connection {
    db::open_memory_database().unwrap()
}

pub fn create_user(conn: &Connection, email: &str) -> User {
    users::create(conn, email, "correct horse battery", None, Plan::Free).unwrap()
}

/// The standard memory read/write permission map.
pub fn memory_rw() -> Permissions {
    let mut p = Permissions::new();
    p.insert("memory".into(), vec!["read".into(), "write".into()]);
    p
}

pub fn issue_token(conn: &Connection, user_id: i64, rate_limit: u32) -> IssuedToken {
    tokens::issue(
        conn,
        user_id,
        "test token",
        &memory_rw(),
        rate_limit,
        Some(Utc::now() + Duration::days(30)),
        None,
    )
    .unwrap()
}

/// Insert a memory directly via the store module. Returns the memory id.
pub fn insert_memory(
    conn: &mut Connection,
    uid: &str,
    namespace: &str,
    text: &str,
    tags: &[&str],
) -> i64 {
    store::create(
        conn,
        NewMemory {
            uid: uid.into(),
            namespace: namespace.into(),
            text: text.into(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            created_by: Some("test".into()),
            user_id: None,
        },
    )
    .unwrap()
    .id
}
