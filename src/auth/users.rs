//! User identity records.
//!
//! Users are never hard-deleted in normal flow — `is_active` soft-disables
//! them and the gate rejects inactive accounts. AI callers get synthetic
//! users (plan `ai`) keyed by an email derived from their namespace and uid.

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;

use crate::auth::credentials::{hash_secret, verify_secret};
use crate::error::{Error, Result};

/// Plan tier for a registered identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Plan {
    Free,
    Ai,
    Enterprise,
}

impl Plan {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Ai => "ai",
            Self::Enterprise => "enterprise",
        }
    }
}

impl std::str::FromStr for Plan {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "free" => Ok(Self::Free),
            "ai" => Ok(Self::Ai),
            "enterprise" => Ok(Self::Enterprise),
            _ => Err(format!("unknown plan: {s}")),
        }
    }
}

/// A user row. The password hash stays in storage and is never part of
/// this struct.
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub name: Option<String>,
    pub plan: Plan,
    pub is_active: bool,
    pub created_at: String,
    pub updated_at: String,
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    let plan_str: String = row.get(3)?;
    Ok(User {
        id: row.get(0)?,
        email: row.get(1)?,
        name: row.get(2)?,
        plan: plan_str.parse().unwrap_or(Plan::Free),
        is_active: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

const USER_COLUMNS: &str = "id, email, name, plan, is_active, created_at, updated_at";

/// Create a user with a hashed password. Duplicate emails surface as a
/// validation error rather than a raw constraint failure.
pub fn create(
    conn: &Connection,
    email: &str,
    password: &str,
    name: Option<&str>,
    plan: Plan,
) -> Result<User> {
    if email.trim().is_empty() {
        return Err(Error::Validation("email must not be empty".into()));
    }
    if get_by_email(conn, email)?.is_some() {
        return Err(Error::Validation("email already registered".into()));
    }

    let password_hash = hash_secret(password)?;
    let now = Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO users (email, name, password_hash, plan, is_active, created_at, updated_at) \
         VALUES (?1, ?2, ?3, ?4, 1, ?5, ?5)",
        params![email, name, password_hash, plan.as_str(), now],
    )?;

    get_by_id(conn, conn.last_insert_rowid())?.ok_or(Error::NotFound)
}

pub fn get_by_id(conn: &Connection, user_id: i64) -> Result<Option<User>> {
    let user = conn
        .query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
            params![user_id],
            user_from_row,
        )
        .optional()?;
    Ok(user)
}

pub fn get_by_email(conn: &Connection, email: &str) -> Result<Option<User>> {
    let user = conn
        .query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1"),
            params![email],
            user_from_row,
        )
        .optional()?;
    Ok(user)
}

/// Verify an email/password pair. Wrong email, wrong password, and
/// disabled account all collapse to `Unauthorized`.
pub fn verify_login(conn: &Connection, email: &str, password: &str) -> Result<User> {
    let row = conn
        .query_row(
            "SELECT id, password_hash FROM users WHERE email = ?1",
            params![email],
            |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)),
        )
        .optional()?;

    let Some((user_id, password_hash)) = row else {
        return Err(Error::Unauthorized);
    };
    if !verify_secret(password, &password_hash) {
        return Err(Error::Unauthorized);
    }

    let user = get_by_id(conn, user_id)?.ok_or(Error::Unauthorized)?;
    if !user.is_active {
        return Err(Error::Unauthorized);
    }
    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    fn test_db() -> Connection {
        db::open_memory_database().unwrap()
    }

    #[test]
    fn create_and_lookup() {
        let conn = test_db();
        let user = create(&conn, "a@example.com", "pw", Some("Alice"), Plan::Free).unwrap();
        assert_eq!(user.email, "a@example.com");
        assert_eq!(user.plan, Plan::Free);
        assert!(user.is_active);

        let by_email = get_by_email(&conn, "a@example.com").unwrap().unwrap();
        assert_eq!(by_email.id, user.id);
        assert!(get_by_email(&conn, "nobody@example.com").unwrap().is_none());
    }

    #[test]
    fn duplicate_email_rejected() {
        let conn = test_db();
        create(&conn, "dup@example.com", "pw", None, Plan::Free).unwrap();
        match create(&conn, "dup@example.com", "pw2", None, Plan::Free) {
            Err(Error::Validation(_)) => {}
            other => panic!("expected Validation, got {other:?}"),
        }
    }

    #[test]
    fn login_verification() {
        let conn = test_db();
        create(&conn, "l@example.com", "correct", None, Plan::Free).unwrap();

        assert!(verify_login(&conn, "l@example.com", "correct").is_ok());
        assert!(matches!(
            verify_login(&conn, "l@example.com", "wrong"),
            Err(Error::Unauthorized)
        ));
        assert!(matches!(
            verify_login(&conn, "ghost@example.com", "correct"),
            Err(Error::Unauthorized)
        ));
    }

    #[test]
    fn inactive_user_cannot_login() {
        let conn = test_db();
        let user = create(&conn, "i@example.com", "pw", None, Plan::Free).unwrap();
        conn.execute("UPDATE users SET is_active = 0 WHERE id = ?1", params![user.id])
            .unwrap();
        assert!(matches!(
            verify_login(&conn, "i@example.com", "pw"),
            Err(Error::Unauthorized)
        ));
    }
}
