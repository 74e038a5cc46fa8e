//! Memory write path — row, tag mirror, and derived search index in one
//! transaction.
//!
//! A reader must never observe a memory whose search document reflects
//! stale text or tags, so every mutation that touches `text` or `tags`
//! rewrites the FTS row inside the same transaction as the table write.

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Transaction};

use crate::error::{Error, Result};
use crate::memory::types::{
    index_document, normalize_tags, Memory, MemoryPatch, NewMemory, MEMORY_COLUMNS,
};

/// Create a memory. Writes the row, mirrors tags into `memory_tags`, and
/// indexes the derived search document, all atomically.
pub fn create(conn: &mut Connection, new: NewMemory) -> Result<Memory> {
    if new.uid.trim().is_empty() {
        return Err(Error::Validation("uid must not be empty".into()));
    }
    if new.text.trim().is_empty() {
        return Err(Error::Validation("text must not be empty".into()));
    }

    let tags = normalize_tags(&new.tags);
    let tags_json = serde_json::to_string(&tags)
        .map_err(|e| Error::Internal(format!("tag serialization failed: {e}")))?;
    let now = Utc::now().to_rfc3339();

    let tx = conn.transaction()?;
    tx.execute(
        "INSERT INTO memories (user_id, uid, namespace, text, tags, created_by, created_at, updated_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
        params![
            new.user_id,
            new.uid,
            new.namespace,
            new.text,
            tags_json,
            new.created_by,
            now,
        ],
    )?;
    let id = tx.last_insert_rowid();

    write_tag_mirror(&tx, id, &tags)?;
    write_search_index(&tx, id, &new.text, &tags)?;
    tx.commit()?;

    get_by_id(conn, id, None)
}

/// Apply an explicit-field patch. Recomputes the tag mirror and search
/// index when `text` or `tags` changed; returns `NotFound` when the memory
/// is absent or, when `owner_user_id` is given, not owned by the caller.
pub fn update(
    conn: &mut Connection,
    memory_id: i64,
    patch: MemoryPatch,
    owner_user_id: Option<i64>,
) -> Result<Memory> {
    let current = get_by_id(conn, memory_id, owner_user_id)?;
    if patch.is_empty() {
        return Ok(current);
    }

    let text_changed = patch.text.as_deref().is_some_and(|t| t != current.text);
    let reindex = patch.tags.is_some() || text_changed;
    let namespace = patch.namespace.unwrap_or(current.namespace);
    let text = patch.text.unwrap_or(current.text);
    let tags = match patch.tags {
        Some(ref new_tags) => normalize_tags(new_tags),
        None => current.tags,
    };
    if text.trim().is_empty() {
        return Err(Error::Validation("text must not be empty".into()));
    }

    let tags_json = serde_json::to_string(&tags)
        .map_err(|e| Error::Internal(format!("tag serialization failed: {e}")))?;
    let now = Utc::now().to_rfc3339();

    let tx = conn.transaction()?;
    tx.execute(
        "UPDATE memories SET namespace = ?1, text = ?2, tags = ?3, updated_at = ?4 WHERE id = ?5",
        params![namespace, text, tags_json, now, memory_id],
    )?;

    if reindex {
        tx.execute(
            "DELETE FROM memory_tags WHERE memory_id = ?1",
            params![memory_id],
        )?;
        write_tag_mirror(&tx, memory_id, &tags)?;
        tx.execute(
            "DELETE FROM memories_fts WHERE rowid = ?1",
            params![memory_id],
        )?;
        write_search_index(&tx, memory_id, &text, &tags)?;
    }
    tx.commit()?;

    get_by_id(conn, memory_id, owner_user_id)
}

/// Hard delete. Returns `false` when the memory is absent or not owned by
/// the caller — the two are indistinguishable by design.
pub fn delete(conn: &mut Connection, memory_id: i64, owner_user_id: Option<i64>) -> Result<bool> {
    let tx = conn.transaction()?;

    let rows = match owner_user_id {
        Some(user_id) => tx.execute(
            "DELETE FROM memories WHERE id = ?1 AND user_id = ?2",
            params![memory_id, user_id],
        )?,
        None => tx.execute("DELETE FROM memories WHERE id = ?1", params![memory_id])?,
    };

    if rows > 0 {
        // memory_tags cascades via FK; the FTS table does not
        tx.execute(
            "DELETE FROM memories_fts WHERE rowid = ?1",
            params![memory_id],
        )?;
    }
    tx.commit()?;

    Ok(rows > 0)
}

/// Fetch one memory, ownership-scoped when `owner_user_id` is given.
pub fn get_by_id(
    conn: &Connection,
    memory_id: i64,
    owner_user_id: Option<i64>,
) -> Result<Memory> {
    let memory = match owner_user_id {
        Some(user_id) => conn
            .query_row(
                &format!("SELECT {MEMORY_COLUMNS} FROM memories WHERE id = ?1 AND user_id = ?2"),
                params![memory_id, user_id],
                Memory::from_row,
            )
            .optional()?,
        None => conn
            .query_row(
                &format!("SELECT {MEMORY_COLUMNS} FROM memories WHERE id = ?1"),
                params![memory_id],
                Memory::from_row,
            )
            .optional()?,
    };
    memory.ok_or(Error::NotFound)
}

fn write_tag_mirror(tx: &Transaction<'_>, memory_id: i64, tags: &[String]) -> Result<()> {
    let mut stmt = tx.prepare("INSERT INTO memory_tags (memory_id, tag) VALUES (?1, ?2)")?;
    for tag in tags {
        stmt.execute(params![memory_id, tag])?;
    }
    Ok(())
}

fn write_search_index(
    tx: &Transaction<'_>,
    memory_id: i64,
    text: &str,
    tags: &[String],
) -> Result<()> {
    tx.execute(
        "INSERT INTO memories_fts (rowid, doc) VALUES (?1, ?2)",
        params![memory_id, index_document(text, tags)],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    fn test_db() -> Connection {
        db::open_memory_database().unwrap()
    }

    fn new_memory(uid: &str, namespace: &str, text: &str, tags: &[&str]) -> NewMemory {
        NewMemory {
            uid: uid.into(),
            namespace: namespace.into(),
            text: text.into(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            created_by: Some("test".into()),
            user_id: None,
        }
    }

    fn fts_match_count(conn: &Connection, term: &str) -> i64 {
        conn.query_row(
            "SELECT COUNT(*) FROM memories_fts WHERE memories_fts MATCH ?1",
            params![format!("\"{term}\"")],
            |row| row.get(0),
        )
        .unwrap()
    }

    #[test]
    fn create_writes_row_tags_and_index() {
        let mut conn = test_db();
        let memory = create(
            &mut conn,
            new_memory("alice", "work", "quarterly planning notes", &["planning", "q3"]),
        )
        .unwrap();

        assert_eq!(memory.uid, "alice");
        assert_eq!(memory.namespace, "work");
        assert_eq!(memory.tags, vec!["planning", "q3"]);

        let tag_count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM memory_tags WHERE memory_id = ?1",
                params![memory.id],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(tag_count, 2);

        // Both text terms and tag terms are searchable
        assert_eq!(fts_match_count(&conn, "quarterly"), 1);
        assert_eq!(fts_match_count(&conn, "q3"), 1);
    }

    #[test]
    fn create_rejects_blank_input() {
        let mut conn = test_db();
        assert!(matches!(
            create(&mut conn, new_memory("", "ns", "text", &[])),
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            create(&mut conn, new_memory("u", "ns", "   ", &[])),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn update_tags_only_keeps_text_searchable() {
        let mut conn = test_db();
        let memory = create(
            &mut conn,
            new_memory("alice", "work", "migration postmortem", &["incident"]),
        )
        .unwrap();

        let patch = MemoryPatch {
            tags: Some(vec!["retro".into()]),
            ..Default::default()
        };
        let updated = update(&mut conn, memory.id, patch, None).unwrap();

        assert_eq!(updated.text, "migration postmortem");
        assert_eq!(updated.tags, vec!["retro"]);

        // Old text still matches, old tag does not, new tag does
        assert_eq!(fts_match_count(&conn, "postmortem"), 1);
        assert_eq!(fts_match_count(&conn, "incident"), 0);
        assert_eq!(fts_match_count(&conn, "retro"), 1);
    }

    #[test]
    fn update_text_reindexes() {
        let mut conn = test_db();
        let memory = create(&mut conn, new_memory("a", "ns", "old content", &[])).unwrap();

        let patch = MemoryPatch {
            text: Some("fresh content".into()),
            ..Default::default()
        };
        update(&mut conn, memory.id, patch, None).unwrap();

        assert_eq!(fts_match_count(&conn, "old"), 0);
        assert_eq!(fts_match_count(&conn, "fresh"), 1);
    }

    #[test]
    fn update_missing_or_unowned_is_not_found() {
        let mut conn = test_db();
        let memory = create(&mut conn, new_memory("a", "ns", "content", &[])).unwrap();

        assert!(matches!(
            update(&mut conn, 999, MemoryPatch::default(), None),
            Err(Error::NotFound)
        ));
        // Owned by nobody, queried as user 7 — same NotFound
        assert!(matches!(
            update(&mut conn, memory.id, MemoryPatch::default(), Some(7)),
            Err(Error::NotFound)
        ));
    }

    #[test]
    fn empty_patch_is_a_no_op() {
        let mut conn = test_db();
        let memory = create(&mut conn, new_memory("a", "ns", "content", &["t"])).unwrap();
        let unchanged = update(&mut conn, memory.id, MemoryPatch::default(), None).unwrap();
        assert_eq!(unchanged.text, memory.text);
        assert_eq!(unchanged.updated_at, memory.updated_at);
    }

    #[test]
    fn delete_removes_index_and_reports_ownership_as_absence() {
        let mut conn = test_db();
        let memory = create(&mut conn, new_memory("a", "ns", "ephemeral note", &[])).unwrap();

        // Wrong owner → false, record still there
        assert!(!delete(&mut conn, memory.id, Some(42)).unwrap());
        assert!(get_by_id(&conn, memory.id, None).is_ok());

        assert!(delete(&mut conn, memory.id, None).unwrap());
        assert!(matches!(
            get_by_id(&conn, memory.id, None),
            Err(Error::NotFound)
        ));
        assert_eq!(fts_match_count(&conn, "ephemeral"), 0);
        // Second delete is false, not an error
        assert!(!delete(&mut conn, memory.id, None).unwrap());
    }
}
