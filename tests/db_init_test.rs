mod helpers;

use mnemo::db::{self, migrations};

#[test]
fn open_database_creates_file_and_schema() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("mnemo.db");

    let conn = db::open_database(&path).unwrap();
    assert!(path.exists());

    let mode: String = conn
        .query_row("PRAGMA journal_mode", [], |row| row.get(0))
        .unwrap();
    assert_eq!(mode.to_lowercase(), "wal");

    let fk: i64 = conn
        .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
        .unwrap();
    assert_eq!(fk, 1);

    assert_eq!(
        migrations::get_schema_version(&conn).unwrap(),
        migrations::CURRENT_SCHEMA_VERSION
    );
}

#[test]
fn reopening_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("mnemo.db");

    {
        let mut conn = db::open_database(&path).unwrap();
        helpers::insert_memory(&mut conn, "u", "u", "persisted across reopen", &["keep"]);
    }

    let conn = db::open_database(&path).unwrap();
    let count: i64 = conn
        .query_row("SELECT COUNT(*) FROM memories", [], |row| row.get(0))
        .unwrap();
    assert_eq!(count, 1);

    // Search index survived too
    let hits: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM memories_fts WHERE memories_fts MATCH '\"persisted\"'",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(hits, 1);
}
