//! Query engine: composes filter predicates into a single ranked, paginated
//! result.
//!
//! Predicates are ANDed in a fixed order: uid (mandatory), namespace,
//! owner, tag overlap, full-text match. A full-text query overrides the
//! default recency ordering with descending relevance (FTS5 bm25 rank).
//! `offset`/`limit` are applied last, as a window over the ordered result.

use rusqlite::types::ToSql;
use rusqlite::Connection;

use crate::error::{Error, Result};
use crate::memory::types::{normalize_tags, Memory};

/// Hard ceiling on page size, matching the wire contract.
pub const MAX_LIMIT: i64 = 100;

/// A fully-resolved query. `namespace` defaulting (to `uid`) happens at the
/// request boundary, so by the time a query reaches this layer the
/// namespace filter is usually present.
#[derive(Debug, Clone)]
pub struct MemoryQuery {
    pub uid: String,
    pub namespace: Option<String>,
    /// Overlap filter: keep records whose tag set intersects this one.
    /// Empty means "no tag filter", not "match nothing".
    pub tags: Vec<String>,
    /// Full-text query over the derived search index.
    pub text: Option<String>,
    pub limit: i64,
    pub offset: i64,
    pub owner_user_id: Option<i64>,
}

impl MemoryQuery {
    fn validate(&self) -> Result<()> {
        if self.uid.trim().is_empty() {
            return Err(Error::Validation("uid must not be empty".into()));
        }
        if self.limit < 1 || self.limit > MAX_LIMIT {
            return Err(Error::Validation(format!(
                "limit must be between 1 and {MAX_LIMIT}"
            )));
        }
        if self.offset < 0 {
            return Err(Error::Validation("offset must be non-negative".into()));
        }
        Ok(())
    }
}

const QUALIFIED_COLUMNS: &str = "m.id, m.user_id, m.uid, m.namespace, m.text, m.tags, \
     m.created_by, m.created_at, m.updated_at";

/// Run a query, returning the ordered window of matching memories.
///
/// Records outside the caller's `(uid, namespace)` partition are never
/// returned. An empty partition yields an empty sequence, not an error; a
/// text query that normalizes to nothing matches nothing.
pub fn run(conn: &Connection, query: &MemoryQuery) -> Result<Vec<Memory>> {
    query.validate()?;

    let tags = normalize_tags(&query.tags);

    // Escape the text query for FTS5 MATCH. A query that is empty after
    // normalization matches nothing rather than erroring.
    let fts_query = match query.text.as_deref() {
        Some(text) => {
            let escaped = escape_fts_query(text);
            if escaped.is_empty() {
                return Ok(Vec::new());
            }
            Some(escaped)
        }
        None => None,
    };

    let mut conditions: Vec<String> = vec!["m.uid = ?".into()];
    let mut params: Vec<&dyn ToSql> = vec![&query.uid];

    if let Some(ref namespace) = query.namespace {
        conditions.push("m.namespace = ?".into());
        params.push(namespace);
    }
    if let Some(ref owner) = query.owner_user_id {
        conditions.push("m.user_id = ?".into());
        params.push(owner);
    }
    if !tags.is_empty() {
        let placeholders = vec!["?"; tags.len()].join(", ");
        conditions.push(format!(
            "EXISTS (SELECT 1 FROM memory_tags t \
             WHERE t.memory_id = m.id AND t.tag IN ({placeholders}))"
        ));
        for tag in &tags {
            params.push(tag);
        }
    }

    let (from_clause, order_clause) = if fts_query.is_some() {
        // FTS5 rank is more negative for better matches; ascending order is
        // descending relevance. The id tiebreak keeps equal-rank ordering
        // deterministic.
        (
            "FROM memories m JOIN memories_fts f ON f.rowid = m.id",
            "ORDER BY f.rank, m.id",
        )
    } else {
        ("FROM memories m", "ORDER BY m.created_at DESC, m.id DESC")
    };
    if let Some(ref fts) = fts_query {
        conditions.push("f.memories_fts MATCH ?".into());
        params.push(fts);
    }

    params.push(&query.limit);
    params.push(&query.offset);

    let sql = format!(
        "SELECT {QUALIFIED_COLUMNS} {from_clause} WHERE {} {order_clause} LIMIT ? OFFSET ?",
        conditions.join(" AND ")
    );

    let mut stmt = conn.prepare(&sql)?;
    let memories = stmt
        .query_map(params.as_slice(), Memory::from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(memories)
}

/// Escape a user query for FTS5 MATCH syntax.
///
/// Wraps each whitespace-delimited word in double quotes and joins with
/// spaces so FTS5 treats them as individual terms (implicit AND). Strips
/// empty tokens.
fn escape_fts_query(query: &str) -> String {
    query
        .split_whitespace()
        .map(|word| {
            let clean = word.replace('"', "");
            format!("\"{clean}\"")
        })
        .filter(|w| w != "\"\"")
        .collect::<Vec<_>>()
        .join(" ")
}
