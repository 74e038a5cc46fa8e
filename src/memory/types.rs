//! Core memory record types.
//!
//! A [`Memory`] belongs to exactly one `(uid, namespace)` partition; queries
//! scoped by uid never see records from another partition. Tags are an
//! unordered set. The derived search index lives in storage only — it is
//! recomputed from `text` and `tags` on every write and is never exposed as
//! a field here.

use rusqlite::Row;
use serde::{Deserialize, Serialize};

/// A stored memory record, matching the `memories` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Memory {
    pub id: i64,
    /// Owning registered user, if any. `None` for anonymous/AI-session
    /// memories not tied to an account.
    pub user_id: Option<i64>,
    /// Caller-chosen identifier; not globally unique.
    pub uid: String,
    /// Logical partition under the uid. Defaults to the uid itself at the
    /// request boundary when the caller omits it.
    pub namespace: String,
    pub text: String,
    pub tags: Vec<String>,
    /// Audit string identifying the writing principal.
    pub created_by: Option<String>,
    /// ISO 8601 creation timestamp.
    pub created_at: String,
    /// ISO 8601 last-modification timestamp.
    pub updated_at: String,
}

pub(crate) const MEMORY_COLUMNS: &str =
    "id, user_id, uid, namespace, text, tags, created_by, created_at, updated_at";

impl Memory {
    /// Map a row selected with [`MEMORY_COLUMNS`].
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let tags_json: String = row.get(5)?;
        Ok(Memory {
            id: row.get(0)?,
            user_id: row.get(1)?,
            uid: row.get(2)?,
            namespace: row.get(3)?,
            text: row.get(4)?,
            tags: serde_json::from_str(&tags_json).unwrap_or_default(),
            created_by: row.get(6)?,
            created_at: row.get(7)?,
            updated_at: row.get(8)?,
        })
    }
}

/// Input for a create. `namespace` is already resolved (defaulted to `uid`)
/// before this struct is built.
#[derive(Debug, Clone)]
pub struct NewMemory {
    pub uid: String,
    pub namespace: String,
    pub text: String,
    pub tags: Vec<String>,
    pub created_by: Option<String>,
    pub user_id: Option<i64>,
}

/// Explicit partial update. Only these fields are patchable — unknown keys
/// are rejected at the wire boundary rather than silently ignored.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MemoryPatch {
    pub namespace: Option<String>,
    pub text: Option<String>,
    pub tags: Option<Vec<String>>,
}

impl MemoryPatch {
    pub fn is_empty(&self) -> bool {
        self.namespace.is_none() && self.text.is_none() && self.tags.is_none()
    }
}

/// Trim tags, drop empties, and deduplicate preserving first-seen order.
pub fn normalize_tags(tags: &[String]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    tags.iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .filter(|t| seen.insert(t.clone()))
        .collect()
}

/// Build the derived search document: text and tags joined by whitespace.
/// Case folding and stemming happen in the FTS tokenizer.
pub fn index_document(text: &str, tags: &[String]) -> String {
    if tags.is_empty() {
        text.to_string()
    } else {
        format!("{} {}", text, tags.join(" "))
    }
}
