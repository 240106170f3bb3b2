use std::sync::{Arc, Mutex};

use rusqlite::Connection;
use sha2::{Digest, Sha256};
use tracing::{debug, instrument};

use vo_search::SearchIndex;

use crate::db::init_db;
use crate::error::{MemoryError, Result};
use crate::types::{retrieval_tags, visibility_tag, MemoryEntry, Priority};

/// Key-value agent data with search-backed relevance retrieval.
///
/// SQLite rows are authoritative; the search document is derived and synced
/// on every write. Index failures on store are debug-logged, never raised.
pub struct MemoryStore {
    db: Mutex<Connection>,
    search: Arc<SearchIndex>,
}

/// Everything needed to store one entry.
#[derive(Debug, Clone, Default)]
pub struct NewEntry {
    /// Omit to auto-key by content hash (`memory:` namespace).
    pub key: Option<String>,
    pub value: String,
    pub tags: Vec<String>,
    pub channel_id: Option<String>,
    pub channel_is_private: bool,
    pub user_id: Option<String>,
    pub post_id: Option<String>,
    pub priority: Priority,
}

impl MemoryStore {
    pub fn new(conn: Connection, search: Arc<SearchIndex>) -> Result<Self> {
        init_db(&conn)?;
        Ok(Self {
            db: Mutex::new(conn),
            search,
        })
    }

    /// Store or update an entry; returns its key.
    ///
    /// Keyed entries index under `agent_data:<key>`; auto-keyed entries hash
    /// their content and index under `memory:<hash>`.
    #[instrument(skip(self, entry), fields(channel = entry.channel_id.as_deref().unwrap_or("-")))]
    pub fn store(&self, entry: NewEntry) -> Result<String> {
        let (key, doc_id) = match &entry.key {
            Some(k) => (k.clone(), format!("agent_data:{k}")),
            None => {
                let hash = content_hash(&entry.value);
                (format!("mem-{hash}"), format!("memory:{hash}"))
            }
        };

        let tags_json = serde_json::to_string(&entry.tags)?;
        let now = chrono::Utc::now().to_rfc3339();
        {
            let db = self.db.lock().unwrap();
            db.execute(
                "INSERT INTO agent_data
                 (key, doc_id, value, tags, channel_id, channel_is_private,
                  user_id, post_id, priority, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10)
                 ON CONFLICT(key) DO UPDATE SET
                    value = excluded.value,
                    tags = excluded.tags,
                    channel_id = excluded.channel_id,
                    channel_is_private = excluded.channel_is_private,
                    user_id = excluded.user_id,
                    post_id = excluded.post_id,
                    priority = excluded.priority,
                    updated_at = excluded.updated_at",
                rusqlite::params![
                    key,
                    doc_id,
                    entry.value,
                    tags_json,
                    entry.channel_id,
                    entry.channel_is_private,
                    entry.user_id,
                    entry.post_id,
                    entry.priority.to_string(),
                    now,
                ],
            )?;
        }

        // Index with user tags plus the auto-assigned visibility tag.
        let mut index_tags = entry.tags.clone();
        index_tags.push(visibility_tag(
            entry.channel_id.as_deref(),
            entry.channel_is_private,
        ));
        if let Err(e) = self.search.load(&doc_id, &entry.value, &key, &index_tags) {
            debug!(doc_id = %doc_id, "agent data indexing failed: {e}");
        }

        Ok(key)
    }

    pub fn get(&self, key: &str) -> Result<Option<MemoryEntry>> {
        let db = self.db.lock().unwrap();
        match db.query_row(
            &format!("SELECT {COLUMNS} FROM agent_data WHERE key = ?1"),
            [key],
            row_to_entry,
        ) {
            Ok(entry) => Ok(Some(entry)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(MemoryError::Database(e)),
        }
    }

    /// All entries, oldest first.
    pub fn list(&self) -> Result<Vec<MemoryEntry>> {
        let db = self.db.lock().unwrap();
        let mut stmt =
            db.prepare(&format!("SELECT {COLUMNS} FROM agent_data ORDER BY created_at"))?;
        let rows = stmt.query_map([], row_to_entry)?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    /// Remove an entry and its search document.
    pub fn remove(&self, key: &str) -> Result<()> {
        let doc_id: String = {
            let db = self.db.lock().unwrap();
            let doc_id = db
                .query_row(
                    "SELECT doc_id FROM agent_data WHERE key = ?1",
                    [key],
                    |row| row.get(0),
                )
                .map_err(|_| MemoryError::NotFound {
                    key: key.to_string(),
                })?;
            db.execute("DELETE FROM agent_data WHERE key = ?1", [key])?;
            doc_id
        };
        self.search.delete(&doc_id)?;
        Ok(())
    }

    /// Relevance retrieval scoped to the calling channel.
    ///
    /// Scores are the index's BM25 ranks multiplied by each entry's priority
    /// weight, re-sorted descending.
    #[instrument(skip(self))]
    pub fn search(
        &self,
        query: &str,
        channel_id: Option<&str>,
        channel_is_private: bool,
        limit: usize,
    ) -> Result<Vec<(MemoryEntry, f64)>> {
        let tags = retrieval_tags(channel_id, channel_is_private);
        let hits = self.search.search(query, &tags, limit * 2)?;

        let mut scored = Vec::new();
        for hit in hits {
            let Some(entry) = self.by_doc_id(&hit.id)? else {
                continue;
            };
            let score = hit.score * entry.priority.multiplier();
            scored.push((entry, score));
        }
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit);
        Ok(scored)
    }

    /// Hard-delete every entry carrying `post_id`, search documents included.
    #[instrument(skip(self))]
    pub fn scrub(&self, post_id: &str) -> Result<usize> {
        let doomed: Vec<(String, String)> = {
            let db = self.db.lock().unwrap();
            let mut stmt =
                db.prepare("SELECT key, doc_id FROM agent_data WHERE post_id = ?1")?;
            let rows: Vec<(String, String)> = stmt
                .query_map([post_id], |row| Ok((row.get(0)?, row.get(1)?)))?
                .filter_map(|r| r.ok())
                .collect();
            db.execute("DELETE FROM agent_data WHERE post_id = ?1", [post_id])?;
            rows
        };
        for (_, doc_id) in &doomed {
            self.search.delete(doc_id)?;
        }
        Ok(doomed.len())
    }

    fn by_doc_id(&self, doc_id: &str) -> Result<Option<MemoryEntry>> {
        let db = self.db.lock().unwrap();
        match db.query_row(
            &format!("SELECT {COLUMNS} FROM agent_data WHERE doc_id = ?1"),
            [doc_id],
            row_to_entry,
        ) {
            Ok(entry) => Ok(Some(entry)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(MemoryError::Database(e)),
        }
    }
}

const COLUMNS: &str = "key, value, tags, channel_id, channel_is_private, \
                       user_id, post_id, priority, created_at, updated_at";

fn row_to_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<MemoryEntry> {
    let tags_json: String = row.get(2)?;
    let priority_str: String = row.get(7)?;
    Ok(MemoryEntry {
        key: row.get(0)?,
        value: row.get(1)?,
        tags: serde_json::from_str(&tags_json).unwrap_or_default(),
        channel_id: row.get(3)?,
        channel_is_private: row.get(4)?,
        user_id: row.get(5)?,
        post_id: row.get(6)?,
        priority: priority_str.parse().unwrap_or_default(),
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

/// First 16 hex chars of the content SHA-256; the `memory:` namespace key.
fn content_hash(value: &str) -> String {
    let digest = Sha256::digest(value.as_bytes());
    hex::encode(&digest[..8])
}

#[cfg(test)]
mod tests {
    use super::*;
    use vo_core::db::open_db_in_memory;

    fn store() -> MemoryStore {
        let search = Arc::new(SearchIndex::new(open_db_in_memory().unwrap()).unwrap());
        MemoryStore::new(open_db_in_memory().unwrap(), search).unwrap()
    }

    fn entry(key: &str, value: &str) -> NewEntry {
        NewEntry {
            key: Some(key.to_string()),
            value: value.to_string(),
            ..NewEntry::default()
        }
    }

    #[test]
    fn store_get_remove_roundtrip() {
        let store = store();
        store.store(entry("fav-fruit", "apples")).unwrap();

        let got = store.get("fav-fruit").unwrap().unwrap();
        assert_eq!(got.value, "apples");
        assert_eq!(got.priority, Priority::Medium);

        store.remove("fav-fruit").unwrap();
        assert!(store.get("fav-fruit").unwrap().is_none());
        assert!(matches!(
            store.remove("fav-fruit").unwrap_err(),
            MemoryError::NotFound { .. }
        ));
    }

    #[test]
    fn auto_keyed_entries_use_the_memory_namespace() {
        let store = store();
        let key = store
            .store(NewEntry {
                value: "the deploy window is Friday".to_string(),
                ..NewEntry::default()
            })
            .unwrap();
        assert!(key.starts_with("mem-"));
        assert!(store.get(&key).unwrap().is_some());
    }

    #[test]
    fn priority_reranks_equal_relevance() {
        let store = store();
        store
            .store(NewEntry {
                priority: Priority::Low,
                ..entry("m1", "apples are stored in the cellar")
            })
            .unwrap();
        store
            .store(NewEntry {
                priority: Priority::High,
                ..entry("m2", "apples are stored in the pantry")
            })
            .unwrap();

        let hits = store.search("apples", None, false, 5).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].0.key, "m2");
        assert!(hits[0].1 > hits[1].1);
    }

    #[test]
    fn private_channel_memory_stays_in_its_channel() {
        let store = store();
        store
            .store(NewEntry {
                channel_id: Some("town".to_string()),
                channel_is_private: false,
                ..entry("pub", "apples in town square")
            })
            .unwrap();
        store
            .store(NewEntry {
                channel_id: Some("dm-alice".to_string()),
                channel_is_private: true,
                ..entry("priv", "apples only for alice")
            })
            .unwrap();

        // From the home private channel: only its own entry.
        let from_dm = store.search("apples", Some("dm-alice"), true, 5).unwrap();
        assert_eq!(from_dm.len(), 1);
        assert_eq!(from_dm[0].0.key, "priv");

        // From another public channel: the public entry, not alice's.
        let from_public = store.search("apples", Some("dev"), false, 5).unwrap();
        assert_eq!(from_public.len(), 1);
        assert_eq!(from_public[0].0.key, "pub");

        // From a different private channel: nothing.
        let from_other_dm = store.search("apples", Some("dm-bob"), true, 5).unwrap();
        assert!(from_other_dm.is_empty());
    }

    #[test]
    fn scrub_hard_deletes_by_post_id() {
        let store = store();
        store
            .store(NewEntry {
                post_id: Some("p-9".to_string()),
                ..entry("doomed", "delete me")
            })
            .unwrap();
        store.store(entry("kept", "keep me")).unwrap();

        assert_eq!(store.scrub("p-9").unwrap(), 1);
        assert!(store.get("doomed").unwrap().is_none());
        assert!(store.get("kept").unwrap().is_some());
        assert!(store.search("delete", None, false, 5).unwrap().is_empty());
    }
}
