use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use vo_core::config::{DEFAULT_BRIDGE_ENTRIES, DEFAULT_ROTATION_SECS};
use vo_core::Message;
use vo_search::SearchIndex;

use crate::db::init_db;
use crate::error::{Result, SessionError};
use crate::types::{AgentState, SessionEntry};

/// Longest bridge-context string injected after a rotation (characters).
const MAX_BRIDGE_CHARS: usize = 4000;

/// Append-only, SQLite-backed store of session entries with a channel-key
/// resolution layer on top.
///
/// Thread-safe: one `Mutex<Connection>`; SQLite serializes writers, WAL lets
/// readers proceed. Indexing into the search store is best-effort; the log
/// row is authoritative and an index failure never fails the append.
pub struct SessionStore {
    db: Mutex<Connection>,
    search: Arc<SearchIndex>,
    rotation_secs: i64,
    bridge_entries: usize,
}

impl SessionStore {
    pub fn new(conn: Connection, search: Arc<SearchIndex>) -> Result<Self> {
        init_db(&conn)?;
        Ok(Self {
            db: Mutex::new(conn),
            search,
            rotation_secs: DEFAULT_ROTATION_SECS,
            bridge_entries: DEFAULT_BRIDGE_ENTRIES,
        })
    }

    pub fn with_rotation_secs(mut self, secs: i64) -> Self {
        self.rotation_secs = secs;
        self
    }

    /// Append one entry to a session's log. Returns the insertion id.
    #[instrument(skip(self, entry), fields(session_id = %entry.session_id))]
    pub fn append_entry(&self, entry: &SessionEntry) -> Result<i64> {
        let messages_json = serde_json::to_string(&entry.messages)?;
        let usage_json = serde_json::to_string(&entry.usage)?;
        let pending_json = serde_json::to_string(&entry.pending_tool_calls)?;
        let now = Utc::now().to_rfc3339();

        let entry_id = {
            let db = self.db.lock().unwrap();
            db.execute(
                "INSERT INTO session_entries
                 (session_id, created_at, messages, usage, is_compaction,
                  pending_tool_calls, user_id, post_id)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                rusqlite::params![
                    entry.session_id,
                    entry.created_at,
                    messages_json,
                    usage_json,
                    entry.is_compaction,
                    pending_json,
                    entry.user_id,
                    entry.post_id,
                ],
            )?;
            let id = db.last_insert_rowid();
            db.execute(
                "UPDATE session_keys SET last_activity = ?1 WHERE session_id = ?2",
                rusqlite::params![now, entry.session_id],
            )?;
            id
        };

        // Index a flattened extract. Failures are debug-logged only.
        let extract = entry.text_extract();
        if !extract.is_empty() {
            let doc_id = format!("session:{}:{}", entry.session_id, entry_id);
            if let Err(e) = self.search.load(&doc_id, &extract, "", &[]) {
                debug!(doc_id = %doc_id, "session entry indexing failed: {e}");
            }
        }

        Ok(entry_id)
    }

    /// Paged read in insertion order. `start` is the 1-based position.
    pub fn entries(&self, session_id: &str, start: usize, limit: usize) -> Result<Vec<SessionEntry>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(
            "SELECT id, session_id, created_at, messages, usage, is_compaction,
                    pending_tool_calls, user_id, post_id
             FROM session_entries
             WHERE session_id = ?1
             ORDER BY id
             LIMIT ?2 OFFSET ?3",
        )?;
        // LIMIT -1 is SQLite's "unbounded"; huge limits map onto it.
        let limit = i64::try_from(limit).unwrap_or(-1);
        let rows = stmt.query_map(
            rusqlite::params![session_id, limit, start.saturating_sub(1) as i64],
            row_to_entry,
        )?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    /// Number of entries in a session's log, soft-deleted rows included.
    pub fn entry_count(&self, session_id: &str) -> Result<usize> {
        let db = self.db.lock().unwrap();
        let n: i64 = db.query_row(
            "SELECT COUNT(*) FROM session_entries WHERE session_id = ?1",
            [session_id],
            |row| row.get(0),
        )?;
        Ok(n as usize)
    }

    /// Rebuild the in-memory projection by folding the full log in order.
    #[instrument(skip(self))]
    pub fn load(&self, session_id: &str) -> Result<AgentState> {
        let entries = self.entries(session_id, 1, usize::MAX)?;
        Ok(AgentState::fold(&entries))
    }

    /// Resolve a channel-scoped session key to its active session id,
    /// rotating to a fresh id after the staleness window.
    pub fn resolve(&self, session_key: &str, is_group: bool, is_private: bool) -> Result<String> {
        self.resolve_at(session_key, is_group, is_private, Utc::now())
    }

    /// Clock-injected body of [`resolve`]; the whole read-modify-write runs
    /// under the store mutex, so two racing resolves serialize here.
    fn resolve_at(
        &self,
        session_key: &str,
        is_group: bool,
        is_private: bool,
        now: DateTime<Utc>,
    ) -> Result<String> {
        let now_str = now.to_rfc3339();
        let db = self.db.lock().unwrap();

        let existing: Option<(String, String)> = match db.query_row(
            "SELECT session_id, last_activity FROM session_keys WHERE session_key = ?1",
            [session_key],
            |row| Ok((row.get(0)?, row.get(1)?)),
        ) {
            Ok(row) => Some(row),
            Err(rusqlite::Error::QueryReturnedNoRows) => None,
            Err(e) => return Err(SessionError::Database(e)),
        };

        if let Some((session_id, last_activity)) = existing {
            let fresh = DateTime::parse_from_rfc3339(&last_activity)
                .map(|t| (now - t.with_timezone(&Utc)).num_seconds() <= self.rotation_secs)
                .unwrap_or(false);

            if fresh {
                db.execute(
                    "UPDATE session_keys SET last_activity = ?1 WHERE session_key = ?2",
                    rusqlite::params![now_str, session_key],
                )?;
                return Ok(session_id);
            }

            // Stale; mint a new id and carry a bridge from the old tail.
            let new_id = Uuid::new_v4().to_string();
            let bridge = self.bridge_from(&db, &session_id)?;
            db.execute(
                "UPDATE session_keys
                 SET session_id = ?1, last_activity = ?2, bridge_context = ?3,
                     is_group = ?4, is_private = ?5
                 WHERE session_key = ?6",
                rusqlite::params![new_id, now_str, bridge, is_group, is_private, session_key],
            )?;
            debug!(session_key, old = %session_id, new = %new_id, "session rotated");
            return Ok(new_id);
        }

        let new_id = Uuid::new_v4().to_string();
        db.execute(
            "INSERT INTO session_keys
             (session_key, session_id, is_group, is_private, last_activity)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![session_key, new_id, is_group, is_private, now_str],
        )?;
        Ok(new_id)
    }

    /// Consume the one-shot bridge context recorded at rotation, if any.
    pub fn take_bridge_context(&self, session_id: &str) -> Result<Option<String>> {
        let db = self.db.lock().unwrap();
        let bridge: Option<String> = match db.query_row(
            "SELECT bridge_context FROM session_keys
             WHERE session_id = ?1 AND bridge_context IS NOT NULL",
            [session_id],
            |row| row.get(0),
        ) {
            Ok(b) => b,
            Err(rusqlite::Error::QueryReturnedNoRows) => None,
            Err(e) => return Err(SessionError::Database(e)),
        };
        if bridge.is_some() {
            db.execute(
                "UPDATE session_keys SET bridge_context = NULL WHERE session_id = ?1",
                [session_id],
            )?;
        }
        Ok(bridge)
    }

    /// Session ids visible from `channel_id`: its own session plus the
    /// sessions of every non-private channel.
    pub fn accessible_sessions(&self, channel_id: &str) -> Result<Vec<String>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(
            "SELECT DISTINCT session_id FROM session_keys
             WHERE session_key = ?1 OR is_private = 0
             ORDER BY session_id",
        )?;
        let rows = stmt.query_map([channel_id], |row| row.get(0))?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    /// Soft-mark every entry carrying `post_id` as deleted and drop their
    /// search documents. Rows stay in the log so provider prompt-cache
    /// prefixes keyed on earlier entries remain valid.
    #[instrument(skip(self))]
    pub fn scrub(&self, post_id: &str) -> Result<usize> {
        let marked: Vec<(String, i64)> = {
            let db = self.db.lock().unwrap();
            let mut stmt = db.prepare(
                "SELECT session_id, id FROM session_entries WHERE post_id = ?1",
            )?;
            let rows: Vec<(String, i64)> = stmt
                .query_map([post_id], |row| Ok((row.get(0)?, row.get(1)?)))?
                .filter_map(|r| r.ok())
                .collect();
            db.execute(
                "UPDATE session_entries SET deleted = 1 WHERE post_id = ?1",
                [post_id],
            )?;
            rows
        };

        for (session_id, entry_id) in &marked {
            let doc_id = format!("session:{session_id}:{entry_id}");
            if let Err(e) = self.search.delete(&doc_id) {
                warn!(doc_id = %doc_id, "scrub: search delete failed: {e}");
            }
        }
        Ok(marked.len())
    }

    /// Flatten the tail of a session into the bridge-context string.
    fn bridge_from(&self, db: &Connection, session_id: &str) -> Result<Option<String>> {
        let mut stmt = db.prepare(
            "SELECT messages FROM session_entries
             WHERE session_id = ?1 AND deleted = 0
             ORDER BY id DESC
             LIMIT ?2",
        )?;
        let mut tails: Vec<String> = stmt
            .query_map(
                rusqlite::params![session_id, self.bridge_entries as i64],
                |row| row.get::<_, String>(0),
            )?
            .filter_map(|r| r.ok())
            .collect();
        if tails.is_empty() {
            return Ok(None);
        }
        tails.reverse(); // oldest first

        let mut out = String::new();
        for messages_json in tails {
            let messages: Vec<Message> =
                serde_json::from_str(&messages_json).unwrap_or_default();
            for msg in &messages {
                let line = match msg {
                    Message::User { content } => format!("user: {content}\n"),
                    Message::Assistant { content, .. } if !content.is_empty() => {
                        format!("assistant: {content}\n")
                    }
                    _ => continue,
                };
                if out.len() + line.len() > MAX_BRIDGE_CHARS {
                    break;
                }
                out.push_str(&line);
            }
        }
        Ok((!out.is_empty()).then_some(out))
    }
}

/// Map a SQLite row to a `SessionEntry`.
fn row_to_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<SessionEntry> {
    let messages_json: String = row.get(3)?;
    let usage_json: String = row.get(4)?;
    let pending_json: String = row.get(6)?;
    Ok(SessionEntry {
        id: row.get(0)?,
        session_id: row.get(1)?,
        created_at: row.get(2)?,
        messages: serde_json::from_str(&messages_json).unwrap_or_default(),
        usage: serde_json::from_str(&usage_json).unwrap_or_default(),
        is_compaction: row.get(5)?,
        pending_tool_calls: serde_json::from_str(&pending_json).unwrap_or_default(),
        user_id: row.get(7)?,
        post_id: row.get(8)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use vo_core::db::open_db_in_memory;

    fn store() -> SessionStore {
        let search = Arc::new(SearchIndex::new(open_db_in_memory().unwrap()).unwrap());
        SessionStore::new(open_db_in_memory().unwrap(), search).unwrap()
    }

    #[test]
    fn entries_come_back_in_append_order() {
        let store = store();
        for i in 0..5 {
            store
                .append_entry(&SessionEntry::turn(
                    "s1",
                    vec![Message::user(format!("msg {i}"))],
                ))
                .unwrap();
        }

        let entries = store.entries("s1", 1, usize::MAX).unwrap();
        assert_eq!(entries.len(), 5);
        for (i, entry) in entries.iter().enumerate() {
            assert_eq!(entry.messages[0].text(), format!("msg {i}"));
        }
        assert!(entries.windows(2).all(|w| w[0].id < w[1].id));

        // load() is the fold of the same sequence.
        let state = store.load("s1").unwrap();
        assert_eq!(state.messages.len(), 5);
        assert_eq!(state.messages, AgentState::fold(&entries).messages);
    }

    #[test]
    fn paged_reads_respect_start_and_limit() {
        let store = store();
        for i in 0..4 {
            store
                .append_entry(&SessionEntry::turn("s", vec![Message::user(i.to_string())]))
                .unwrap();
        }
        let page = store.entries("s", 2, 2).unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].messages[0].text(), "1");
        assert_eq!(page[1].messages[0].text(), "2");
    }

    #[test]
    fn same_key_within_window_shares_a_session() {
        let store = store();
        let now = Utc::now();
        let a = store.resolve_at("ch-x", false, true, now).unwrap();
        let b = store
            .resolve_at("ch-x", false, true, now + Duration::seconds(120))
            .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn stale_key_rotates_to_a_new_session() {
        let store = store();
        let now = Utc::now();
        let a = store.resolve_at("ch-x", false, true, now).unwrap();
        let b = store
            .resolve_at("ch-x", false, true, now + Duration::seconds(3700))
            .unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn rotation_carries_a_bridge_from_the_old_tail() {
        let store = store();
        let now = Utc::now();
        let old = store.resolve_at("ch-x", false, true, now).unwrap();
        for text in ["alpha", "beta", "gamma"] {
            store
                .append_entry(&SessionEntry::turn(
                    &old,
                    vec![Message::user(text), Message::assistant(format!("re: {text}"))],
                ))
                .unwrap();
        }

        let fresh = store
            .resolve_at("ch-x", false, true, now + Duration::seconds(4000))
            .unwrap();
        let bridge = store.take_bridge_context(&fresh).unwrap().unwrap();
        assert!(bridge.contains("alpha"));
        assert!(bridge.contains("gamma"));
        // One-shot: second take comes back empty.
        assert!(store.take_bridge_context(&fresh).unwrap().is_none());
    }

    #[test]
    fn accessible_sessions_skip_other_private_channels() {
        let store = store();
        let now = Utc::now();
        let mine = store.resolve_at("dm-me", false, true, now).unwrap();
        let town = store.resolve_at("town", true, false, now).unwrap();
        let theirs = store.resolve_at("dm-them", false, true, now).unwrap();

        let visible = store.accessible_sessions("dm-me").unwrap();
        assert!(visible.contains(&mine));
        assert!(visible.contains(&town));
        assert!(!visible.contains(&theirs));
    }

    #[test]
    fn scrub_soft_marks_but_keeps_rows_countable() {
        let store = store();
        let mut entry = SessionEntry::turn("s", vec![Message::user("sensitive")]);
        entry.post_id = Some("p-1".to_string());
        store.append_entry(&entry).unwrap();
        store
            .append_entry(&SessionEntry::turn("s", vec![Message::user("normal")]))
            .unwrap();

        let scrubbed = store.scrub("p-1").unwrap();
        assert_eq!(scrubbed, 1);
        assert_eq!(store.entry_count("s").unwrap(), 2);
    }
}
