use std::sync::Mutex;

use rusqlite::Connection;
use tracing::debug;

use crate::db::init_db;
use crate::error::Result;

/// One ranked search result.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub id: String,
    pub title: String,
    pub text: String,
    /// Higher is more relevant. BM25 rank negated so callers can sort desc.
    pub score: f64,
}

/// BM25 document index with OR-semantics tag filtering.
///
/// Thread-safe: wraps its SQLite connection in a `Mutex`. Index writes are
/// best-effort for callers; the owning stores treat failures as debug-level
/// events, never as operation failures.
pub struct SearchIndex {
    db: Mutex<Connection>,
}

impl SearchIndex {
    pub fn new(conn: Connection) -> Result<Self> {
        init_db(&conn)?;
        Ok(Self {
            db: Mutex::new(conn),
        })
    }

    /// Insert or replace a document. Re-loading an id replaces its text,
    /// title, and tags.
    pub fn load(&self, id: &str, text: &str, title: &str, tags: &[String]) -> Result<()> {
        let tags_json = serde_json::to_string(tags)?;
        let now = chrono::Utc::now().to_rfc3339();
        let db = self.db.lock().unwrap();

        // Drop any previous FTS shadow row before replacing the content row.
        if let Some((rowid, old_title, old_body)) = existing_row(&db, id)? {
            fts_delete(&db, rowid, &old_title, &old_body)?;
            db.execute(
                "UPDATE search_docs SET title = ?1, body = ?2, tags = ?3, updated_at = ?4
                 WHERE rowid = ?5",
                rusqlite::params![title, text, tags_json, now, rowid],
            )?;
            db.execute(
                "INSERT INTO search_docs_fts(rowid, title, body) VALUES (?1, ?2, ?3)",
                rusqlite::params![rowid, title, text],
            )?;
        } else {
            db.execute(
                "INSERT INTO search_docs (doc_id, title, body, tags, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![id, title, text, tags_json, now],
            )?;
            let rowid = db.last_insert_rowid();
            db.execute(
                "INSERT INTO search_docs_fts(rowid, title, body) VALUES (?1, ?2, ?3)",
                rusqlite::params![rowid, title, text],
            )?;
        }
        debug!(doc_id = %id, "indexed document");
        Ok(())
    }

    /// Remove a document by id. Missing ids are a no-op.
    pub fn delete(&self, id: &str) -> Result<()> {
        let db = self.db.lock().unwrap();
        if let Some((rowid, title, body)) = existing_row(&db, id)? {
            fts_delete(&db, rowid, &title, &body)?;
            db.execute("DELETE FROM search_docs WHERE rowid = ?1", [rowid])?;
        }
        Ok(())
    }

    /// Remove every document whose id starts with `prefix` (scrub support).
    pub fn delete_prefix(&self, prefix: &str) -> Result<usize> {
        let ids: Vec<String> = {
            let db = self.db.lock().unwrap();
            let mut stmt =
                db.prepare("SELECT doc_id FROM search_docs WHERE doc_id LIKE ?1 || '%'")?;
            let rows: Vec<String> = stmt
                .query_map([prefix], |row| row.get(0))?
                .filter_map(|r| r.ok())
                .collect();
            rows
        };
        for id in &ids {
            self.delete(id)?;
        }
        Ok(ids.len())
    }

    /// Rank documents against `query`, best first.
    ///
    /// When `tags` is non-empty a document matches if ANY supplied tag is in
    /// its tag set. The raw query is sanitized into quoted FTS terms so user
    /// text can never produce an FTS5 syntax error.
    pub fn search(&self, query: &str, tags: &[String], limit: usize) -> Result<Vec<SearchHit>> {
        let fts_query = sanitize_query(query);
        if fts_query.is_empty() {
            return Ok(Vec::new());
        }

        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(
            "SELECT d.doc_id, d.title, d.body, d.tags, rank
             FROM search_docs d
             JOIN search_docs_fts f ON d.rowid = f.rowid
             WHERE search_docs_fts MATCH ?1
             ORDER BY rank
             LIMIT ?2",
        )?;
        // Over-fetch so tag filtering below still fills `limit`.
        let fetch = if tags.is_empty() { limit } else { limit * 4 };
        let rows = stmt.query_map(rusqlite::params![fts_query, fetch as i64], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, f64>(4)?,
            ))
        })?;

        let mut hits = Vec::new();
        for row in rows.filter_map(|r| r.ok()) {
            let (id, title, body, tags_json, rank) = row;
            if !tags.is_empty() {
                let doc_tags: Vec<String> =
                    serde_json::from_str(&tags_json).unwrap_or_default();
                if !tags.iter().any(|t| doc_tags.contains(t)) {
                    continue;
                }
            }
            // FTS5 bm25 rank is negative-better; flip so callers sort desc.
            hits.push(SearchHit {
                id,
                title,
                text: body,
                score: -rank,
            });
            if hits.len() >= limit {
                break;
            }
        }
        Ok(hits)
    }
}

/// Look up the content row for a doc id, if present.
fn existing_row(db: &Connection, id: &str) -> Result<Option<(i64, String, String)>> {
    match db.query_row(
        "SELECT rowid, title, body FROM search_docs WHERE doc_id = ?1",
        [id],
        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
    ) {
        Ok(row) => Ok(Some(row)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn fts_delete(db: &Connection, rowid: i64, title: &str, body: &str) -> Result<()> {
    db.execute(
        "INSERT INTO search_docs_fts(search_docs_fts, rowid, title, body)
         VALUES('delete', ?1, ?2, ?3)",
        rusqlite::params![rowid, title, body],
    )?;
    Ok(())
}

/// Turn raw user text into a safe FTS5 query: quoted terms joined by OR.
/// Terms with no alphanumeric content are dropped entirely.
fn sanitize_query(query: &str) -> String {
    query
        .split_whitespace()
        .map(|term| term.replace('"', ""))
        .filter(|t| t.chars().any(|c| c.is_alphanumeric()))
        .map(|t| format!("\"{t}\""))
        .collect::<Vec<_>>()
        .join(" OR ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use vo_core::db::open_db_in_memory;

    fn index() -> SearchIndex {
        SearchIndex::new(open_db_in_memory().unwrap()).unwrap()
    }

    #[test]
    fn load_search_delete_cycle() {
        let idx = index();
        idx.load("agent_data:fruit", "apples are red", "fruit", &[])
            .unwrap();

        let hits = idx.search("apples", &[], 5).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "agent_data:fruit");

        idx.delete("agent_data:fruit").unwrap();
        assert!(idx.search("apples", &[], 5).unwrap().is_empty());
    }

    #[test]
    fn reload_replaces_document() {
        let idx = index();
        idx.load("agent_data:k", "old text", "", &[]).unwrap();
        idx.load("agent_data:k", "fresh text", "", &[]).unwrap();

        assert!(idx.search("old", &[], 5).unwrap().is_empty());
        assert_eq!(idx.search("fresh", &[], 5).unwrap().len(), 1);
    }

    #[test]
    fn tag_filter_matches_any_supplied_tag() {
        let idx = index();
        idx.load(
            "agent_data:a",
            "apples galore",
            "",
            &["agent_data:public".to_string()],
        )
        .unwrap();
        idx.load(
            "agent_data:b",
            "apples hidden",
            "",
            &["agent_data:ch:secret".to_string()],
        )
        .unwrap();

        let visible = idx
            .search(
                "apples",
                &[
                    "agent_data:public".to_string(),
                    "agent_data:ch:mine".to_string(),
                ],
                10,
            )
            .unwrap();
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].id, "agent_data:a");
    }

    #[test]
    fn delete_prefix_scrubs_namespace() {
        let idx = index();
        idx.load("session:s1:1", "first entry", "", &[]).unwrap();
        idx.load("session:s1:2", "second entry", "", &[]).unwrap();
        idx.load("session:s2:1", "other session", "", &[]).unwrap();

        let removed = idx.delete_prefix("session:s1:").unwrap();
        assert_eq!(removed, 2);
        assert_eq!(idx.search("entry", &[], 10).unwrap().len(), 0);
        assert_eq!(idx.search("session", &[], 10).unwrap().len(), 1);
    }

    #[test]
    fn hostile_query_does_not_error() {
        let idx = index();
        idx.load("agent_data:x", "plain text", "", &[]).unwrap();
        // Quotes and operators must be neutralised, not passed to FTS5.
        let hits = idx.search("\"unbalanced AND (", &[], 5).unwrap();
        assert!(hits.is_empty() || hits[0].id == "agent_data:x");
    }
}
