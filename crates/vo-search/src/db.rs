use rusqlite::Connection;

use crate::error::Result;

/// Initialise the search tables. Safe to call on every startup (idempotent).
///
/// `search_docs` is the authoritative row store; `search_docs_fts` is an
/// external-content FTS5 shadow synced manually on every write.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS search_docs (
            rowid      INTEGER PRIMARY KEY AUTOINCREMENT,
            doc_id     TEXT NOT NULL UNIQUE,
            title      TEXT NOT NULL DEFAULT '',
            body       TEXT NOT NULL,
            tags       TEXT NOT NULL DEFAULT '[]',
            updated_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_search_docs_id
            ON search_docs(doc_id);
        CREATE VIRTUAL TABLE IF NOT EXISTS search_docs_fts
            USING fts5(title, body, content='search_docs', content_rowid='rowid');",
    )?;
    Ok(())
}
