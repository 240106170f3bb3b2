use rusqlite::Connection;
use vo_core::db::add_column_if_missing;

use crate::error::Result;

/// Initialise session tables. Safe to call on every startup.
///
/// `session_entries` is the authoritative append-only log; `session_keys`
/// maps channel-scoped keys to the currently active session id.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS session_keys (
            session_key   TEXT PRIMARY KEY,
            session_id    TEXT NOT NULL,
            is_group      INTEGER NOT NULL DEFAULT 0,
            is_private    INTEGER NOT NULL DEFAULT 0,
            last_activity TEXT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS session_entries (
            id                 INTEGER PRIMARY KEY AUTOINCREMENT,
            session_id         TEXT NOT NULL,
            created_at         TEXT NOT NULL,
            messages           TEXT NOT NULL,
            usage              TEXT NOT NULL DEFAULT '{}',
            is_compaction      INTEGER NOT NULL DEFAULT 0,
            pending_tool_calls TEXT NOT NULL DEFAULT '[]',
            user_id            TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_session_entries_session
            ON session_entries(session_id, id);",
    )?;

    // Columns added after the original schema shipped.
    add_column_if_missing(conn, "session_keys", "bridge_context", "TEXT")?;
    add_column_if_missing(conn, "session_entries", "post_id", "TEXT")?;
    add_column_if_missing(
        conn,
        "session_entries",
        "deleted",
        "INTEGER NOT NULL DEFAULT 0",
    )?;

    Ok(())
}
