use rusqlite::Connection;
use vo_core::db::add_column_if_missing;

use crate::error::Result;

/// Initialise the agent-data table. Safe to call on every startup.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS agent_data (
            key                TEXT PRIMARY KEY,
            doc_id             TEXT NOT NULL,
            value              TEXT NOT NULL,
            tags               TEXT NOT NULL DEFAULT '[]',
            channel_id         TEXT,
            channel_is_private INTEGER NOT NULL DEFAULT 0,
            user_id            TEXT,
            created_at         TEXT NOT NULL,
            updated_at         TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_agent_data_doc
            ON agent_data(doc_id);",
    )?;

    // Later additions.
    add_column_if_missing(conn, "agent_data", "post_id", "TEXT")?;
    add_column_if_missing(
        conn,
        "agent_data",
        "priority",
        "TEXT NOT NULL DEFAULT 'medium'",
    )?;

    Ok(())
}
