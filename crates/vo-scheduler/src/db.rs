use rusqlite::Connection;

use crate::error::Result;

/// Initialise the jobs table. Safe to call on every startup.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS jobs (
            name       TEXT PRIMARY KEY,
            cron       TEXT NOT NULL,
            prompt     TEXT NOT NULL DEFAULT '',
            channel_id TEXT NOT NULL,
            timezone   TEXT,
            created_at TEXT NOT NULL,
            last_fire  TEXT,
            next_fire  TEXT
        );",
    )?;
    Ok(())
}
