use rusqlite::Connection;

use crate::error::Result;

/// Initialise registry tables. Safe to call on every startup.
///
/// `channels` and `event_types` are ephemeral and repopulated by sources at
/// startup; `event_handlers` and its join table are durable rules.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS channels (
            id         TEXT PRIMARY KEY,
            type_name  TEXT NOT NULL,
            is_group   INTEGER NOT NULL DEFAULT 0,
            is_private INTEGER NOT NULL DEFAULT 0
        );
        CREATE TABLE IF NOT EXISTS event_types (
            name        TEXT PRIMARY KEY,
            description TEXT NOT NULL DEFAULT ''
        );
        CREATE TABLE IF NOT EXISTS event_handlers (
            id         TEXT PRIMARY KEY,
            prompt     TEXT NOT NULL DEFAULT '',
            channel_id TEXT,
            created_at TEXT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS handler_event_types (
            handler_id      TEXT NOT NULL
                REFERENCES event_handlers(id) ON DELETE CASCADE,
            event_type_name TEXT NOT NULL,
            PRIMARY KEY (handler_id, event_type_name)
        );
        CREATE INDEX IF NOT EXISTS idx_handler_event_types_name
            ON handler_event_types(event_type_name);",
    )?;
    Ok(())
}
