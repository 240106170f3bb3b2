//! Shared SQLite plumbing; connection setup, idempotent migrations, and
//! atomic file writes.
//!
//! Every subsystem owns its own `init_db(conn)`; this module only provides
//! the pieces they share.

use std::path::Path;

use rusqlite::Connection;
use tracing::debug;

use crate::error::Result;

/// Open (or create) the database at `path` with the standard pragma set:
/// WAL journal, NORMAL sync, foreign keys on, 5 s busy timeout.
pub fn open_db(path: &Path) -> Result<Connection> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    let conn = Connection::open(path)?;
    apply_pragmas(&conn)?;
    Ok(conn)
}

/// In-memory database with the same pragma set. Test use only; WAL is a
/// no-op for `:memory:` but the rest still applies.
pub fn open_db_in_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory()?;
    apply_pragmas(&conn)?;
    Ok(conn)
}

fn apply_pragmas(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA synchronous = NORMAL;
         PRAGMA foreign_keys = ON;
         PRAGMA busy_timeout = 5000;",
    )?;
    Ok(())
}

/// Add `column` to `table` if it is not already present.
///
/// Forward-compatible migration path: inspect `PRAGMA table_info`, only then
/// `ALTER TABLE ADD COLUMN`. Safe to call on every startup. Returns the raw
/// rusqlite result so subsystem `init_db` functions can use `?` directly.
pub fn add_column_if_missing(
    conn: &Connection,
    table: &str,
    column: &str,
    decl: &str,
) -> rusqlite::Result<()> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table})"))?;
    let existing: Vec<String> = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .filter_map(|r| r.ok())
        .collect();

    if existing.iter().any(|c| c == column) {
        return Ok(());
    }

    debug!(table, column, "adding missing column");
    conn.execute_batch(&format!("ALTER TABLE {table} ADD COLUMN {column} {decl};"))?;
    Ok(())
}

/// Write `bytes` to `path` atomically: write `<path>.tmp`, then rename.
///
/// A crash mid-write leaves the old file intact.
pub fn atomic_write(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, bytes)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_column_is_idempotent() {
        let conn = open_db_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (id INTEGER PRIMARY KEY);")
            .unwrap();

        add_column_if_missing(&conn, "t", "extra", "TEXT").unwrap();
        // Second call must be a no-op, not an error.
        add_column_if_missing(&conn, "t", "extra", "TEXT").unwrap();

        conn.execute("INSERT INTO t (id, extra) VALUES (1, 'x')", [])
            .unwrap();
        let v: String = conn
            .query_row("SELECT extra FROM t WHERE id = 1", [], |r| r.get(0))
            .unwrap();
        assert_eq!(v, "x");
    }

    #[test]
    fn atomic_write_replaces_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");

        atomic_write(&path, b"one").unwrap();
        atomic_write(&path, b"two").unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), b"two");
        assert!(!path.with_extension("tmp").exists());
    }
}
