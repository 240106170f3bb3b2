use std::sync::Mutex;

use rusqlite::Connection;
use tracing::{info, instrument};

use vo_channels::ChannelInfo;
use vo_core::{EventHandler, EventType};

use crate::db::init_db;
use crate::error::{RegistryError, Result};

/// Durable registry of event types, channels, and handler rules.
///
/// Handler upserts are transactional: the join rows are cleared and
/// re-inserted together with the handler row, so a half-replaced rule is
/// never observable.
pub struct HandlerRegistry {
    db: Mutex<Connection>,
}

impl HandlerRegistry {
    pub fn new(conn: Connection) -> Result<Self> {
        init_db(&conn)?;
        Ok(Self {
            db: Mutex::new(conn),
        })
    }

    // --- channels ----------------------------------------------------------

    /// Drop all channel rows. Called once at startup before sources
    /// re-register; the rows are ephemeral mirrors of live channels.
    pub fn reset_channels(&self) -> Result<()> {
        let db = self.db.lock().unwrap();
        db.execute("DELETE FROM channels", [])?;
        Ok(())
    }

    pub fn upsert_channel(&self, info: &ChannelInfo) -> Result<()> {
        let db = self.db.lock().unwrap();
        db.execute(
            "INSERT INTO channels (id, type_name, is_group, is_private)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(id) DO UPDATE SET
                type_name = excluded.type_name,
                is_group = excluded.is_group,
                is_private = excluded.is_private",
            rusqlite::params![info.id, info.type_name, info.is_group, info.is_private],
        )?;
        Ok(())
    }

    pub fn channel_exists(&self, id: &str) -> Result<bool> {
        let db = self.db.lock().unwrap();
        let n: i64 = db.query_row(
            "SELECT COUNT(*) FROM channels WHERE id = ?1",
            [id],
            |row| row.get(0),
        )?;
        Ok(n > 0)
    }

    pub fn list_channels(&self) -> Result<Vec<ChannelInfo>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(
            "SELECT id, type_name, is_group, is_private FROM channels ORDER BY id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(ChannelInfo {
                id: row.get(0)?,
                type_name: row.get(1)?,
                is_group: row.get(2)?,
                is_private: row.get(3)?,
            })
        })?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    // --- event types -------------------------------------------------------

    pub fn upsert_event_type(&self, event_type: &EventType) -> Result<()> {
        let db = self.db.lock().unwrap();
        db.execute(
            "INSERT INTO event_types (name, description) VALUES (?1, ?2)
             ON CONFLICT(name) DO UPDATE SET description = excluded.description",
            rusqlite::params![event_type.name, event_type.description],
        )?;
        Ok(())
    }

    pub fn remove_event_type(&self, name: &str) -> Result<()> {
        let db = self.db.lock().unwrap();
        let n = db.execute("DELETE FROM event_types WHERE name = ?1", [name])?;
        if n == 0 {
            return Err(RegistryError::EventTypeNotFound {
                name: name.to_string(),
            });
        }
        Ok(())
    }

    pub fn event_type_exists(&self, name: &str) -> Result<bool> {
        let db = self.db.lock().unwrap();
        let n: i64 = db.query_row(
            "SELECT COUNT(*) FROM event_types WHERE name = ?1",
            [name],
            |row| row.get(0),
        )?;
        Ok(n > 0)
    }

    pub fn list_event_types(&self) -> Result<Vec<EventType>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare("SELECT name, description FROM event_types ORDER BY name")?;
        let rows = stmt.query_map([], |row| {
            Ok(EventType {
                name: row.get(0)?,
                description: row.get(1)?,
            })
        })?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    // --- handlers ----------------------------------------------------------

    /// Insert or replace a handler rule.
    ///
    /// Every referenced event type and the target channel (when set) must
    /// already exist. Replacing a handler clears its event-type join and
    /// re-inserts the new set atomically.
    #[instrument(skip(self, handler), fields(id = %handler.id))]
    pub fn upsert_handler(&self, handler: &EventHandler) -> Result<()> {
        for name in &handler.event_type_names {
            if !self.event_type_exists(name)? {
                return Err(RegistryError::EventTypeNotFound { name: name.clone() });
            }
        }
        if let Some(channel_id) = &handler.channel_id {
            if !self.channel_exists(channel_id)? {
                return Err(RegistryError::ChannelNotFound {
                    id: channel_id.clone(),
                });
            }
        }

        let now = chrono::Utc::now().to_rfc3339();
        let mut db = self.db.lock().unwrap();
        let tx = db.transaction()?;
        tx.execute(
            "INSERT INTO event_handlers (id, prompt, channel_id, created_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(id) DO UPDATE SET
                prompt = excluded.prompt,
                channel_id = excluded.channel_id",
            rusqlite::params![handler.id, handler.prompt, handler.channel_id, now],
        )?;
        tx.execute(
            "DELETE FROM handler_event_types WHERE handler_id = ?1",
            [&handler.id],
        )?;
        for name in &handler.event_type_names {
            tx.execute(
                "INSERT INTO handler_event_types (handler_id, event_type_name)
                 VALUES (?1, ?2)",
                rusqlite::params![handler.id, name],
            )?;
        }
        tx.commit()?;

        info!(handler = %handler.id, "handler upserted");
        Ok(())
    }

    pub fn remove_handler(&self, id: &str) -> Result<()> {
        let db = self.db.lock().unwrap();
        let n = db.execute("DELETE FROM event_handlers WHERE id = ?1", [id])?;
        if n == 0 {
            return Err(RegistryError::HandlerNotFound { id: id.to_string() });
        }
        info!(handler = %id, "handler removed");
        Ok(())
    }

    /// All handlers, in insert order.
    pub fn list_handlers(&self) -> Result<Vec<EventHandler>> {
        self.query_handlers("SELECT id, prompt, channel_id FROM event_handlers ORDER BY rowid", &[])
    }

    /// Handlers subscribed to `event_type_name`, in handler insert order.
    ///
    /// Dispatch for one event follows this ordering; the spawned turns
    /// themselves race.
    pub fn handlers_for(&self, event_type_name: &str) -> Result<Vec<EventHandler>> {
        self.query_handlers(
            "SELECT h.id, h.prompt, h.channel_id
             FROM event_handlers h
             JOIN handler_event_types j ON j.handler_id = h.id
             WHERE j.event_type_name = ?1
             ORDER BY h.rowid",
            &[event_type_name],
        )
    }

    fn query_handlers(&self, sql: &str, params: &[&str]) -> Result<Vec<EventHandler>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(sql)?;
        let rows = stmt.query_map(rusqlite::params_from_iter(params), |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Option<String>>(2)?,
            ))
        })?;

        let mut handlers = Vec::new();
        for row in rows.filter_map(|r| r.ok()) {
            let (id, prompt, channel_id) = row;
            let mut names_stmt = db.prepare(
                "SELECT event_type_name FROM handler_event_types
                 WHERE handler_id = ?1 ORDER BY event_type_name",
            )?;
            let event_type_names: Vec<String> = names_stmt
                .query_map([&id], |row| row.get(0))?
                .filter_map(|r| r.ok())
                .collect();
            handlers.push(EventHandler {
                id,
                event_type_names,
                prompt,
                channel_id,
            });
        }
        Ok(handlers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vo_core::db::open_db_in_memory;

    fn registry() -> HandlerRegistry {
        HandlerRegistry::new(open_db_in_memory().unwrap()).unwrap()
    }

    fn seed(registry: &HandlerRegistry) {
        registry
            .upsert_event_type(&EventType::new("repl_input", "REPL line"))
            .unwrap();
        registry
            .upsert_event_type(&EventType::new("chat_message", "Inbound chat"))
            .unwrap();
        registry
            .upsert_channel(&ChannelInfo {
                id: "town".to_string(),
                type_name: "memory".to_string(),
                is_group: true,
                is_private: false,
            })
            .unwrap();
    }

    #[test]
    fn handler_requires_known_event_types() {
        let registry = registry();
        seed(&registry);

        let err = registry
            .upsert_handler(&EventHandler::new(
                "h1",
                vec!["no_such_event".to_string()],
                "",
                None,
            ))
            .unwrap_err();
        assert!(matches!(err, RegistryError::EventTypeNotFound { .. }));
    }

    #[test]
    fn handler_requires_known_channel() {
        let registry = registry();
        seed(&registry);

        let err = registry
            .upsert_handler(&EventHandler::new(
                "h1",
                vec!["repl_input".to_string()],
                "",
                Some("ghost-channel".to_string()),
            ))
            .unwrap_err();
        assert!(matches!(err, RegistryError::ChannelNotFound { .. }));
    }

    #[test]
    fn upsert_replaces_the_event_type_join() {
        let registry = registry();
        seed(&registry);

        registry
            .upsert_handler(&EventHandler::new(
                "h1",
                vec!["repl_input".to_string(), "chat_message".to_string()],
                "old prompt",
                None,
            ))
            .unwrap();
        registry
            .upsert_handler(&EventHandler::new(
                "h1",
                vec!["chat_message".to_string()],
                "new prompt",
                Some("town".to_string()),
            ))
            .unwrap();

        let handlers = registry.list_handlers().unwrap();
        assert_eq!(handlers.len(), 1);
        assert_eq!(handlers[0].prompt, "new prompt");
        assert_eq!(handlers[0].event_type_names, vec!["chat_message"]);
        assert!(registry.handlers_for("repl_input").unwrap().is_empty());
    }

    #[test]
    fn handlers_for_returns_insert_order() {
        let registry = registry();
        seed(&registry);

        for id in ["first", "second", "third"] {
            registry
                .upsert_handler(&EventHandler::new(
                    id,
                    vec!["repl_input".to_string()],
                    "",
                    None,
                ))
                .unwrap();
        }

        let matched = registry.handlers_for("repl_input").unwrap();
        let ids: Vec<&str> = matched.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["first", "second", "third"]);
    }

    #[test]
    fn remove_handler_drops_join_rows() {
        let registry = registry();
        seed(&registry);
        registry
            .upsert_handler(&EventHandler::new(
                "h1",
                vec!["repl_input".to_string()],
                "",
                None,
            ))
            .unwrap();

        registry.remove_handler("h1").unwrap();
        assert!(registry.handlers_for("repl_input").unwrap().is_empty());
        assert!(matches!(
            registry.remove_handler("h1").unwrap_err(),
            RegistryError::HandlerNotFound { .. }
        ));
    }
}
