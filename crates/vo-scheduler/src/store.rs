use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use tracing::{debug, info, instrument, warn};

use vo_core::{EventHandler, EventType};
use vo_registry::{HandlerRegistry, RegistryError};

use crate::db::init_db;
use crate::error::{Result, SchedulerError};
use crate::schedule::{next_fire, parse_cron};
use crate::types::{job_event_type_name, ScheduledJob};

/// Persisted cron jobs plus their registry shadow rows.
///
/// `add_job` creates three things together: the job row, the synthetic event
/// type `tempus_job:<name>`, and a handler subscribed to it. `remove_job`
/// removes all three.
pub struct JobStore {
    db: Mutex<Connection>,
    registry: Arc<HandlerRegistry>,
}

impl JobStore {
    pub fn new(conn: Connection, registry: Arc<HandlerRegistry>) -> Result<Self> {
        init_db(&conn)?;
        Ok(Self {
            db: Mutex::new(conn),
            registry,
        })
    }

    /// Register a job. The channel must exist; the cron expression and
    /// timezone must parse.
    #[instrument(skip(self, prompt))]
    pub fn add_job(
        &self,
        name: &str,
        cron: &str,
        prompt: &str,
        channel_id: &str,
        timezone: Option<&str>,
    ) -> Result<ScheduledJob> {
        let (schedule, tz) = parse_cron(cron, timezone)?;
        if !self.registry.channel_exists(channel_id)? {
            return Err(SchedulerError::Registry(RegistryError::ChannelNotFound {
                id: channel_id.to_string(),
            }));
        }

        let now = Utc::now();
        let next = next_fire(&schedule, tz, now).map(|t| t.to_rfc3339());
        let now_str = now.to_rfc3339();

        {
            let db = self.db.lock().unwrap();
            db.execute(
                "INSERT INTO jobs
                 (name, cron, prompt, channel_id, timezone, created_at, last_fire, next_fire)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, NULL, ?7)
                 ON CONFLICT(name) DO UPDATE SET
                    cron = excluded.cron,
                    prompt = excluded.prompt,
                    channel_id = excluded.channel_id,
                    timezone = excluded.timezone,
                    next_fire = excluded.next_fire",
                rusqlite::params![name, cron, prompt, channel_id, timezone, now_str, next],
            )?;
        }

        // Shadow rows: the event type the job fires and the handler that
        // reacts to it.
        let event_type = job_event_type_name(name);
        self.registry.upsert_event_type(&EventType::new(
            &event_type,
            format!("Scheduled job '{name}' ({cron})"),
        ))?;
        self.registry.upsert_handler(&EventHandler::new(
            &event_type,
            vec![event_type.clone()],
            prompt,
            Some(channel_id.to_string()),
        ))?;

        info!(job = %name, cron, next = next.as_deref().unwrap_or("-"), "job added");
        Ok(ScheduledJob {
            name: name.to_string(),
            cron: cron.to_string(),
            prompt: prompt.to_string(),
            channel_id: channel_id.to_string(),
            timezone: timezone.map(str::to_string),
            created_at: now_str,
            last_fire: None,
            next_fire: next,
        })
    }

    /// Remove a job and its registry shadow rows.
    #[instrument(skip(self))]
    pub fn remove_job(&self, name: &str) -> Result<()> {
        {
            let db = self.db.lock().unwrap();
            let n = db.execute("DELETE FROM jobs WHERE name = ?1", [name])?;
            if n == 0 {
                return Err(SchedulerError::JobNotFound {
                    name: name.to_string(),
                });
            }
        }

        let event_type = job_event_type_name(name);
        if let Err(e) = self.registry.remove_handler(&event_type) {
            debug!(job = %name, "shadow handler already gone: {e}");
        }
        if let Err(e) = self.registry.remove_event_type(&event_type) {
            debug!(job = %name, "shadow event type already gone: {e}");
        }

        info!(job = %name, "job removed");
        Ok(())
    }

    /// All jobs ordered by creation time.
    pub fn list_jobs(&self) -> Result<Vec<ScheduledJob>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(
            "SELECT name, cron, prompt, channel_id, timezone, created_at,
                    last_fire, next_fire
             FROM jobs ORDER BY created_at",
        )?;
        let rows = stmt.query_map([], row_to_job)?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    /// Recompute every job's next fire from `now`. Called once at startup;
    /// ticks missed while the process was down are not replayed.
    pub fn recompute_next_fires(&self, now: DateTime<Utc>) -> Result<()> {
        let jobs = self.list_jobs()?;
        let db = self.db.lock().unwrap();
        for job in jobs {
            let Ok((schedule, tz)) = parse_cron(&job.cron, job.timezone.as_deref()) else {
                warn!(job = %job.name, cron = %job.cron, "stored cron no longer parses");
                continue;
            };
            let next = next_fire(&schedule, tz, now).map(|t| t.to_rfc3339());
            db.execute(
                "UPDATE jobs SET next_fire = ?1 WHERE name = ?2",
                rusqlite::params![next, job.name],
            )?;
        }
        Ok(())
    }

    /// Fire every job whose next_fire has arrived, advancing each to its
    /// following slot. Returns the fired jobs; the engine turns them into
    /// queue events.
    pub fn fire_due(&self, now: DateTime<Utc>) -> Result<Vec<ScheduledJob>> {
        let now_str = now.to_rfc3339();
        let due: Vec<ScheduledJob> = {
            let db = self.db.lock().unwrap();
            let mut stmt = db.prepare_cached(
                "SELECT name, cron, prompt, channel_id, timezone, created_at,
                        last_fire, next_fire
                 FROM jobs
                 WHERE next_fire IS NOT NULL AND next_fire <= ?1",
            )?;
            let rows: Vec<ScheduledJob> = stmt
                .query_map([&now_str], row_to_job)?
                .filter_map(|r| r.ok())
                .collect();
            rows
        };

        for job in &due {
            let next = parse_cron(&job.cron, job.timezone.as_deref())
                .ok()
                .and_then(|(schedule, tz)| next_fire(&schedule, tz, now))
                .map(|t| t.to_rfc3339());
            let db = self.db.lock().unwrap();
            db.execute(
                "UPDATE jobs SET last_fire = ?1, next_fire = ?2 WHERE name = ?3",
                rusqlite::params![now_str, next, job.name],
            )?;
            info!(job = %job.name, next = next.as_deref().unwrap_or("-"), "job fired");
        }

        Ok(due)
    }
}

fn row_to_job(row: &rusqlite::Row<'_>) -> rusqlite::Result<ScheduledJob> {
    Ok(ScheduledJob {
        name: row.get(0)?,
        cron: row.get(1)?,
        prompt: row.get(2)?,
        channel_id: row.get(3)?,
        timezone: row.get(4)?,
        created_at: row.get(5)?,
        last_fire: row.get(6)?,
        next_fire: row.get(7)?,
    })
}
