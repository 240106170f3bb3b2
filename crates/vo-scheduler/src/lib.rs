//! Cron-driven synthetic events.
//!
//! A job is three coupled rows: the job itself, an event type named
//! `tempus_job:<name>`, and a handler subscribed to it. Firing a job only
//! enqueues a `ScheduledEvent`; the router and agent loop do the rest.

pub mod db;
pub mod engine;
pub mod error;
pub mod schedule;
pub mod store;
pub mod tools;
pub mod types;

pub use engine::SchedulerEngine;
pub use error::SchedulerError;
pub use store::JobStore;
pub use types::{job_event_type_name, ScheduledJob, TEMPUS_JOB_PREFIX};
