use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{mpsc, watch};
use tracing::{error, info};

use vo_channels::Event;

use crate::store::JobStore;
use crate::types::job_event_type_name;

/// Drives job execution at one-second precision.
///
/// The engine's only action on fire is to enqueue a `ScheduledEvent` onto
/// the router queue; everything downstream (handler lookup, channel
/// resolution, the agent turn) is the router's business.
pub struct SchedulerEngine {
    store: Arc<JobStore>,
    queue: mpsc::UnboundedSender<Event>,
}

impl SchedulerEngine {
    pub fn new(store: Arc<JobStore>, queue: mpsc::UnboundedSender<Event>) -> Self {
        Self { store, queue }
    }

    /// Main loop. Polls every second until `shutdown` broadcasts `true`.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!("scheduler engine started");

        // Missed ticks are not replayed: everything restarts from now.
        if let Err(e) = self.store.recompute_next_fires(Utc::now()) {
            error!("scheduler startup recompute failed: {e}");
        }

        let mut interval = tokio::time::interval(std::time::Duration::from_secs(1));
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.tick();
                }
                changed = shutdown.changed() => {
                    // A dropped sender also means shutdown.
                    if changed.is_err() || *shutdown.borrow() {
                        info!("scheduler engine shutting down");
                        break;
                    }
                }
            }
        }
    }

    fn tick(&self) {
        let fired = match self.store.fire_due(Utc::now()) {
            Ok(fired) => fired,
            Err(e) => {
                error!("scheduler tick error: {e}");
                return;
            }
        };

        for job in fired {
            let event = Event::scheduled(job_event_type_name(&job.name));
            if self.queue.send(event).is_err() {
                // Router gone; the process is shutting down.
                error!(job = %job.name, "event queue closed, dropping fired job");
            }
        }
    }
}
