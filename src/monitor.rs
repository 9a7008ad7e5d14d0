//! Per-application health monitor.
//!
//! A [`Monitor`] polls its application's health record and reports every
//! completed run to the [`Reporter`] exactly once. Completion is detected by a
//! change of `run_id`; the record is read through the execution lock so a run
//! in progress is never observed half-way.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::application::{AppHandle, HealthRecord, Status};
use crate::reporting::Reporter;

pub struct Monitor {
    app: Arc<AppHandle>,
    reporter: Arc<dyn Reporter>,
    interval: Duration,
    last_run_id: u64,
}

impl Monitor {
    pub fn new(app: Arc<AppHandle>, reporter: Arc<dyn Reporter>, interval: Duration) -> Self {
        Self {
            app,
            reporter,
            interval,
            last_run_id: 0,
        }
    }

    pub fn last_run_id(&self) -> u64 {
        self.last_run_id
    }

    /// Take one look at the record.
    ///
    /// Returns the record when a run completed since the previous observation.
    pub async fn observe(&mut self) -> Option<HealthRecord> {
        let record = self.app.settled_health().await;
        if record.run_id == self.last_run_id {
            return None;
        }
        self.last_run_id = record.run_id;

        let name = self.app.name();
        match record.last_execution {
            Status::Error => error!(app = %name, message = %record.message, "Application failed"),
            Status::Success => warn!(app = %name, "Application succeeded"),
            other => debug!(app = %name, last_execution = %other, "Run ended without a terminal status"),
        }

        if record.last_execution.is_terminal() {
            if let Err(e) = self
                .reporter
                .post(name, record.last_execution.code(), &record.message)
                .await
            {
                error!(app = %name, error = %e, "Failed to report run");
            }
        }

        Some(record)
    }

    /// Poll until `token` is cancelled, then make one last observation.
    pub async fn run(mut self, token: CancellationToken) {
        debug!(app = %self.app.name(), interval_ms = self.interval.as_millis() as u64, "Monitor started");
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {
                    self.observe().await;
                }
            }
        }
        self.observe().await;
        debug!(app = %self.app.name(), "Monitor stopped");
    }
}
