use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use super::Scheduler;
use crate::error::CoreError;

impl Scheduler {
    /// Run every due application once, in due order, on the calling task.
    ///
    /// An application that is still running from elsewhere is skipped with a warning.
    /// Each entry is rescheduled from the moment its run ends. A failure propagated
    /// by a debug-flagged application stops the pass and is returned.
    pub async fn run_pending(&mut self) -> Result<usize, CoreError> {
        self.run_pending_at(Utc::now()).await
    }

    pub async fn run_pending_at(&mut self, now: DateTime<Utc>) -> Result<usize, CoreError> {
        let mut ran = 0;

        for idx in self.due(now) {
            let app = self.entries[idx].app.clone();
            debug!(app = %app.name(), "Application due");

            let outcome = app.try_run().await;
            self.entries[idx].next_run = app.recurrence().next_after(Utc::now());

            match outcome {
                None => {
                    warn!(app = %app.name(), "Previous run still in progress, skipping this one");
                }
                Some(Ok(())) => ran += 1,
                Some(Err(e)) => {
                    error!(app = %app.name(), error = %e, "Run failed in debug mode");
                    return Err(e);
                }
            }
        }

        Ok(ran)
    }
}

/// Main scheduler execution loop.
///
/// Checks for due applications every `tick` until `interrupt` resolves.
pub async fn run_scheduler_loop<F>(
    scheduler: &mut Scheduler,
    tick: Duration,
    interrupt: F,
) -> Result<(), CoreError>
where
    F: Future<Output = ()>,
{
    info!(entries = scheduler.len(), tick_ms = tick.as_millis() as u64, "Scheduler engine started");

    let mut interval = tokio::time::interval(tick);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tokio::pin!(interrupt);

    loop {
        tokio::select! {
            _ = &mut interrupt => {
                info!("Interrupt received, leaving scheduler loop");
                return Ok(());
            }
            _ = interval.tick() => {
                scheduler.run_pending().await?;
            }
        }
    }
}
