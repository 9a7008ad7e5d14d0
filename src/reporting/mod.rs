//! Reporting sink for completed runs.
//!
//! Monitors forward one event per completed run through [`Reporter::post`].
//! [`connect`] never fails: when the database cannot be opened the runner gets a
//! [`DisabledReporter`] and keeps going.

pub mod sqlite;

pub use self::sqlite::{RunEvent, SqliteReporter};

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info};

use crate::config::ReporterConfig;

/// Destination for completed-run events.
#[async_trait]
pub trait Reporter: Send + Sync + 'static {
    /// Record that `app` finished a run with `status` (a [`Status`](crate::application::Status) code).
    async fn post(&self, app: &str, status: i64, message: &str) -> anyhow::Result<()>;
}

/// Sink used when reporting is off or could not be set up. Drops every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledReporter;

#[async_trait]
impl Reporter for DisabledReporter {
    async fn post(&self, _app: &str, _status: i64, _message: &str) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Build the configured sink, falling back to [`DisabledReporter`] on failure.
pub fn connect(config: &ReporterConfig) -> Arc<dyn Reporter> {
    if !config.enabled {
        info!("Run reporting disabled by configuration");
        return Arc::new(DisabledReporter);
    }

    match SqliteReporter::open(&config.database) {
        Ok(reporter) => {
            info!(database = %config.database.display(), "Run reporting enabled");
            Arc::new(reporter)
        }
        Err(e) => {
            error!(database = %config.database.display(), error = %e, "Could not open reporting database, reporting disabled");
            Arc::new(DisabledReporter)
        }
    }
}
