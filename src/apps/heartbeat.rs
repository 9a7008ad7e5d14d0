use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::info;

use crate::application::{Application, JobContext, Status};
use crate::scheduler::Recurrence;

/// Proves the runner is alive: each run records the uptime and succeeds.
pub struct Heartbeat {
    started: DateTime<Utc>,
    recurrence: Recurrence,
}

impl Heartbeat {
    pub fn new(recurrence: Recurrence) -> Self {
        Self {
            started: Utc::now(),
            recurrence,
        }
    }
}

#[async_trait]
impl Application for Heartbeat {
    async fn job(&self, ctx: &JobContext) -> anyhow::Result<()> {
        let uptime = Utc::now() - self.started;
        let message = format!("alive for {}s (run {})", uptime.num_seconds(), ctx.run_id());
        info!(app = %ctx.name(), %message, "Heartbeat");
        ctx.set_message(message);
        ctx.set_status(Status::Success)?;
        Ok(())
    }

    async fn shutdown(&self) {
        info!(uptime_s = (Utc::now() - self.started).num_seconds(), "Heartbeat stopped");
    }

    fn recurrence(&self) -> Recurrence {
        self.recurrence.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ApiTable;
    use crate::application::AppHandle;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_heartbeat_succeeds() {
        let app = AppHandle::new(
            "Heartbeat",
            Box::new(Heartbeat::new(Recurrence::daily())),
            Arc::new(ApiTable::default()),
        );
        app.run().await.unwrap();

        let record = app.health();
        assert_eq!(record.last_execution, Status::Success);
        assert!(record.message.starts_with("alive for"));
        assert!(record.message.ends_with("(run 1)"));
    }
}
