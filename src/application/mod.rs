//! Applications: user-defined units of work and the sealed wrapper that runs them.
//!
//! Implementors provide [`Application::job`]. The runner never calls it directly;
//! it goes through [`AppHandle::run`], which owns locking, status transitions and
//! failure containment.

mod handle;
mod status;

pub use self::handle::AppHandle;
pub use self::status::{HealthRecord, Status};

pub(crate) use self::status::HealthCell;

use std::sync::Arc;

use async_trait::async_trait;

use crate::api::{Api, ApiTable};
use crate::error::CoreError;
use crate::scheduler::Recurrence;

/// A unit of work scheduled and supervised by the [`Runner`](crate::runner::Runner).
#[async_trait]
pub trait Application: Send + Sync + 'static {
    /// Performs the work of the application.
    ///
    /// On the success path the job must declare its outcome with
    /// `ctx.set_status(Status::Success)` before returning. Returning an error marks
    /// the run as failed.
    async fn job(&self, ctx: &JobContext) -> anyhow::Result<()>;

    /// Called once by the runner during teardown, after scheduling stopped.
    async fn shutdown(&self) {}

    /// How often the runner schedules the application.
    fn recurrence(&self) -> Recurrence {
        Recurrence::daily()
    }

    /// Propagate job failures out of `run()` instead of containing them.
    fn debug(&self) -> bool {
        false
    }
}

/// Handed to [`Application::job`] for the duration of one run.
pub struct JobContext {
    name: Arc<str>,
    run_id: u64,
    health: Arc<HealthCell>,
    apis: Arc<ApiTable>,
}

impl JobContext {
    pub(crate) fn new(name: Arc<str>, run_id: u64, health: Arc<HealthCell>, apis: Arc<ApiTable>) -> Self {
        Self {
            name,
            run_id,
            health,
            apis,
        }
    }

    /// Name the application was registered under.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn run_id(&self) -> u64 {
        self.run_id
    }

    pub fn status(&self) -> Status {
        self.health.snapshot().status
    }

    pub fn health(&self) -> HealthRecord {
        self.health.snapshot()
    }

    /// Fails with [`CoreError::InvalidStatus`] for [`Status::Never`].
    pub fn set_status(&self, status: Status) -> Result<(), CoreError> {
        self.health.set_status(status)
    }

    /// Parse and assign a status given by name, e.g. `"SUCCESS"`.
    pub fn set_status_str(&self, status: &str) -> Result<(), CoreError> {
        self.set_status(status.parse()?)
    }

    pub fn set_message(&self, message: impl Into<String>) {
        self.health.set_message(message.into());
    }

    /// Look up a bound API by name.
    pub fn api(&self, name: &str) -> Result<Arc<dyn Api>, CoreError> {
        self.apis.get(name)
    }
}
