use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::Mutex;
use tracing::{debug, error, info_span, Instrument};

use super::{Application, HealthCell, HealthRecord, JobContext, Status};
use crate::api::{Api, ApiTable};
use crate::error::CoreError;
use crate::scheduler::Recurrence;

/// A loaded application together with its health record and execution lock.
///
/// Built by the [`Registry`](crate::registry::Registry); lives until the runner shuts down.
pub struct AppHandle {
    name: Arc<str>,
    app: Box<dyn Application>,
    health: Arc<HealthCell>,
    exec: Mutex<()>,
    apis: Arc<ApiTable>,
    debug: AtomicBool,
    recurrence: Recurrence,
}

impl AppHandle {
    pub fn new(name: impl Into<Arc<str>>, app: Box<dyn Application>, apis: Arc<ApiTable>) -> Self {
        let debug = AtomicBool::new(app.debug());
        let recurrence = app.recurrence();
        Self {
            name: name.into(),
            app,
            health: Arc::new(HealthCell::default()),
            exec: Mutex::new(()),
            apis,
            debug,
            recurrence,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn recurrence(&self) -> &Recurrence {
        &self.recurrence
    }

    pub fn debug(&self) -> bool {
        self.debug.load(Ordering::Relaxed)
    }

    pub fn set_debug(&self, debug: bool) {
        self.debug.store(debug, Ordering::Relaxed);
    }

    /// Current record, without waiting for an in-progress run.
    pub fn health(&self) -> HealthRecord {
        self.health.snapshot()
    }

    pub fn status(&self) -> Status {
        self.health.snapshot().status
    }

    /// Record as of the last completed run; waits while a run is in progress.
    pub async fn settled_health(&self) -> HealthRecord {
        let _guard = self.exec.lock().await;
        self.health.snapshot()
    }

    /// Fails with [`CoreError::InvalidStatus`] for [`Status::Never`].
    pub fn set_status(&self, status: Status) -> Result<(), CoreError> {
        self.health.set_status(status)
    }

    pub fn api(&self, name: &str) -> Result<Arc<dyn Api>, CoreError> {
        self.apis.get(name)
    }

    /// Whether a run currently holds the execution lock.
    pub fn is_busy(&self) -> bool {
        self.exec.try_lock().is_err()
    }

    /// Runs the job once, waiting for any in-progress run of this application first.
    ///
    /// Job failures (errors and panics) leave the record in `Error` and are contained,
    /// unless the debug flag is set; then [`CoreError::Execution`] is returned once the
    /// record is final.
    pub async fn run(&self) -> Result<(), CoreError> {
        let _guard = self.exec.lock().await;
        self.execute().await
    }

    /// Like [`run`](Self::run), but returns `None` without running if a run is in progress.
    pub async fn try_run(&self) -> Option<Result<(), CoreError>> {
        let _guard = self.exec.try_lock().ok()?;
        Some(self.execute().await)
    }

    pub async fn shutdown(&self) {
        debug!(app = %self.name, "Shutting down application");
        self.app.shutdown().await;
    }

    async fn execute(&self) -> Result<(), CoreError> {
        let run_id = self.health.begin();
        let ctx = JobContext::new(
            Arc::clone(&self.name),
            run_id,
            Arc::clone(&self.health),
            Arc::clone(&self.apis),
        );
        let span = info_span!("app", name = %self.name, run_id);

        let outcome = AssertUnwindSafe(self.app.job(&ctx).instrument(span))
            .catch_unwind()
            .await;

        let failure = match outcome {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(e.to_string()),
            Err(payload) => Some(panic_message(payload.as_ref())),
        };

        let result = match failure {
            None => Ok(()),
            Some(message) => {
                error!(app = %self.name, run_id, error = %message, "An error occurred while running the application");
                self.health.fail(message.clone());
                if self.debug() {
                    Err(CoreError::Execution {
                        name: self.name.to_string(),
                        message,
                    })
                } else {
                    Ok(())
                }
            }
        };

        let record = self.health.finish();
        debug!(app = %self.name, run_id, last_execution = %record.last_execution, "Run finished");
        result
    }
}

impl std::fmt::Debug for AppHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppHandle")
            .field("name", &self.name)
            .field("recurrence", &self.recurrence)
            .field("health", &self.health.snapshot())
            .finish()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "job panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    struct Sleeper {
        sleep: Duration,
        active: Arc<AtomicUsize>,
        peak: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Application for Sleeper {
        async fn job(&self, ctx: &JobContext) -> anyhow::Result<()> {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(self.sleep).await;
            self.active.fetch_sub(1, Ordering::SeqCst);
            ctx.set_status(Status::Success)?;
            Ok(())
        }
    }

    struct Boom;

    #[async_trait]
    impl Application for Boom {
        async fn job(&self, _ctx: &JobContext) -> anyhow::Result<()> {
            anyhow::bail!("boom")
        }
    }

    struct Panics;

    #[async_trait]
    impl Application for Panics {
        async fn job(&self, _ctx: &JobContext) -> anyhow::Result<()> {
            panic!("kaboom")
        }
    }

    /// Returns without declaring success.
    struct Silent;

    #[async_trait]
    impl Application for Silent {
        async fn job(&self, _ctx: &JobContext) -> anyhow::Result<()> {
            Ok(())
        }
    }

    fn handle(app: impl Application) -> Arc<AppHandle> {
        Arc::new(AppHandle::new(
            "Test",
            Box::new(app),
            Arc::new(ApiTable::default()),
        ))
    }

    fn sleeper(ms: u64) -> (Arc<AppHandle>, Arc<AtomicUsize>) {
        let peak = Arc::new(AtomicUsize::new(0));
        let app = Sleeper {
            sleep: Duration::from_millis(ms),
            active: Arc::new(AtomicUsize::new(0)),
            peak: Arc::clone(&peak),
        };
        (handle(app), peak)
    }

    #[tokio::test]
    async fn test_success_lifecycle() {
        let (app, _) = sleeper(200);
        assert_eq!(app.status(), Status::Waiting);
        assert_eq!(app.health().last_execution, Status::Never);

        let runner = Arc::clone(&app);
        let task = tokio::spawn(async move { runner.run().await });

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(app.status(), Status::Running);
        assert!(app.is_busy());

        task.await.unwrap().unwrap();
        let record = app.health();
        assert_eq!(record.status, Status::Waiting);
        assert_eq!(record.last_execution, Status::Success);
        assert_eq!(record.run_id, 1);
    }

    #[tokio::test]
    async fn test_failure_is_contained_without_debug() {
        let app = handle(Boom);
        app.run().await.unwrap();

        let record = app.health();
        assert_eq!(record.status, Status::Waiting);
        assert_eq!(record.last_execution, Status::Error);
        assert_eq!(record.message, "boom");
    }

    #[tokio::test]
    async fn test_failure_propagates_with_debug() {
        let app = handle(Boom);
        app.set_debug(true);

        let err = app.run().await.unwrap_err();
        assert!(matches!(err, CoreError::Execution { ref message, .. } if message == "boom"));

        let record = app.health();
        assert_eq!(record.status, Status::Waiting);
        assert_eq!(record.last_execution, Status::Error);
        assert_eq!(record.message, "boom");
    }

    #[tokio::test]
    async fn test_panic_is_recorded_as_error() {
        let app = handle(Panics);
        app.run().await.unwrap();

        let record = app.health();
        assert_eq!(record.last_execution, Status::Error);
        assert_eq!(record.message, "kaboom");
        assert!(!app.is_busy());
    }

    #[tokio::test]
    async fn test_missing_success_declaration_keeps_running_as_last_execution() {
        let app = handle(Silent);
        app.run().await.unwrap();

        let record = app.health();
        assert_eq!(record.status, Status::Waiting);
        assert_eq!(record.last_execution, Status::Running);
    }

    #[tokio::test]
    async fn test_overlapping_runs_are_serialized() {
        let (app, peak) = sleeper(100);

        let started = std::time::Instant::now();
        let (a, b) = tokio::join!(app.run(), app.run());
        a.unwrap();
        b.unwrap();

        assert_eq!(peak.load(Ordering::SeqCst), 1);
        assert!(started.elapsed() >= Duration::from_millis(200));
        assert_eq!(app.health().run_id, 2);
    }

    #[tokio::test]
    async fn test_try_run_skips_while_busy() {
        let (app, _) = sleeper(150);

        let runner = Arc::clone(&app);
        let task = tokio::spawn(async move { runner.run().await });
        tokio::time::sleep(Duration::from_millis(30)).await;

        assert!(app.try_run().await.is_none());
        task.await.unwrap().unwrap();
        assert!(app.try_run().await.is_some());
        assert_eq!(app.health().run_id, 2);
    }

    #[tokio::test]
    async fn test_settled_health_waits_for_run() {
        let (app, _) = sleeper(100);

        let runner = Arc::clone(&app);
        let task = tokio::spawn(async move { runner.run().await });
        tokio::time::sleep(Duration::from_millis(20)).await;

        let settled = app.settled_health().await;
        assert_eq!(settled.status, Status::Waiting);
        assert_eq!(settled.last_execution, Status::Success);
        task.await.unwrap().unwrap();
    }

    #[test]
    fn test_status_setter_rejects_never() {
        let app = handle(Silent);
        assert!(matches!(
            app.set_status(Status::Never),
            Err(CoreError::InvalidStatus(_))
        ));
        assert_eq!(app.status(), Status::Waiting);
    }

    #[test]
    fn test_unknown_api() {
        let app = handle(Silent);
        assert!(matches!(app.api("Weather"), Err(CoreError::ApiNotFound(n)) if n == "Weather"));
    }
}
