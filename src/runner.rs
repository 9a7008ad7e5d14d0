//! The runner: loads applications, schedules them, supervises their health and
//! shuts everything down.
//!
//! ```text
//! run_until(interrupt)
//!   ├─ ApiRegistry::build()  ─► Arc<ApiTable>
//!   ├─ Registry::load()      ─► Vec<Arc<AppHandle>>
//!   ├─ spawn one Monitor per application (child of the runner's token)
//!   ├─ debug:    app.run() for each, in order ─► stop monitors ─► Ok(true)
//!   └─ periodic: Scheduler::register() for each
//!                run_scheduler_loop(tick) until interrupt
//!                shutdown() ─► Ok(true)
//!
//! shutdown()
//!   token.cancel() ─► scheduler.clear() ─► app.shutdown() for each ─► join monitors
//! ```

use std::future::Future;
use std::sync::Arc;

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::api::ApiRegistry;
use crate::application::AppHandle;
use crate::config::WolfConfig;
use crate::error::CoreError;
use crate::monitor::Monitor;
use crate::os_signals;
use crate::registry::{self, Method, Registration, Registry};
use crate::reporting::Reporter;
use crate::scheduler::{self, Scheduler};

pub struct Runner {
    config: WolfConfig,
    registry: Registry,
    apis: ApiRegistry,
    reporter: Arc<dyn Reporter>,
    applications: Vec<Arc<AppHandle>>,
    scheduler: Scheduler,
    monitors: JoinSet<()>,
    token: CancellationToken,
}

impl Runner {
    pub fn new(
        config: WolfConfig,
        registry: Registry,
        apis: ApiRegistry,
        reporter: Arc<dyn Reporter>,
    ) -> Self {
        Self {
            config,
            registry,
            apis,
            reporter,
            applications: Vec::new(),
            scheduler: Scheduler::new(),
            monitors: JoinSet::new(),
            token: CancellationToken::new(),
        }
    }

    /// Applications loaded by the last call to `run`; empty after shutdown.
    pub fn applications(&self) -> &[Arc<AppHandle>] {
        &self.applications
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Number of monitor tasks not yet joined.
    pub fn active_monitors(&self) -> usize {
        self.monitors.len()
    }

    pub fn is_method_overridden(registration: &Registration, method: Method) -> bool {
        registry::is_method_overridden(registration, method)
    }

    /// Run until the process receives a termination signal.
    pub async fn run(&mut self) -> Result<bool, CoreError> {
        self.run_until(async {
            if let Err(e) = os_signals::wait_for_shutdown_signal().await {
                error!(error = %e, "Could not listen for shutdown signals");
                std::future::pending::<()>().await;
            }
        })
        .await
    }

    /// Run until `interrupt` resolves (periodic mode) or after one pass (debug mode).
    ///
    /// Returns `Ok(true)` on a normal finish. The only error is a failure propagated
    /// by a debug-flagged application.
    pub async fn run_until<F>(&mut self, interrupt: F) -> Result<bool, CoreError>
    where
        F: Future<Output = ()>,
    {
        self.load();
        self.start_monitors();

        if self.config.debug {
            info!(count = self.applications.len(), "Debug mode: running every application once");
            let outcome = self.run_all_once().await;
            self.stop_monitors().await;
            return outcome.map(|()| true);
        }

        for app in &self.applications {
            self.scheduler.register(Arc::clone(app));
            info!(app = %app.name(), recurrence = %app.recurrence(), "Application scheduled");
        }

        let outcome = scheduler::run_scheduler_loop(
            &mut self.scheduler,
            self.config.tick_interval(),
            interrupt,
        )
        .await;

        self.shutdown().await;
        outcome.map(|()| true)
    }

    /// Stop monitoring and scheduling, call every application's shutdown hook and
    /// wait for the monitors to exit.
    pub async fn shutdown(&mut self) {
        info!("Shutting down runner");
        self.token.cancel();
        self.scheduler.clear();

        for app in self.applications.drain(..) {
            app.shutdown().await;
        }

        self.join_monitors().await;
        info!("Runner shut down");
    }

    fn load(&mut self) {
        if !self.applications.is_empty() {
            debug!("Deleting old applications");
            self.applications.clear();
        }
        self.scheduler.clear();
        self.token = CancellationToken::new();

        let apis = Arc::new(self.apis.build());
        self.applications = self.registry.load(apis);

        if self.applications.is_empty() {
            warn!("No valid application registered, nothing to run");
        }
    }

    fn start_monitors(&mut self) {
        let interval = self.config.monitor_interval();
        for app in &self.applications {
            let monitor = Monitor::new(Arc::clone(app), Arc::clone(&self.reporter), interval);
            self.monitors.spawn(monitor.run(self.token.child_token()));
        }
    }

    async fn run_all_once(&self) -> Result<(), CoreError> {
        for app in &self.applications {
            app.run().await?;
        }
        Ok(())
    }

    async fn stop_monitors(&mut self) {
        self.token.cancel();
        self.join_monitors().await;
    }

    async fn join_monitors(&mut self) {
        while let Some(res) = self.monitors.join_next().await {
            if let Err(e) = res {
                warn!(error = %e, "Monitor task ended abnormally");
            }
        }
    }
}
