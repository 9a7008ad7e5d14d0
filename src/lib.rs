//! wolf-core -- process-resident job orchestrator.
//!
//! Applications are registered explicitly, validated once at startup and then
//! either run once (debug mode) or scheduled periodically. Every application
//! carries a health record; a monitor per application reports each completed
//! run to the reporting sink exactly once.

pub mod api;
pub mod application;
pub mod apps;
pub mod config;
pub mod error;
pub mod logging;
pub mod monitor;
pub mod os_signals;
pub mod registry;
pub mod reporting;
pub mod runner;
pub mod scheduler;
pub mod storage;

pub use application::{AppHandle, Application, HealthRecord, JobContext, Status};
pub use error::CoreError;
pub use registry::{Method, Registration, Registry};
pub use runner::Runner;

use anyhow::Result;

/// Start the runner with the built-in applications and the configured sink.
///
/// Returns the runner's success indicator.
pub async fn serve(config: config::WolfConfig) -> Result<bool> {
    let registry = apps::builtin(&config)?;
    let apis = apps::apis(&config)?;
    let reporter = reporting::connect(&config.reporter);

    tracing::info!(
        debug = config.debug,
        applications = registry.len(),
        "Starting wolf-core runner"
    );
    let mut runner = Runner::new(config, registry, apis, reporter);
    Ok(runner.run().await?)
}
