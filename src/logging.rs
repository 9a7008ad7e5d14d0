//! Tracing subscriber setup: console output plus an optional per-run log file.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use tracing::{error, info};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter, Layer, Registry};

use crate::config::LoggingConfig;

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Install the global subscriber.
///
/// A log file that cannot be created is reported once the console logger is up;
/// logging then continues on the console only. Returns the log file path in use.
pub fn init(config: &LoggingConfig) -> Option<PathBuf> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.level));

    let console: BoxedLayer = if config.json {
        fmt::layer().json().with_filter(env_filter).boxed()
    } else {
        fmt::layer().with_filter(env_filter).boxed()
    };
    let mut layers = vec![console];

    let mut file_error = None;
    let mut file_path = None;
    if config.file {
        let opened = config
            .log_directory()
            .context("no log directory configured and HOME is unset")
            .and_then(|dir| open_log_file(&dir));
        match opened {
            Ok((path, file)) => {
                let level = config.file_level.parse::<LevelFilter>().unwrap_or(LevelFilter::WARN);
                layers.push(
                    fmt::layer()
                        .with_ansi(false)
                        .with_writer(Mutex::new(file))
                        .with_filter(level)
                        .boxed(),
                );
                file_path = Some(path);
            }
            Err(e) => file_error = Some(e),
        }
    }

    // Already installed (e.g. by a test harness): keep the existing one.
    if tracing_subscriber::registry().with(layers).try_init().is_err() {
        return None;
    }

    if let Some(e) = file_error {
        error!(error = %format!("{:#}", e), "Could not create log file. Please check permissions.");
    }
    if let Some(path) = &file_path {
        info!(path = %path.display(), "Logging to file");
    }
    file_path
}

/// Create `wolf_core_<timestamp>.log` inside `dir`.
fn open_log_file(dir: &Path) -> Result<(PathBuf, File)> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create log directory {}", dir.display()))?;
    let name = format!("wolf_core_{}.log", chrono::Local::now().format("%Y-%m-%d_%H-%M-%S"));
    let path = dir.join(name);
    let file = File::create(&path)
        .with_context(|| format!("failed to create log file {}", path.display()))?;
    Ok((path, file))
}
