//! TOML configuration for the runner.
//!
//! Every section has defaults, so an empty file (or no file at all) is a valid
//! configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::scheduler::Recurrence;

/// Environment variable naming the config file.
pub const CONFIG_ENV: &str = "WOLF_CONFIG";

const SYSTEM_CONFIG: &str = "/etc/wolf/wolf.toml";

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WolfConfig {
    /// Run every application once and exit instead of scheduling them.
    pub debug: bool,
    /// Resolution of the scheduler loop.
    pub tick_interval_ms: u64,
    /// How often monitors poll health records outside debug mode.
    pub monitor_interval_ms: u64,
    pub logging: LoggingConfig,
    pub reporter: ReporterConfig,
    pub heartbeat: HeartbeatConfig,
    pub apis: Vec<ApiConfig>,
}

impl Default for WolfConfig {
    fn default() -> Self {
        Self {
            debug: false,
            tick_interval_ms: 500,
            monitor_interval_ms: 5_000,
            logging: LoggingConfig::default(),
            reporter: ReporterConfig::default(),
            heartbeat: HeartbeatConfig::default(),
            apis: Vec::new(),
        }
    }
}

impl WolfConfig {
    /// Load configuration from a TOML file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("failed to parse config file: {}", path.display()))?;
        info!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// Load the first usable file among `$WOLF_CONFIG` and `/etc/wolf/wolf.toml`,
    /// falling back to compiled-in defaults.
    pub fn load_or_default() -> Self {
        let env_path = std::env::var_os(CONFIG_ENV).map(PathBuf::from);
        Self::load_first(env_path.into_iter().chain([PathBuf::from(SYSTEM_CONFIG)]))
    }

    /// Missing candidates are skipped quietly; unreadable ones are skipped with a warning.
    fn load_first(candidates: impl IntoIterator<Item = PathBuf>) -> Self {
        for path in candidates {
            if !path.exists() {
                debug!(path = %path.display(), "config candidate not found");
                continue;
            }
            match Self::load(&path) {
                Ok(cfg) => return cfg,
                Err(e) => warn!(path = %path.display(), error = %format!("{:#}", e), "ignoring config file"),
            }
        }

        debug!("no usable config file, using compiled-in defaults");
        Self::default()
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }

    /// Monitors poll much faster in debug mode.
    pub fn monitor_interval(&self) -> Duration {
        if self.debug {
            Duration::from_millis(100)
        } else {
            Duration::from_millis(self.monitor_interval_ms.max(1))
        }
    }
}

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Console filter when `RUST_LOG` is unset.
    pub level: String,
    /// Emit console logs as JSON lines.
    pub json: bool,
    /// Write a log file per process start.
    pub file: bool,
    /// Directory for log files. Defaults to `~/.cache/wolf/log`.
    pub directory: Option<PathBuf>,
    /// Minimum level written to the log file.
    pub file_level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "debug".to_string(),
            json: false,
            file: true,
            directory: None,
            file_level: "warn".to_string(),
        }
    }
}

impl LoggingConfig {
    pub fn log_directory(&self) -> Option<PathBuf> {
        self.directory.clone().or_else(|| {
            std::env::var_os("HOME")
                .map(|home| PathBuf::from(home).join(".cache").join("wolf").join("log"))
        })
    }
}

// ---------------------------------------------------------------------------
// Reporting
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReporterConfig {
    pub enabled: bool,
    /// SQLite database receiving run events.
    pub database: PathBuf,
}

impl Default for ReporterConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            database: PathBuf::from("data/wolf.db"),
        }
    }
}

// ---------------------------------------------------------------------------
// Built-in heartbeat application
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HeartbeatConfig {
    pub enabled: bool,
    /// Fixed interval between heartbeats.
    pub interval_secs: u64,
    /// Cron expression (with seconds field); takes precedence over `interval_secs`.
    pub cron: Option<String>,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 24 * 60 * 60,
            cron: None,
        }
    }
}

impl HeartbeatConfig {
    pub fn recurrence(&self) -> Result<Recurrence> {
        match &self.cron {
            Some(expr) => Ok(Recurrence::cron(expr)?),
            None => Ok(Recurrence::every(Duration::from_secs(self.interval_secs.max(1)))),
        }
    }
}

// ---------------------------------------------------------------------------
// Bound APIs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Lookup name used by `ctx.api(..)`.
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub test_url: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
    /// Use `test_url` instead of `url`.
    #[serde(default)]
    pub test: bool,
    #[serde(default = "default_api_timeout")]
    pub timeout_secs: u64,
}

fn default_api_timeout() -> u64 {
    10
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_first_skips_missing_and_broken_files() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.toml");
        let broken = dir.path().join("broken.toml");
        let good = dir.path().join("good.toml");
        std::fs::write(&broken, "tick_interval_ms = \"soon\"").unwrap();
        std::fs::write(&good, "tick_interval_ms = 42").unwrap();

        let config = WolfConfig::load_first([missing.clone(), broken.clone(), good]);
        assert_eq!(config.tick_interval_ms, 42);

        let config = WolfConfig::load_first([missing, broken]);
        assert_eq!(config.tick_interval_ms, WolfConfig::default().tick_interval_ms);
    }

    #[test]
    fn test_empty_file_gives_defaults() {
        let config: WolfConfig = toml::from_str("").unwrap();
        assert!(!config.debug);
        assert_eq!(config.tick_interval(), Duration::from_millis(500));
        assert_eq!(config.monitor_interval(), Duration::from_secs(5));
        assert!(config.reporter.enabled);
        assert!(config.apis.is_empty());
        assert_eq!(config.logging.file_level, "warn");
    }

    #[test]
    fn test_parse_full_config() {
        let config: WolfConfig = toml::from_str(
            r#"
            debug = true
            tick_interval_ms = 250

            [reporter]
            enabled = false
            database = "/tmp/wolf-test.db"

            [heartbeat]
            cron = "0 */5 * * * *"

            [[apis]]
            name = "Tracker"
            url = "https://tracker.example.com"
            token = "abc"
            "#,
        )
        .unwrap();

        assert!(config.debug);
        assert_eq!(config.monitor_interval(), Duration::from_millis(100));
        assert_eq!(config.tick_interval(), Duration::from_millis(250));
        assert!(!config.reporter.enabled);
        assert_eq!(config.apis.len(), 1);
        assert_eq!(config.apis[0].timeout_secs, 10);
        assert!(!config.apis[0].test);
        assert!(matches!(
            config.heartbeat.recurrence().unwrap(),
            Recurrence::Cron { .. }
        ));
    }

    #[test]
    fn test_load_reports_path_on_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wolf.toml");
        std::fs::write(&path, "debug = \"maybe\"").unwrap();

        let err = WolfConfig::load(&path).unwrap_err();
        assert!(err.to_string().contains("wolf.toml"));
    }

    #[test]
    fn test_bad_heartbeat_cron() {
        let heartbeat = HeartbeatConfig {
            cron: Some("every tuesday".to_string()),
            ..HeartbeatConfig::default()
        };
        assert!(heartbeat.recurrence().is_err());
    }
}
