use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};

use wolf_core::config::WolfConfig;
use wolf_core::reporting::SqliteReporter;
use wolf_core::{apps, logging, Status};

#[derive(Parser)]
#[command(
    name = "wolf-core",
    about = "Process-resident job orchestrator with supervised health reporting",
    version,
    long_about = None
)]
struct Cli {
    /// Configuration file (defaults to $WOLF_CONFIG, then /etc/wolf/wolf.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the runner (scheduler + monitors)
    Run {
        /// Run every application once and exit
        #[arg(long)]
        debug: bool,
    },

    /// List registered applications and whether they pass validation
    List,

    /// Preview which applications will run in the next N hours
    Preview {
        /// Hours to preview
        #[arg(long, default_value = "24")]
        hours: u64,
    },

    /// Show recent run events from the reporting database
    History {
        /// Number of events to show
        #[arg(long, default_value = "20")]
        limit: usize,

        /// JSON output for machine parsing
        #[arg(long)]
        json: bool,
    },
}

fn load_config(path: Option<&PathBuf>) -> Result<WolfConfig> {
    match path {
        Some(path) => WolfConfig::load(path),
        None => Ok(WolfConfig::load_or_default()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = load_config(cli.config.as_ref())?;

    match cli.command {
        Commands::Run { debug } => {
            config.debug |= debug;
            logging::init(&config.logging);
            let ok = wolf_core::serve(config).await?;
            if !ok {
                anyhow::bail!("runner did not finish cleanly");
            }
        }
        Commands::List => {
            let registry = apps::builtin(&config)?;
            if registry.is_empty() {
                println!("No applications registered.");
            } else {
                let loaded = registry.load(Arc::new(apps::apis(&config)?.build()));
                println!("{:<20} | {:<8} | Details", "Application", "Status");
                println!("{:-<20}-|-{:-<8}-|-{:-<40}", "", "", "");
                for (reg, verdict) in registry.verdicts() {
                    match verdict {
                        Ok(()) => {
                            let recurrence = loaded
                                .iter()
                                .find(|app| app.name() == reg.name())
                                .map(|app| app.recurrence().to_string())
                                .unwrap_or_default();
                            println!("{:<20} | {:<8} | {}", reg.name(), "OK", recurrence);
                        }
                        Err(e) => println!("{:<20} | {:<8} | {}", reg.name(), "REJECTED", e),
                    }
                }
            }
        }
        Commands::Preview { hours } => {
            let registry = apps::builtin(&config)?;
            let apis = Arc::new(apps::apis(&config)?.build());
            let mut scheduler = wolf_core::scheduler::Scheduler::new();
            for app in registry.load(apis) {
                scheduler.register(app);
            }

            let preview = scheduler.preview(chrono::Utc::now(), hours)?;
            if preview.is_empty() {
                println!("No runs scheduled in next {} hours.", hours);
            } else {
                println!("Upcoming runs (next {} hours):", hours);
                for (time, name) in preview {
                    println!("{} : {}", time.to_rfc3339(), name);
                }
            }
        }
        Commands::History { limit, json } => {
            let reporter = SqliteReporter::open(&config.reporter.database)?;
            let events = reporter.recent(limit)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&events)?);
            } else if events.is_empty() {
                println!("No run events recorded.");
            } else {
                println!("{:<25} | {:<20} | {:<8} | Message", "Time", "Application", "Status");
                println!("{:-<25}-|-{:-<20}-|-{:-<8}-|-{:-<30}", "", "", "", "");
                for ev in events {
                    let status = Status::try_from(ev.status)
                        .map(|s| s.to_string())
                        .unwrap_or_else(|_| ev.status.to_string());
                    println!(
                        "{:<25} | {:<20} | {:<8} | {}",
                        ev.time.format("%Y-%m-%d %H:%M:%S"),
                        ev.job,
                        status,
                        ev.message
                    );
                }
            }
        }
    }

    Ok(())
}
