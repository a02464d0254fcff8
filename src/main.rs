use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use matchday::api::state::AppState;
use matchday::config::AppConfig;
use matchday::parse_duration;
use matchday::service::{LockSettings, MatchService};
use matchday::store::{JsonlDirectory, MatchStore, StorageConfig};

#[derive(Parser)]
#[command(name = "matchday")]
#[command(about = "Sports association match lifecycle and roster management service")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(long, default_value = "./config.toml")]
    config: String,

    /// Data directory path (overrides the config file)
    #[arg(long)]
    data_dir: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    /// Output logs as JSON
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the API server
    Serve {
        /// Bind address (overrides the config file)
        #[arg(long)]
        host: Option<String>,

        /// Port number (overrides the config file)
        #[arg(long)]
        port: Option<u16>,
    },

    /// Recompute denormalized match counters from the registration rows
    RepairCounters,

    /// Send 24-hour reminders for upcoming matches
    Remind {
        /// Run one pass and exit
        #[arg(long)]
        once: bool,

        /// Interval between passes (e.g., "1h", "30m")
        #[arg(long, default_value = "1h")]
        interval: String,
    },
}

fn build_service(config: &AppConfig) -> Result<Arc<MatchService>> {
    let storage = StorageConfig::new(config.data_dir.clone());
    let store = Arc::new(MatchStore::open(storage.clone())?);
    let directory = Arc::new(JsonlDirectory::open(storage)?);
    let locking = LockSettings {
        timeout: Duration::from_millis(config.locking.timeout_ms),
        retries: config.locking.retries,
    };
    Ok(Arc::new(MatchService::new(
        store,
        directory.clone(),
        directory.clone(),
        directory.clone(),
        directory,
        locking,
    )))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = if std::path::Path::new(&cli.config).exists() {
        AppConfig::from_file(&PathBuf::from(&cli.config))?
    } else {
        AppConfig::default()
    };
    if let Some(data_dir) = &cli.data_dir {
        config.data_dir = PathBuf::from(data_dir);
    }
    if let Some(level) = &cli.log_level {
        config.log_level = level.clone();
    }

    // Initialize tracing
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level));

    if cli.json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    tracing::info!("Starting matchday v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Serve { host, port } => {
            let service = build_service(&config)?;
            let app = matchday::api::build_router(AppState { service });

            let host = host.unwrap_or_else(|| config.server.host.clone());
            let port = port.unwrap_or(config.server.port);
            let addr = format!("{}:{}", host, port);
            let listener = tokio::net::TcpListener::bind(&addr).await?;
            tracing::info!("Listening on http://{}", addr);
            axum::serve(listener, app).await?;
        }

        Commands::RepairCounters => {
            let service = build_service(&config)?;
            let report = service.repair_counters().await?;
            println!(
                "Checked {} matches, repaired {}",
                report.checked, report.repaired
            );
        }

        Commands::Remind { once, interval } => {
            let service = build_service(&config)?;
            let Some(interval) = parse_duration(&interval) else {
                anyhow::bail!("Invalid --interval (expected e.g. \"1h\", \"30m\"): {}", interval);
            };

            loop {
                let reminded = service.remind_upcoming(chrono::Utc::now()).await?;
                tracing::info!("Reminder pass complete, {} matches reminded", reminded);
                if once {
                    break;
                }
                tokio::time::sleep(interval).await;
            }
        }
    }

    Ok(())
}
