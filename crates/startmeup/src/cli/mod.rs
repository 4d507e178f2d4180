mod enqueue;
mod migrate;
mod schema;
mod worker;

pub use enqueue::EnqueueCommand;
pub use migrate::MigrateCommand;
pub use worker::WorkerCommand;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use startmeup_core::config::AppConfig;

/// startmeup - migrations and background jobs
#[derive(Parser)]
#[command(name = "startmeup")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// CLI commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Apply schema and job-queue migrations.
    Migrate(MigrateCommand),

    /// Run the background job worker until interrupted.
    Worker(WorkerCommand),

    /// Insert an example job.
    Enqueue(EnqueueCommand),
}

impl Cli {
    /// Execute the CLI command.
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Migrate(cmd) => cmd.execute().await,
            Commands::Worker(cmd) => cmd.execute().await,
            Commands::Enqueue(cmd) => cmd.execute().await,
        }
    }
}

/// Load `.env`, the config file and environment overrides, then start logging.
fn load_config(path: &str) -> Result<AppConfig> {
    dotenvy::dotenv().ok();

    let config = AppConfig::load(path)
        .with_context(|| format!("Failed to load configuration from {}", path))?;
    crate::logging::init(config.app.environment);

    tracing::debug!(
        environment = %config.app.environment,
        "Configuration loaded"
    );
    Ok(config)
}

/// Resolves on Ctrl-C or, on unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
