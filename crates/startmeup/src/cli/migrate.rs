use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use console::style;
use tokio_util::sync::CancellationToken;

use startmeup_runtime::migrations::MigrationStatus;
use startmeup_runtime::{Container, MigrationLock};

use super::schema::SchemaMigrator;

/// Apply schema and job-queue migrations.
#[derive(Parser)]
pub struct MigrateCommand {
    /// Configuration file path.
    #[arg(short, long, default_value = "startmeup.toml")]
    pub config: String,

    /// Run the job-queue migrations.
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    pub river: bool,

    /// Re-apply every job-queue migration, including applied ones.
    #[arg(long)]
    pub force_river: bool,

    /// Run the schema migrations with the external tool.
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    pub schemas: bool,

    /// Show job-queue migration status and exit.
    #[arg(long)]
    pub status: bool,

    /// Do not take the migration advisory lock.
    #[arg(long)]
    pub no_lock: bool,
}

impl MigrateCommand {
    pub async fn execute(self) -> Result<()> {
        let config = super::load_config(&self.config)?;

        println!();
        println!(
            "  {}  {} Migrations",
            style("⚒️").bold(),
            style("STARTMEUP").bold().cyan()
        );
        println!();

        if self.schemas && !self.status {
            let migrator = SchemaMigrator::from_config(&config.schema)?;
            let dsn = config.connection_url()?.to_string();

            println!(
                "  {} Running schema migrations using {}...",
                style("→").dim(),
                migrator.tool()
            );
            migrator.apply(&dsn).await?;
            println!("  {} Schema migrations completed", style("✓").green());
        }

        if self.river || self.status {
            let container = Container::new(config).await?;
            let result = self.run_job_queue(&container).await;
            container.shutdown().await;
            result?;
        }

        if !self.status {
            println!();
            println!("  {} All migrations completed", style("✓").green());
            println!();
        }
        Ok(())
    }

    async fn run_job_queue(&self, container: &Container) -> Result<()> {
        let manager = container.job_queue_migrations()?;

        if self.status {
            print_status(&manager.status().await?);
            return Ok(());
        }

        println!("  {} Running job-queue migrations...", style("→").dim());

        let lock = if self.no_lock || !container.config.tasks.lock_migrations {
            None
        } else {
            Some(
                MigrationLock::acquire(
                    container.database.pool(),
                    &container.config.tasks.migrations_table,
                )
                .await?,
            )
        };

        let cancel = CancellationToken::new();
        let watcher = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                super::shutdown_signal().await;
                tracing::warn!("Interrupted, cancelling migrations");
                cancel.cancel();
            })
        };

        let result = if self.force_river {
            manager.apply_all(&cancel).await
        } else {
            manager.apply_pending(&cancel).await
        };
        watcher.abort();

        let released = match lock {
            Some(lock) => lock.release().await,
            None => Ok(()),
        };

        let applied = result.context("Error running job-queue migrations")?;
        released?;

        if applied.is_empty() {
            println!("  {} No pending job-queue migrations", style("ℹ").blue());
        } else {
            for name in &applied {
                println!("  {} Applied: {}", style("✓").green(), style(name).cyan());
            }
        }
        println!("  {} Job-queue migrations completed", style("✓").green());
        Ok(())
    }
}

fn print_status(status: &MigrationStatus) {
    if status.applied.is_empty() && status.pending.is_empty() {
        println!("  {} No migrations found", style("ℹ").blue());
        return;
    }

    if !status.applied.is_empty() {
        println!("  {} Applied:", style("✓").green());
        for record in &status.applied {
            println!(
                "    {} {} {}",
                style(&record.migration_name).cyan(),
                style("at").dim(),
                record.applied_at.format("%Y-%m-%d %H:%M:%S")
            );
        }
    }

    if !status.pending.is_empty() {
        if !status.applied.is_empty() {
            println!();
        }
        println!("  {} Pending:", style("○").yellow());
        for name in &status.pending {
            println!("    {} {}", style("→").dim(), style(name).yellow());
        }
    }

    println!();
    println!(
        "  {} {} applied, {} pending",
        style("ℹ").blue(),
        status.applied.len(),
        status.pending.len()
    );
    println!();
}
