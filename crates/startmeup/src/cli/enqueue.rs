use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use console::style;

use startmeup_core::{ExampleTask, JobArgs};
use startmeup_runtime::Container;

/// Insert a job carrying a message.
#[derive(Parser)]
pub struct EnqueueCommand {
    /// Configuration file path.
    #[arg(short, long, default_value = "startmeup.toml")]
    pub config: String,

    /// Message stored in the job arguments.
    #[arg(short, long)]
    pub message: String,

    /// Seconds before the job becomes runnable.
    #[arg(short, long, default_value_t = 0)]
    pub delay: u64,

    /// Job kind.
    #[arg(short, long, default_value = ExampleTask::KIND)]
    pub kind: String,
}

impl EnqueueCommand {
    pub async fn execute(self) -> Result<()> {
        let config = super::load_config(&self.config)?;
        let container = Container::new(config).await?;

        let result = container
            .tasks
            .insert(&self.kind, &self.message, Duration::from_secs(self.delay))
            .await
            .context("unable to create a task");
        container.shutdown().await;

        let job = result?;
        tracing::debug!(id = %job.id, kind = %job.kind, "Job inserted");

        println!(
            "  {} {}",
            style("✓").green(),
            created_message(self.delay)
        );
        Ok(())
    }
}

fn created_message(delay: u64) -> String {
    format!(
        "The task has been created. Check the logs in {} seconds.",
        delay
    )
}
