use anyhow::Result;
use clap::Parser;
use console::style;

use startmeup_runtime::Container;

/// Run the background job worker.
#[derive(Parser)]
pub struct WorkerCommand {
    /// Configuration file path.
    #[arg(short, long, default_value = "startmeup.toml")]
    pub config: String,
}

impl WorkerCommand {
    pub async fn execute(self) -> Result<()> {
        let config = super::load_config(&self.config)?;
        let mut container = Container::new(config).await?;

        crate::tasks::register(&mut container.worker);

        tracing::info!("Starting task worker");
        container.worker.start();
        println!(
            "  {} Worker running on queue {}, press Ctrl-C to stop",
            style("✓").green(),
            style(container.tasks.queue()).cyan()
        );

        super::shutdown_signal().await;

        tracing::info!("Shutting down worker");
        container.shutdown().await;
        Ok(())
    }
}
