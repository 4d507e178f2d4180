use std::path::{Path, PathBuf};
use std::process::Stdio;

use anyhow::{bail, Context, Result};
use startmeup_core::config::SchemaConfig;

/// Runs the external schema migration tool against a directory of migrations.
pub struct SchemaMigrator {
    tool: String,
    dir: PathBuf,
}

impl SchemaMigrator {
    /// Resolve the configured directory against the working directory.
    pub fn from_config(config: &SchemaConfig) -> Result<Self> {
        let dir = if config.migrations_dir.is_absolute() {
            config.migrations_dir.clone()
        } else {
            std::env::current_dir()
                .context("Error finding migration directory path")?
                .join(&config.migrations_dir)
        };

        Ok(Self {
            tool: config.tool.clone(),
            dir,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn tool(&self) -> &str {
        &self.tool
    }

    /// Run the tool, streaming its output to ours.
    pub async fn apply(&self, dsn: &str) -> Result<()> {
        if !self.dir.is_dir() {
            bail!(
                "Migration directory does not exist: {}\nGenerate the schema migrations first.",
                self.dir.display()
            );
        }

        tracing::debug!(tool = %self.tool, dir = %self.dir.display(), "Running schema migrations");

        let status = tokio::process::Command::new(&self.tool)
            .args(apply_args(&self.dir, dsn))
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .await
            .with_context(|| format!("Failed to start {}", self.tool))?;

        if !status.success() {
            bail!("Error running {} migrations: {}", self.tool, status);
        }
        Ok(())
    }
}

fn apply_args(dir: &Path, dsn: &str) -> Vec<String> {
    vec![
        "migrate".to_string(),
        "apply".to_string(),
        "--dir".to_string(),
        format!("file://{}", dir.display()),
        "--url".to_string(),
        dsn.to_string(),
    ]
}
