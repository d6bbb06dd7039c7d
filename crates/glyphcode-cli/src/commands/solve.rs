//! Solve mode - full passcode reconstruction

use anyhow::{Context as _, Result};
use clap::Args;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, warn};

#[derive(Args)]
pub struct SolveCommand {
    /// Write a JSON report of every column's matches
    #[arg(long, value_name = "FILE")]
    report: Option<PathBuf>,
}

impl SolveCommand {
    pub async fn execute(self, config_path: &Path) -> Result<()> {
        let start = Instant::now();
        let mut pipeline = super::prepare(config_path)?;

        info!("Reconstructing passcode...");
        let report = pipeline.solve().await.context("Passcode reconstruction failed")?;

        if !report.is_complete() {
            let incomplete = report
                .columns
                .iter()
                .filter(|c| !c.unresolved_rows.is_empty())
                .count();
            warn!(
                "{} of {} columns are incomplete (underlined in the output)",
                incomplete,
                report.columns.len()
            );
        }

        if let Some(path) = &self.report {
            report
                .write_json(path)
                .with_context(|| format!("Failed to write report {}", path.display()))?;
            info!("Report saved to {}", path.display());
        }

        info!("Completed in {:.2} s", start.elapsed().as_secs_f64());
        Ok(())
    }
}
