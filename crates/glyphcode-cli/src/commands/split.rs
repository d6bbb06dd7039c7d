//! Split mode - cell detection only

use anyhow::{Context as _, Result};
use clap::Args;
use std::path::Path;
use std::time::Instant;
use tracing::info;

#[derive(Args)]
pub struct SplitCommand {}

impl SplitCommand {
    pub async fn execute(self, config_path: &Path) -> Result<()> {
        let start = Instant::now();
        let mut pipeline = super::prepare(config_path)?;

        info!("Detecting cells...");
        let rects = pipeline.split().await.context("Cell detection failed")?;

        info!(
            "Found {} cells, overlay saved to {}",
            rects.len(),
            pipeline.config().debug_overlay().display()
        );
        info!("Completed in {:.2} s", start.elapsed().as_secs_f64());
        Ok(())
    }
}
