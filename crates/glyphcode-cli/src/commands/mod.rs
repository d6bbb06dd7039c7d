pub mod solve;
pub mod split;

use anyhow::{Context as _, Result};
use glyphcode_orchestrator::{Pipeline, PipelineConfig};
use std::path::Path;

/// Load the configuration and prepare a pipeline
pub fn prepare(config_path: &Path) -> Result<Pipeline> {
    let config = PipelineConfig::load(config_path)
        .with_context(|| format!("Failed to load configuration {}", config_path.display()))?;
    Pipeline::new(config).context("Invalid configuration")
}
