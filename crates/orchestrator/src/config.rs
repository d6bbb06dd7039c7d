//! Pipeline configuration
//!
//! Loaded from YAML and validated eagerly, so a missing or inconsistent
//! option is reported before any stage runs.

use glyphcode_cell_extractor::ExtractionConfig;
use glyphcode_column_mapper::MapperConfig;
use glyphcode_common::{GlyphError, Result};
use glyphcode_reference_index::{HashSettings, DEFAULT_MAX_DISTANCE};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

fn default_min_cell_side() -> u32 {
    2
}

fn default_max_match_distance() -> u32 {
    DEFAULT_MAX_DISTANCE
}

/// Complete configuration of one pipeline run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineConfig {
    /// Base directory for every relative path below
    #[serde(default)]
    pub prefix: Option<PathBuf>,

    pub source_image_path: PathBuf,
    pub scan_y_start: u32,
    pub scan_y_end: u32,
    /// Binarization cutoff (0-255)
    pub threshold: u8,
    pub output_glyph_path: PathBuf,
    pub debug_overlay_path: PathBuf,
    pub reference_metadata_path: PathBuf,
    pub reference_image_directory: PathBuf,

    #[serde(default)]
    pub invert: bool,
    #[serde(default = "default_min_cell_side")]
    pub min_cell_side: u32,
    /// Largest accepted Hamming distance for a match
    #[serde(default = "default_max_match_distance")]
    pub max_match_distance: u32,
    /// Fixed column gap in pixels; derived from the cells when absent
    #[serde(default)]
    pub column_gap: Option<f32>,
    /// Concurrent cell matches; defaults to the CPU count
    #[serde(default)]
    pub max_workers: Option<usize>,
    #[serde(default)]
    pub hash: HashSettings,
}

impl PipelineConfig {
    /// Read, parse and validate a YAML configuration file
    pub fn load(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(GlyphError::Config(format!(
                "configuration file {} not found",
                path.display()
            )));
        }
        let contents = std::fs::read_to_string(path).map_err(|e| {
            GlyphError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        let config = Self::from_yaml_str(&contents)?;
        info!("Using configuration {}", path.display());
        Ok(config)
    }

    /// Parse and validate YAML text
    pub fn from_yaml_str(contents: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(contents)
            .map_err(|e| GlyphError::Config(format!("invalid configuration: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let required = [
            ("source_image_path", &self.source_image_path),
            ("output_glyph_path", &self.output_glyph_path),
            ("debug_overlay_path", &self.debug_overlay_path),
            ("reference_metadata_path", &self.reference_metadata_path),
            ("reference_image_directory", &self.reference_image_directory),
        ];
        for (key, value) in required {
            if value.as_os_str().is_empty() {
                return Err(GlyphError::Config(format!("{key} must not be empty")));
            }
        }

        if self.scan_y_start > self.scan_y_end {
            return Err(GlyphError::Config(format!(
                "scan_y_start ({}) is after scan_y_end ({})",
                self.scan_y_start, self.scan_y_end
            )));
        }
        if self.hash.size < 2 {
            return Err(GlyphError::Config(format!(
                "hash.size must be at least 2, got {}",
                self.hash.size
            )));
        }
        if self.max_workers == Some(0) {
            return Err(GlyphError::Config("max_workers must be at least 1".to_string()));
        }
        if let Some(gap) = self.column_gap {
            if !gap.is_finite() || gap <= 0.0 {
                return Err(GlyphError::Config(format!(
                    "column_gap must be a positive number, got {gap}"
                )));
            }
        }
        Ok(())
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        match &self.prefix {
            Some(prefix) if path.is_relative() => prefix.join(path),
            _ => path.to_path_buf(),
        }
    }

    #[must_use]
    pub fn source_image(&self) -> PathBuf {
        self.resolve(&self.source_image_path)
    }

    #[must_use]
    pub fn output_glyph(&self) -> PathBuf {
        self.resolve(&self.output_glyph_path)
    }

    #[must_use]
    pub fn debug_overlay(&self) -> PathBuf {
        self.resolve(&self.debug_overlay_path)
    }

    #[must_use]
    pub fn reference_metadata(&self) -> PathBuf {
        self.resolve(&self.reference_metadata_path)
    }

    #[must_use]
    pub fn reference_images(&self) -> PathBuf {
        self.resolve(&self.reference_image_directory)
    }

    #[must_use]
    pub fn extraction(&self) -> ExtractionConfig {
        ExtractionConfig {
            y_start: self.scan_y_start,
            y_end: self.scan_y_end,
            threshold: self.threshold,
            invert: self.invert,
            min_cell_side: self.min_cell_side,
        }
    }

    #[must_use]
    pub fn mapper(&self) -> MapperConfig {
        MapperConfig {
            column_gap: self.column_gap,
        }
    }

    #[must_use]
    pub fn workers(&self) -> usize {
        self.max_workers.unwrap_or_else(num_cpus::get).max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glyphcode_reference_index::HashAlgorithm;

    const MINIMAL: &str = "
source_image_path: scans/passcode.jpg
scan_y_start: 120
scan_y_end: 900
threshold: 200
output_glyph_path: out/glyph.png
debug_overlay_path: out/cells.png
reference_metadata_path: refs/portals.csv
reference_image_directory: refs/images
";

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = PipelineConfig::from_yaml_str(MINIMAL).unwrap();
        assert_eq!(config.threshold, 200);
        assert_eq!(config.max_match_distance, DEFAULT_MAX_DISTANCE);
        assert_eq!(config.min_cell_side, 2);
        assert!(!config.invert);
        assert!(config.column_gap.is_none());
        assert_eq!(config.hash, HashSettings::default());
        assert!(config.workers() >= 1);
        assert_eq!(config.source_image(), PathBuf::from("scans/passcode.jpg"));
    }

    #[test]
    fn test_prefix_applies_to_relative_paths() {
        let yaml = format!(
            "{MINIMAL}prefix: /data/run\nmax_workers: 3\nhash:\n  algorithm: mean\n  size: 16\n"
        );
        let config = PipelineConfig::from_yaml_str(&yaml).unwrap();
        assert_eq!(
            config.reference_images(),
            PathBuf::from("/data/run/refs/images")
        );
        assert_eq!(config.workers(), 3);
        assert_eq!(config.hash.algorithm, HashAlgorithm::Mean);
        assert_eq!(config.hash.size, 16);

        let absolute = yaml.replace("scans/passcode.jpg", "/scans/passcode.jpg");
        let config = PipelineConfig::from_yaml_str(&absolute).unwrap();
        assert_eq!(config.source_image(), PathBuf::from("/scans/passcode.jpg"));
    }

    #[test]
    fn test_missing_required_key_is_config_error() {
        let yaml = MINIMAL.replace("debug_overlay_path: out/cells.png\n", "");
        let err = PipelineConfig::from_yaml_str(&yaml).unwrap_err();
        match err {
            GlyphError::Config(msg) => assert!(msg.contains("debug_overlay_path"), "{msg}"),
            other => panic!("expected config error, got {other:?}"),
        }
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let cases = [
            MINIMAL.replace("threshold: 200", "threshold: 300"),
            MINIMAL.replace("scan_y_start: 120", "scan_y_start: 1000"),
            format!("{MINIMAL}max_workers: 0\n"),
            format!("{MINIMAL}column_gap: -4.0\n"),
            format!("{MINIMAL}hash:\n  size: 1\n"),
            format!("{MINIMAL}unexpected: true\n"),
            MINIMAL.replace("out/glyph.png", "''"),
        ];
        for yaml in cases {
            assert!(
                matches!(PipelineConfig::from_yaml_str(&yaml), Err(GlyphError::Config(_))),
                "accepted: {yaml}"
            );
        }
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = PipelineConfig::load(&dir.path().join("glyphcode.yaml")).unwrap_err();
        assert!(matches!(err, GlyphError::Config(_)));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("glyphcode.yaml");
        std::fs::write(&path, MINIMAL).unwrap();
        let config = PipelineConfig::load(&path).unwrap();
        assert_eq!(config.extraction().y_end, 900);
        assert_eq!(config.mapper().column_gap, None);
    }
}
