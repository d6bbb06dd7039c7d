//! Glyphcode
//!
//! Reconstructs a passcode from a scanned sheet of glyph cells: cells are
//! located by contour analysis, grouped into columns, matched against a
//! reference image set by perceptual hash, and every column is redrawn as a
//! polyline through the matched reference coordinates.
//!
//! This crate re-exports the workspace crates under one roof.

pub use glyphcode_cell_extractor as cell_extractor;
pub use glyphcode_column_mapper as column_mapper;
pub use glyphcode_common as common;
pub use glyphcode_glyph_canvas as glyph_canvas;
pub use glyphcode_reference_index as reference_index;

pub use glyphcode_common::{GlyphError, Grid, Rect, Result};
pub use glyphcode_orchestrator::{
    GlyphOutcome, Pipeline, PipelineConfig, RunReport, RunState, Stage,
};
