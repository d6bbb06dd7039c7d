//! Run summary

use glyphcode_common::{GlyphError, Rect, Result};
use glyphcode_reference_index::MatchResult;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// What happened to a column's glyph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GlyphOutcome {
    Drawn,
    /// Resolved points had no spread to scale
    Degenerate,
    /// No cell resolved
    Empty,
}

/// One cell's match, tied to its row
#[derive(Debug, Clone, PartialEq)]
pub struct CellMatch {
    pub row: usize,
    pub rect: Rect,
    pub result: MatchResult,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellReport {
    pub row: usize,
    pub rect: Rect,
    /// Matched reference id, `None` when unresolved
    pub reference: Option<String>,
    /// Distance to the nearest reference, accepted or not
    pub distance: Option<u32>,
}

impl From<&CellMatch> for CellReport {
    fn from(cell: &CellMatch) -> Self {
        Self {
            row: cell.row,
            rect: cell.rect,
            reference: cell.result.point().map(|p| p.id.clone()),
            distance: cell.result.distance(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnReport {
    pub index: usize,
    pub cells: Vec<CellReport>,
    pub unresolved_rows: Vec<usize>,
    pub glyph: GlyphOutcome,
}

/// Summary of a solve run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub source: PathBuf,
    pub rects: usize,
    pub columns: Vec<ColumnReport>,
    pub glyph_path: PathBuf,
    pub overlay_path: PathBuf,
    pub elapsed_ms: u64,
}

impl RunReport {
    /// True when every cell of every column resolved
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.columns.iter().all(|c| c.unresolved_rows.is_empty())
    }

    /// Matched reference ids per column, row ordered
    #[must_use]
    pub fn reference_ids(&self) -> Vec<Vec<Option<String>>> {
        self.columns
            .iter()
            .map(|c| c.cells.iter().map(|cell| cell.reference.clone()).collect())
            .collect()
    }

    pub fn write_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| GlyphError::InvalidInput(format!("report serialization failed: {e}")))?;
        std::fs::write(path, json)?;
        Ok(())
    }
}
