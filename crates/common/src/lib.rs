/// Common types and errors shared by the glyph reconstruction crates
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Pipeline errors
#[derive(Debug, Error)]
pub enum GlyphError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image processing error: {0}")]
    Image(String),

    #[error("Reference metadata error: {0}")]
    Metadata(String),

    #[error("Column {column} has {distinct_points} distinct resolved point(s), cannot scale glyph")]
    DegenerateGlyphInput {
        column: usize,
        distinct_points: usize,
    },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Worker task failed: {0}")]
    Task(String),
}

impl From<image::ImageError> for GlyphError {
    fn from(err: image::ImageError) -> Self {
        match err {
            image::ImageError::IoError(io) => GlyphError::Io(io),
            other => GlyphError::Image(other.to_string()),
        }
    }
}

impl From<csv::Error> for GlyphError {
    fn from(err: csv::Error) -> Self {
        GlyphError::Metadata(err.to_string())
    }
}

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, GlyphError>;

/// Axis-aligned bounding box of one detected cell, in source-image pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub height: u32,
    pub width: u32,
}

impl Rect {
    #[must_use]
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            height,
            width,
        }
    }

    /// Exclusive right edge
    #[must_use]
    pub fn right(&self) -> u32 {
        self.x + self.width
    }

    /// Exclusive bottom edge
    #[must_use]
    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }

    #[must_use]
    pub fn center_x(&self) -> f32 {
        self.x as f32 + self.width as f32 / 2.0
    }

    #[must_use]
    pub fn center_y(&self) -> f32 {
        self.y as f32 + self.height as f32 / 2.0
    }

    #[must_use]
    pub fn area(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    /// True when `other` lies entirely within `self` (edges may touch)
    #[must_use]
    pub fn contains(&self, other: &Rect) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.right() <= self.right()
            && other.bottom() <= self.bottom()
    }

    /// True when the rect is non-empty and fits inside a `width` x `height` image
    #[must_use]
    pub fn fits_within(&self, width: u32, height: u32) -> bool {
        self.width > 0 && self.height > 0 && self.right() <= width && self.bottom() <= height
    }
}

/// Index into the flat rect list produced by cell extraction
pub type CellRef = usize;

/// Ordered columns of cell references.
///
/// Columns run left to right; cells inside a column run top to bottom.
/// Every rect index appears exactly once and no column is empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grid {
    columns: Vec<Vec<CellRef>>,
}

impl Grid {
    /// Build a grid, dropping any empty column
    #[must_use]
    pub fn new(columns: Vec<Vec<CellRef>>) -> Self {
        Self {
            columns: columns.into_iter().filter(|c| !c.is_empty()).collect(),
        }
    }

    #[must_use]
    pub fn columns(&self) -> &[Vec<CellRef>] {
        &self.columns
    }

    #[must_use]
    pub fn column(&self, index: usize) -> Option<&[CellRef]> {
        self.columns.get(index).map(Vec::as_slice)
    }

    #[must_use]
    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    #[must_use]
    pub fn num_cells(&self) -> usize {
        self.columns.iter().map(Vec::len).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}
