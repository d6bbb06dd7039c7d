//! Glyph canvas
//!
//! One fixed-size slot per grid column, laid out left to right with border
//! padding. Each column's resolved reference coordinates are normalized into
//! its slot and joined as a polyline; a column with unresolved cells gets an
//! underline beneath its slot.
//!
//! Every draw call only touches the pixels of its own column slot.

use glyphcode_common::{GlyphError, Grid, Result};
use glyphcode_reference_index::MatchResult;
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_line_segment_mut};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

const BACKGROUND: Rgb<u8> = Rgb([0, 0, 0]);
const INK: Rgb<u8> = Rgb([255, 255, 255]);

/// Slot geometry and stroke widths
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanvasLayout {
    /// Side of the square area a glyph is scaled into
    pub cell_size: u32,
    /// Padding on each side of a slot
    pub border: u32,
    pub line_width: u32,
    pub underline_width: u32,
    /// Distance of the underline center below the glyph area
    pub underline_gap: u32,
}

impl Default for CanvasLayout {
    fn default() -> Self {
        Self {
            cell_size: 80,
            border: 10,
            line_width: 3,
            underline_width: 5,
            underline_gap: 5,
        }
    }
}

impl CanvasLayout {
    #[must_use]
    pub fn slot_width(&self) -> u32 {
        self.cell_size + 2 * self.border
    }

    /// Left edge of the glyph area of `column`
    #[must_use]
    pub fn slot_x(&self, column: usize) -> u32 {
        let n = column as u32;
        (2 * n + 1) * self.border + n * self.cell_size
    }
}

/// Output surface for the reconstructed passcode
pub struct GlyphCanvas {
    layout: CanvasLayout,
    columns: usize,
    image: RgbImage,
}

impl GlyphCanvas {
    /// Canvas with one slot per grid column
    #[must_use]
    pub fn create(grid: &Grid) -> Self {
        Self::with_layout(grid.num_columns(), CanvasLayout::default())
    }

    /// Canvas with `columns` slots (at least one, so it can always be saved)
    #[must_use]
    pub fn with_layout(columns: usize, layout: CanvasLayout) -> Self {
        let slots = columns.max(1) as u32;
        let image = RgbImage::from_pixel(
            layout.slot_width() * slots,
            layout.slot_width(),
            BACKGROUND,
        );
        Self {
            layout,
            columns,
            image,
        }
    }

    #[must_use]
    pub fn layout(&self) -> &CanvasLayout {
        &self.layout
    }

    #[must_use]
    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    #[must_use]
    pub fn into_image(self) -> RgbImage {
        self.image
    }

    /// Draw the glyph for one column from its row-ordered match results.
    ///
    /// Unresolved entries are skipped. Points are `(longitude, latitude)`,
    /// shifted to the column minimum and scaled by a single factor so the
    /// wider axis spans the cell; latitude grows upwards. Fails with
    /// `DegenerateGlyphInput` when the resolved points have no spread.
    pub fn draw_glyph(&mut self, column: usize, results: &[MatchResult]) -> Result<()> {
        self.check_column(column)?;

        let points: Vec<(f64, f64)> = results
            .iter()
            .filter_map(MatchResult::point)
            .map(|p| (p.longitude, p.latitude))
            .collect();

        let pixels = self.project(column, &points)?;
        let radius = (self.layout.line_width / 2) as i32;

        for pair in pixels.windows(2) {
            let (start, end) = (pair[0], pair[1]);
            for dx in -radius..=radius {
                for dy in -radius..=radius {
                    draw_line_segment_mut(
                        &mut self.image,
                        ((start.0 + dx) as f32, (start.1 + dy) as f32),
                        ((end.0 + dx) as f32, (end.1 + dy) as f32),
                        INK,
                    );
                }
            }
        }

        debug!("Drew glyph for column {} through {} points", column, pixels.len());
        Ok(())
    }

    /// Mark a column as incompletely decoded
    pub fn draw_underline(&mut self, column: usize) -> Result<()> {
        self.check_column(column)?;

        let layout = &self.layout;
        let center = layout.cell_size + layout.border + layout.underline_gap;
        let top = center.saturating_sub(layout.underline_width / 2);
        let bar = imageproc::rect::Rect::at(layout.slot_x(column) as i32, top as i32)
            .of_size(layout.cell_size + 1, layout.underline_width.max(1));
        draw_filled_rect_mut(&mut self.image, bar, INK);

        debug!("Drew underline for column {}", column);
        Ok(())
    }

    /// Write the canvas; the format follows the file extension
    pub fn save(&self, path: &Path) -> Result<()> {
        self.image.save(path)?;
        info!("Glyph canvas saved to {:?}", path);
        Ok(())
    }

    fn check_column(&self, column: usize) -> Result<()> {
        if column >= self.columns.max(1) {
            return Err(GlyphError::InvalidInput(format!(
                "column {} out of range for a {}-column canvas",
                column, self.columns
            )));
        }
        Ok(())
    }

    /// Map geographic points to canvas pixels inside the column slot
    fn project(&self, column: usize, points: &[(f64, f64)]) -> Result<Vec<(i32, i32)>> {
        let min_x = points.iter().map(|p| p.0).fold(f64::INFINITY, f64::min);
        let min_y = points.iter().map(|p| p.1).fold(f64::INFINITY, f64::min);
        let spread = points
            .iter()
            .map(|p| (p.0 - min_x).max(p.1 - min_y))
            .fold(0.0_f64, f64::max);

        if points.is_empty() || !spread.is_finite() || spread <= 0.0 {
            return Err(GlyphError::DegenerateGlyphInput {
                column,
                distinct_points: distinct_count(points),
            });
        }

        let cell = f64::from(self.layout.cell_size);
        let scale = cell / spread;
        let offset_x = f64::from(self.layout.slot_x(column));
        let border = f64::from(self.layout.border);

        Ok(points
            .iter()
            .map(|&(x, y)| {
                let local_x = ((x - min_x) * scale).round();
                let local_y = ((y - min_y) * scale).round();
                ((local_x + offset_x) as i32, (cell - local_y + border) as i32)
            })
            .collect())
    }
}

fn distinct_count(points: &[(f64, f64)]) -> usize {
    let mut distinct: Vec<(f64, f64)> = Vec::with_capacity(points.len());
    for &p in points {
        if !distinct.contains(&p) {
            distinct.push(p);
        }
    }
    distinct.len()
}
