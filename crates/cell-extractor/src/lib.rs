//! Cell extraction
//!
//! Locates the rectangular cells of a scanned passcode sheet. The search is
//! restricted to a horizontal band, binarized with a fixed cutoff, and every
//! outer contour's bounding box becomes a candidate cell. Specks, nested boxes
//! and duplicates are discarded.
//!
//! The returned rects carry no ordering guarantee; see the column mapper.

pub mod overlay;

pub use overlay::{draw_overlay, save_overlay};

use glyphcode_common::{Rect, Result};
use image::{DynamicImage, GrayImage, Luma};
use imageproc::contours::{find_contours, BorderType};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

/// Cell extraction parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionConfig {
    /// First row of the scan band (inclusive)
    pub y_start: u32,
    /// Last row of the scan band (inclusive)
    pub y_end: u32,
    /// Binarization cutoff; luma strictly above it is foreground
    pub threshold: u8,
    /// Treat dark pixels as foreground instead
    pub invert: bool,
    /// Boxes with a side shorter than this are dropped as noise
    pub min_cell_side: u32,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            y_start: 0,
            y_end: u32::MAX,
            threshold: 127,
            invert: false,
            min_cell_side: 2,
        }
    }
}

/// Decode the source image
pub fn load_image(path: &Path) -> Result<DynamicImage> {
    debug!("Loading image {:?}", path);
    Ok(image::open(path)?)
}

/// Contour-based cell extractor
pub struct CellExtractor {
    config: ExtractionConfig,
}

impl CellExtractor {
    #[must_use]
    pub fn new(config: ExtractionConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    /// Load `path` and extract its cells
    pub fn extract_from_path(&self, path: &Path) -> Result<Vec<Rect>> {
        let image = load_image(path)?;
        Ok(self.extract(&image))
    }

    /// Extract cell rects from a decoded image.
    ///
    /// An empty result is a valid outcome (nothing in the band qualified).
    #[must_use]
    pub fn extract(&self, image: &DynamicImage) -> Vec<Rect> {
        let gray = image.to_luma8();
        let (width, height) = gray.dimensions();

        if width == 0 || height == 0 {
            return Vec::new();
        }

        let y_start = self.config.y_start;
        let y_end = self.config.y_end.min(height - 1);
        if y_start > y_end {
            debug!(
                "Scan band {}..={} lies outside image height {}",
                self.config.y_start, self.config.y_end, height
            );
            return Vec::new();
        }

        let band = image::imageops::crop_imm(&gray, 0, y_start, width, y_end - y_start + 1)
            .to_image();
        let mask = self.binarize(&band);

        let candidates = self.contour_boxes(&mask, y_start);
        let cells = remove_nested(candidates);

        info!(
            "Extracted {} cells from band y={}..={} (threshold={})",
            cells.len(),
            y_start,
            y_end,
            self.config.threshold
        );

        cells
    }

    fn binarize(&self, band: &GrayImage) -> GrayImage {
        let threshold = self.config.threshold;
        let invert = self.config.invert;
        let mut mask = GrayImage::new(band.width(), band.height());
        for (x, y, pixel) in band.enumerate_pixels() {
            let foreground = if invert {
                pixel[0] <= threshold
            } else {
                pixel[0] > threshold
            };
            mask.put_pixel(x, y, Luma([if foreground { 255 } else { 0 }]));
        }
        mask
    }

    /// Bounding boxes of every outer contour, shifted back to image rows
    fn contour_boxes(&self, mask: &GrayImage, y_offset: u32) -> Vec<Rect> {
        let contours = find_contours::<u32>(mask);
        debug!("Found {} contours", contours.len());

        let mut boxes = Vec::new();
        for contour in &contours {
            if !matches!(contour.border_type, BorderType::Outer) || contour.points.is_empty() {
                continue;
            }

            let min_x = contour.points.iter().map(|p| p.x).min().unwrap_or(0);
            let max_x = contour.points.iter().map(|p| p.x).max().unwrap_or(0);
            let min_y = contour.points.iter().map(|p| p.y).min().unwrap_or(0);
            let max_y = contour.points.iter().map(|p| p.y).max().unwrap_or(0);

            let rect = Rect::new(
                min_x,
                min_y + y_offset,
                max_x - min_x + 1,
                max_y - min_y + 1,
            );

            if rect.width < self.config.min_cell_side || rect.height < self.config.min_cell_side {
                continue;
            }

            boxes.push(rect);
        }
        boxes
    }
}

/// Drop boxes contained in (or identical to) another kept box.
///
/// Larger boxes win; the surviving boxes keep their discovery order.
fn remove_nested(candidates: Vec<Rect>) -> Vec<Rect> {
    let mut by_area: Vec<usize> = (0..candidates.len()).collect();
    by_area.sort_by(|&a, &b| {
        candidates[b]
            .area()
            .cmp(&candidates[a].area())
            .then(a.cmp(&b))
    });

    let mut kept: Vec<usize> = Vec::with_capacity(candidates.len());
    for idx in by_area {
        let rect = &candidates[idx];
        if kept.iter().any(|&k| candidates[k].contains(rect)) {
            continue;
        }
        kept.push(idx);
    }

    kept.sort_unstable();
    kept.into_iter().map(|idx| candidates[idx]).collect()
}
