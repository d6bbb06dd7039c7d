//! Debug overlay of detected cells

use glyphcode_common::{Rect, Result};
use image::{DynamicImage, Rgb, RgbImage};
use imageproc::drawing::draw_hollow_rect_mut;
use std::path::Path;
use tracing::info;

const OUTLINE: Rgb<u8> = Rgb([255, 0, 0]);

/// Outline every rect on an RGB copy of `image`
#[must_use]
pub fn draw_overlay(image: &DynamicImage, rects: &[Rect]) -> RgbImage {
    let mut canvas = image.to_rgb8();
    for rect in rects {
        if rect.width == 0 || rect.height == 0 {
            continue;
        }
        let outline =
            imageproc::rect::Rect::at(rect.x as i32, rect.y as i32).of_size(rect.width, rect.height);
        draw_hollow_rect_mut(&mut canvas, outline, OUTLINE);
    }
    canvas
}

/// Draw the overlay and write it to `path`
pub fn save_overlay(image: &DynamicImage, rects: &[Rect], path: &Path) -> Result<()> {
    let canvas = draw_overlay(image, rects);
    canvas.save(path)?;
    info!("Cell overlay saved to {:?}", path);
    Ok(())
}
