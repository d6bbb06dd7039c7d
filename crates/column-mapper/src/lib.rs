//! Column mapping
//!
//! Groups cell rects into columns by horizontal center and orders each
//! column top to bottom. The column gap is derived from the modal cell width
//! unless overridden, so the layout pitch never has to be declared.

use glyphcode_common::{CellRef, Grid, Rect};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use tracing::debug;

/// Centers closer than this always share a column
pub const NOISE_TOLERANCE: f32 = 1.0;

/// Column mapping parameters
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MapperConfig {
    /// Fixed gap between column centers; derived from the cells when `None`
    pub column_gap: Option<f32>,
}

/// Maps an unordered rect list onto an ordered grid
pub struct ColumnMapper {
    config: MapperConfig,
}

impl ColumnMapper {
    #[must_use]
    pub fn new(config: MapperConfig) -> Self {
        Self { config }
    }

    /// Gap between consecutive x-centers above which a new column starts
    #[must_use]
    pub fn gap_threshold(&self, rects: &[Rect]) -> f32 {
        let gap = match self.config.column_gap {
            Some(gap) => gap,
            None => modal_width(rects).map_or(NOISE_TOLERANCE, |w| w as f32 / 2.0),
        };
        gap.max(NOISE_TOLERANCE)
    }

    /// Build the grid. The result depends only on the rect values, never on
    /// their order in `rects`.
    #[must_use]
    pub fn map_to_grid(&self, rects: &[Rect]) -> Grid {
        if rects.is_empty() {
            return Grid::default();
        }

        let threshold = self.gap_threshold(rects);

        let mut by_x: Vec<CellRef> = (0..rects.len()).collect();
        by_x.sort_by(|&a, &b| {
            rects[a]
                .center_x()
                .total_cmp(&rects[b].center_x())
                .then_with(|| rects[a].center_y().total_cmp(&rects[b].center_y()))
                .then_with(|| tie_break(&rects[a], &rects[b]))
                .then(a.cmp(&b))
        });

        let mut columns: Vec<Vec<CellRef>> = Vec::new();
        let mut current: Vec<CellRef> = Vec::new();
        let mut last_center = f32::NEG_INFINITY;
        for idx in by_x {
            let center = rects[idx].center_x();
            if !current.is_empty() && center - last_center > threshold {
                columns.push(std::mem::take(&mut current));
            }
            current.push(idx);
            last_center = center;
        }
        if !current.is_empty() {
            columns.push(current);
        }

        for column in &mut columns {
            column.sort_by(|&a, &b| {
                rects[a]
                    .y
                    .cmp(&rects[b].y)
                    .then(rects[a].x.cmp(&rects[b].x))
                    .then_with(|| tie_break(&rects[a], &rects[b]))
                    .then(a.cmp(&b))
            });
        }

        debug!(
            "Mapped {} rects into {} columns (gap threshold {:.1}px)",
            rects.len(),
            columns.len(),
            threshold
        );

        Grid::new(columns)
    }
}

impl Default for ColumnMapper {
    fn default() -> Self {
        Self::new(MapperConfig::default())
    }
}

fn tie_break(a: &Rect, b: &Rect) -> Ordering {
    (a.x, a.y, a.width, a.height).cmp(&(b.x, b.y, b.width, b.height))
}

/// Most frequent cell width; the smaller width wins a tie
fn modal_width(rects: &[Rect]) -> Option<u32> {
    let mut counts: BTreeMap<u32, usize> = BTreeMap::new();
    for rect in rects {
        *counts.entry(rect.width).or_insert(0) += 1;
    }
    counts
        .into_iter()
        .max_by(|(wa, ca), (wb, cb)| ca.cmp(cb).then(wb.cmp(wa)))
        .map(|(width, _)| width)
}
