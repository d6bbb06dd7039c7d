//! Passcode reconstruction pipeline
//!
//! Runs cell extraction, column mapping, per-cell reference matching and
//! glyph drawing for one scanned sheet:
//!
//! ```text
//! Extract -> Map -> (per column: Crop x N -> Match x N -> Draw) -> Save
//! ```
//!
//! Decoding, hashing, drawing and disk writes run on tokio's blocking pool.
//! The reference index is built while the scan is being extracted, and cell
//! matches are bounded by a semaphore of `max_workers` permits. Every match
//! is paired with its row index when dispatched, so completion order never
//! affects the glyph.
//!
//! Any stage error aborts the run; there are no retries. Unresolved cells are
//! not errors, they only drop out of the glyph and underline their column.
//!
//! # Example
//! ```no_run
//! use glyphcode_orchestrator::{Pipeline, PipelineConfig};
//! use std::path::Path;
//!
//! # async fn run() -> glyphcode_common::Result<()> {
//! let config = PipelineConfig::load(Path::new("glyphcode.yaml"))?;
//! let mut pipeline = Pipeline::new(config)?;
//! let report = pipeline.solve().await?;
//! println!("{} columns, complete: {}", report.columns.len(), report.is_complete());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod report;

pub use config::PipelineConfig;
pub use report::{CellMatch, CellReport, ColumnReport, GlyphOutcome, RunReport};

use glyphcode_cell_extractor::{load_image, save_overlay, CellExtractor};
use glyphcode_column_mapper::ColumnMapper;
use glyphcode_common::{CellRef, GlyphError, Rect, Result};
use glyphcode_glyph_canvas::GlyphCanvas;
use glyphcode_reference_index::{MatchResult, ReferenceMatchIndex};
use image::DynamicImage;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

/// Pipeline stages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Extract,
    Map,
    Match,
    Draw,
    Save,
}

impl Stage {
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Extract => "extract",
            Self::Map => "map",
            Self::Match => "match",
            Self::Draw => "draw",
            Self::Save => "save",
        }
    }
}

/// Where a pipeline run currently is
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunState {
    Pending,
    Running(Stage),
    Done,
    Failed(String),
}

/// Run a fallible blocking closure on the blocking pool
async fn offload<T, F>(task: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .map_err(|e| GlyphError::Task(format!("Task join error: {e}")))?
}

/// One run over one scanned sheet
pub struct Pipeline {
    config: PipelineConfig,
    state: RunState,
}

impl Pipeline {
    /// Validate `config` and prepare a run
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            state: RunState::Pending,
        })
    }

    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    #[must_use]
    pub fn state(&self) -> &RunState {
        &self.state
    }

    /// Extract cells and write the debug overlay only
    pub async fn split(&mut self) -> Result<Vec<Rect>> {
        let result = self.run_split().await;
        self.finish(result)
    }

    /// Full reconstruction: extract, map, match, draw and save
    pub async fn solve(&mut self) -> Result<RunReport> {
        let result = self.run_solve().await;
        self.finish(result)
    }

    fn enter(&mut self, stage: Stage) {
        debug!("Entering stage {}", stage.name());
        self.state = RunState::Running(stage);
    }

    fn finish<T>(&mut self, result: Result<T>) -> Result<T> {
        match &result {
            Ok(_) => self.state = RunState::Done,
            Err(e) => {
                let stage = match &self.state {
                    RunState::Running(stage) => stage.name().to_string(),
                    _ => "setup".to_string(),
                };
                error!("Pipeline failed during {}: {}", stage, e);
                self.state = RunState::Failed(e.to_string());
            }
        }
        result
    }

    async fn run_split(&mut self) -> Result<Vec<Rect>> {
        self.enter(Stage::Extract);
        let (source, rects) = self.extract().await?;

        self.enter(Stage::Save);
        let rects = Arc::new(rects);
        self.write_overlay(source, Arc::clone(&rects)).await?;

        Ok(rects.to_vec())
    }

    async fn run_solve(&mut self) -> Result<RunReport> {
        let start = Instant::now();

        self.enter(Stage::Extract);
        let index_build = {
            let metadata = self.config.reference_metadata();
            let images = self.config.reference_images();
            let settings = self.config.hash;
            let max_distance = self.config.max_match_distance;
            offload(move || ReferenceMatchIndex::build(&metadata, &images, settings, max_distance))
        };
        let ((source, rects), index) = tokio::try_join!(self.extract(), index_build)?;

        if rects.is_empty() {
            warn!("No cells found in the scan band, the glyph canvas will be blank");
        }
        if index.is_empty() {
            warn!("Reference index is empty, every cell will be unresolved");
        }

        let rects = Arc::new(rects);
        let index = Arc::new(index);
        self.write_overlay(Arc::clone(&source), Arc::clone(&rects))
            .await?;

        self.enter(Stage::Map);
        let grid = {
            let rects = Arc::clone(&rects);
            let mapper = ColumnMapper::new(self.config.mapper());
            offload(move || Ok(mapper.map_to_grid(&rects))).await?
        };
        info!(
            "Mapped {} cells into {} columns",
            grid.num_cells(),
            grid.num_columns()
        );

        let semaphore = Arc::new(Semaphore::new(self.config.workers()));
        let mut canvas = GlyphCanvas::create(&grid);
        let mut columns = Vec::with_capacity(grid.num_columns());

        for (n, column) in grid.columns().iter().enumerate() {
            info!("Processing column {}/{}...", n + 1, grid.num_columns());

            self.enter(Stage::Match);
            let cells = match_column(&source, &rects, column, &index, &semaphore).await?;

            let unresolved_rows: Vec<usize> = cells
                .iter()
                .filter(|c| !c.result.is_resolved())
                .map(|c| c.row)
                .collect();
            if !unresolved_rows.is_empty() {
                let rows = unresolved_rows
                    .iter()
                    .map(|r| (r + 1).to_string())
                    .collect::<Vec<_>>()
                    .join(",");
                warn!("Column {}: no reference found for row(s) {}", n + 1, rows);
            }

            self.enter(Stage::Draw);
            let results: Vec<MatchResult> = cells.iter().map(|c| c.result.clone()).collect();
            let (returned, glyph) = offload(move || {
                let outcome = render_column(&mut canvas, n, &results)?;
                Ok((canvas, outcome))
            })
            .await?;
            canvas = returned;

            columns.push(ColumnReport {
                index: n,
                cells: cells.iter().map(CellReport::from).collect(),
                unresolved_rows,
                glyph,
            });
        }

        self.enter(Stage::Save);
        let glyph_path = self.config.output_glyph();
        {
            let path = glyph_path.clone();
            offload(move || canvas.save(&path)).await?;
        }
        info!("Passcode glyphs saved to {}", glyph_path.display());

        Ok(RunReport {
            source: self.config.source_image(),
            rects: rects.len(),
            columns,
            glyph_path,
            overlay_path: self.config.debug_overlay(),
            elapsed_ms: u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
        })
    }

    /// Decode the source and extract its cells
    async fn extract(&self) -> Result<(Arc<DynamicImage>, Vec<Rect>)> {
        let path = self.config.source_image();
        let extractor = CellExtractor::new(self.config.extraction());
        offload(move || {
            let image = load_image(&path)?;
            let rects = extractor.extract(&image);
            Ok((Arc::new(image), rects))
        })
        .await
    }

    async fn write_overlay(&self, source: Arc<DynamicImage>, rects: Arc<Vec<Rect>>) -> Result<()> {
        let path = self.config.debug_overlay();
        offload(move || save_overlay(&source, &rects, &path)).await
    }
}

/// Crop and match every cell of one column, concurrently, in row order
async fn match_column(
    source: &Arc<DynamicImage>,
    rects: &Arc<Vec<Rect>>,
    column: &[CellRef],
    index: &Arc<ReferenceMatchIndex>,
    semaphore: &Arc<Semaphore>,
) -> Result<Vec<CellMatch>> {
    let mut pending = Vec::with_capacity(column.len());

    for (row, &cell) in column.iter().enumerate() {
        let permit = Arc::clone(semaphore)
            .acquire_owned()
            .await
            .map_err(|e| GlyphError::Task(format!("Worker pool closed: {e}")))?;
        let rect = rects[cell];
        let source = Arc::clone(source);
        let index = Arc::clone(index);

        let handle = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            let crop = source.crop_imm(rect.x, rect.y, rect.width, rect.height);
            index.match_image(&crop)
        });
        pending.push((row, rect, handle));
    }

    let mut cells = Vec::with_capacity(pending.len());
    for (row, rect, handle) in pending {
        let result = handle
            .await
            .map_err(|e| GlyphError::Task(format!("Task join error: {e}")))??;
        debug!(
            "Row {}: {} (distance {:?})",
            row + 1,
            result.point().map_or("unresolved", |p| p.id.as_str()),
            result.distance()
        );
        cells.push(CellMatch { row, rect, result });
    }

    Ok(cells)
}

/// Draw one column's glyph and, if any cell is unresolved, its underline.
///
/// A column without enough distinct resolved points gets no glyph; that is
/// reported as [`GlyphOutcome::Degenerate`] rather than an error.
pub fn render_column(
    canvas: &mut GlyphCanvas,
    column: usize,
    results: &[MatchResult],
) -> Result<GlyphOutcome> {
    let outcome = if results.iter().any(MatchResult::is_resolved) {
        match canvas.draw_glyph(column, results) {
            Ok(()) => GlyphOutcome::Drawn,
            Err(GlyphError::DegenerateGlyphInput {
                distinct_points, ..
            }) => {
                warn!(
                    "Column {}: {} distinct resolved point(s), skipping glyph",
                    column + 1,
                    distinct_points
                );
                GlyphOutcome::Degenerate
            }
            Err(e) => return Err(e),
        }
    } else {
        GlyphOutcome::Empty
    };

    if results.iter().any(|r| !r.is_resolved()) {
        canvas.draw_underline(column)?;
    }

    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use glyphcode_common::Grid;
    use glyphcode_reference_index::ReferencePoint;

    fn resolved(latitude: f64, longitude: f64) -> MatchResult {
        MatchResult::Resolved {
            point: ReferencePoint {
                id: format!("{latitude}/{longitude}"),
                latitude,
                longitude,
                hash: vec![0; 8],
            },
            distance: 0,
        }
    }

    fn unresolved() -> MatchResult {
        MatchResult::Unresolved {
            nearest_distance: None,
        }
    }

    fn lit_pixels(canvas: &GlyphCanvas) -> usize {
        canvas.image().pixels().filter(|p| p.0 != [0, 0, 0]).count()
    }

    #[test]
    fn test_render_half_resolved_column() {
        let mut canvas = GlyphCanvas::create(&Grid::new(vec![vec![0, 1]]));
        let outcome = render_column(&mut canvas, 0, &[resolved(1.0, 1.0), unresolved()]).unwrap();

        assert_eq!(outcome, GlyphOutcome::Degenerate);
        // Only the underline was drawn
        assert_eq!(*canvas.image().get_pixel(50, 95), image::Rgb([255, 255, 255]));
        assert_eq!(lit_pixels(&canvas), 81 * 5);
    }

    #[test]
    fn test_render_fully_resolved_column_has_no_underline() {
        let mut canvas = GlyphCanvas::create(&Grid::new(vec![vec![0, 1]]));
        let outcome =
            render_column(&mut canvas, 0, &[resolved(0.0, 0.0), resolved(1.0, 1.0)]).unwrap();

        assert_eq!(outcome, GlyphOutcome::Drawn);
        assert_eq!(*canvas.image().get_pixel(50, 97), image::Rgb([0, 0, 0]));
        assert!(lit_pixels(&canvas) > 0);
    }

    #[test]
    fn test_render_unresolved_column() {
        let mut canvas = GlyphCanvas::create(&Grid::new(vec![vec![0]]));
        let outcome = render_column(&mut canvas, 0, &[unresolved()]).unwrap();
        assert_eq!(outcome, GlyphOutcome::Empty);
        assert_eq!(lit_pixels(&canvas), 81 * 5);
    }

    #[tokio::test]
    async fn test_missing_source_fails_run() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().display();
        let yaml = format!(
            "source_image_path: {root}/missing.png\n\
             scan_y_start: 0\n\
             scan_y_end: 100\n\
             threshold: 128\n\
             output_glyph_path: {root}/glyph.png\n\
             debug_overlay_path: {root}/cells.png\n\
             reference_metadata_path: {root}/refs.csv\n\
             reference_image_directory: {root}\n"
        );
        std::fs::write(dir.path().join("refs.csv"), "id,lat,lng\n").unwrap();

        let mut pipeline = Pipeline::new(PipelineConfig::from_yaml_str(&yaml).unwrap()).unwrap();
        assert_eq!(pipeline.state(), &RunState::Pending);

        let err = pipeline.solve().await.unwrap_err();
        assert!(matches!(err, GlyphError::Io(_)));
        assert!(matches!(pipeline.state(), RunState::Failed(_)));
        assert!(!dir.path().join("glyph.png").exists());
    }
}
