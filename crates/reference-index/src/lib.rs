//! Reference match index
//!
//! Holds the known reference points (landmarks with coordinates) together
//! with a perceptual hash of each one's canonical image, and matches cropped
//! cells against them by Hamming distance.
//!
//! The reference set is small, so matching is a linear scan over the flat
//! hash list. Once built the index is read-only and can be shared freely
//! between worker threads.

pub mod hashing;
pub mod metadata;

pub use hashing::{hamming_distance, HashAlgorithm, HashSettings};
pub use metadata::{read_records, ReferenceRecord};

use glyphcode_common::Result;
use image::DynamicImage;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Default acceptance threshold (bits of a 64-bit hash)
pub const DEFAULT_MAX_DISTANCE: u32 = 10;

/// Image extensions searched for each reference id, in order
pub const IMAGE_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "webp"];

/// A known landmark and the hash of its canonical image
#[derive(Debug, Clone, PartialEq)]
pub struct ReferencePoint {
    pub id: String,
    pub latitude: f64,
    pub longitude: f64,
    pub hash: Vec<u8>,
}

/// Outcome of matching one crop
#[derive(Debug, Clone, PartialEq)]
pub enum MatchResult {
    /// Nearest reference within the acceptance threshold
    Resolved { point: ReferencePoint, distance: u32 },
    /// Nothing close enough; `nearest_distance` is `None` for an empty index
    Unresolved { nearest_distance: Option<u32> },
}

impl MatchResult {
    #[must_use]
    pub fn point(&self) -> Option<&ReferencePoint> {
        match self {
            MatchResult::Resolved { point, .. } => Some(point),
            MatchResult::Unresolved { .. } => None,
        }
    }

    #[must_use]
    pub fn is_resolved(&self) -> bool {
        matches!(self, MatchResult::Resolved { .. })
    }

    /// Distance to the nearest reference, accepted or not
    #[must_use]
    pub fn distance(&self) -> Option<u32> {
        match self {
            MatchResult::Resolved { distance, .. } => Some(*distance),
            MatchResult::Unresolved { nearest_distance } => *nearest_distance,
        }
    }
}

/// Flat perceptual-hash index over the reference set
#[derive(Debug, Clone)]
pub struct ReferenceMatchIndex {
    settings: HashSettings,
    max_distance: u32,
    points: Vec<ReferencePoint>,
    ids: HashSet<String>,
}

impl ReferenceMatchIndex {
    /// Create an empty index
    #[must_use]
    pub fn new(settings: HashSettings, max_distance: u32) -> Self {
        Self {
            settings,
            max_distance,
            points: Vec::new(),
            ids: HashSet::new(),
        }
    }

    /// Build the index from a metadata CSV and a directory of `<id>.<ext>` images.
    ///
    /// Records without an image, or whose image cannot be decoded, are
    /// skipped. Only an unreadable metadata file fails the build.
    pub fn build(
        metadata_path: &Path,
        image_dir: &Path,
        settings: HashSettings,
        max_distance: u32,
    ) -> Result<Self> {
        info!(
            "Building reference index from {:?} (images in {:?})",
            metadata_path, image_dir
        );

        let records = read_records(metadata_path)?;
        let mut index = Self::new(settings, max_distance);
        let mut missing = 0usize;
        let mut unreadable = 0usize;

        for record in records {
            let Some(image_path) = find_image(image_dir, &record.id) else {
                debug!("No image for reference {}, skipping", record.id);
                missing += 1;
                continue;
            };

            let image = match image::open(&image_path) {
                Ok(image) => image,
                Err(e) => {
                    warn!("Failed to decode reference image {:?}: {}", image_path, e);
                    unreadable += 1;
                    continue;
                }
            };

            index.register_image(record, &image)?;
        }

        info!(
            "Reference index ready: {} registered, {} without image, {} unreadable",
            index.len(),
            missing,
            unreadable
        );

        Ok(index)
    }

    /// Hash `image` and register it under `record`
    ///
    /// Returns `false` when the id is already registered.
    pub fn register_image(&mut self, record: ReferenceRecord, image: &DynamicImage) -> Result<bool> {
        let hash = self.settings.hash_image(image)?;
        Ok(self.register(ReferencePoint {
            id: record.id,
            latitude: record.latitude,
            longitude: record.longitude,
            hash,
        }))
    }

    /// Register a precomputed point; returns `false` for a duplicate id
    pub fn register(&mut self, point: ReferencePoint) -> bool {
        if !self.ids.insert(point.id.clone()) {
            warn!("Duplicate reference id {}, keeping the first", point.id);
            return false;
        }
        self.points.push(point);
        true
    }

    /// Match a cropped cell image
    pub fn match_image(&self, image: &DynamicImage) -> Result<MatchResult> {
        let hash = self.settings.hash_image(image)?;
        self.match_hash(&hash)
    }

    /// Match a precomputed hash.
    ///
    /// The nearest reference is returned if its distance is at most the
    /// acceptance threshold. On equal distances the earliest registered
    /// reference wins.
    pub fn match_hash(&self, hash: &[u8]) -> Result<MatchResult> {
        let mut best: Option<(usize, u32)> = None;
        for (i, point) in self.points.iter().enumerate() {
            let distance = hamming_distance(hash, &point.hash)?;
            if best.map_or(true, |(_, d)| distance < d) {
                best = Some((i, distance));
            }
        }

        Ok(match best {
            Some((i, distance)) if distance <= self.max_distance => {
                debug!("Matched {} at distance {}", self.points[i].id, distance);
                MatchResult::Resolved {
                    point: self.points[i].clone(),
                    distance,
                }
            }
            other => {
                debug!(
                    "No reference within {} bits (nearest {:?})",
                    self.max_distance,
                    other.map(|(_, d)| d)
                );
                MatchResult::Unresolved {
                    nearest_distance: other.map(|(_, d)| d),
                }
            }
        })
    }

    #[must_use]
    pub fn points(&self) -> &[ReferencePoint] {
        &self.points
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&ReferencePoint> {
        self.points.iter().find(|p| p.id == id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    #[must_use]
    pub fn max_distance(&self) -> u32 {
        self.max_distance
    }

    #[must_use]
    pub fn settings(&self) -> &HashSettings {
        &self.settings
    }
}

/// First existing `<dir>/<id>.<ext>` over [`IMAGE_EXTENSIONS`]
#[must_use]
pub fn find_image(dir: &Path, id: &str) -> Option<PathBuf> {
    if id.is_empty() || id.contains(['/', '\\']) {
        return None;
    }
    IMAGE_EXTENSIONS
        .iter()
        .map(|ext| dir.join(format!("{id}.{ext}")))
        .find(|path| path.is_file())
}

#[cfg(test)]
mod tests {
    use super::*;
    use glyphcode_common::GlyphError;
    use image::{Rgb, RgbImage};
    use std::fs;

    fn point(id: &str, hash: u8) -> ReferencePoint {
        ReferencePoint {
            id: id.to_string(),
            latitude: 0.0,
            longitude: 0.0,
            hash: vec![hash],
        }
    }

    fn horizontal_ramp(rising: bool) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_fn(64, 64, |x, _| {
            let v = (x * 4) as u8;
            let v = if rising { v } else { 255 - v };
            Rgb([v, v, v])
        }))
    }

    fn vertical_ramp() -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_fn(64, 64, |_, y| {
            let v = (y * 4) as u8;
            Rgb([v, 255 - v, v / 2])
        }))
    }

    #[test]
    fn test_nearest_within_threshold() {
        let mut index = ReferenceMatchIndex::new(HashSettings::default(), 2);
        index.register(point("A", 0b0000));
        index.register(point("B", 0b0101));

        let result = index.match_hash(&[0b0001]).unwrap();
        assert_eq!(result.point().map(|p| p.id.as_str()), Some("A"));
        assert_eq!(result.distance(), Some(1));
    }

    #[test]
    fn test_tie_goes_to_first_registered() {
        let mut index = ReferenceMatchIndex::new(HashSettings::default(), 4);
        index.register(point("B", 0b0011));
        index.register(point("A", 0b1100));

        let result = index.match_hash(&[0b0000]).unwrap();
        assert_eq!(result.point().map(|p| p.id.as_str()), Some("B"));
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let mut index = ReferenceMatchIndex::new(HashSettings::default(), 2);
        index.register(point("A", 0b0000));

        assert!(index.match_hash(&[0b0011]).unwrap().is_resolved());
        assert_eq!(
            index.match_hash(&[0b0111]).unwrap(),
            MatchResult::Unresolved {
                nearest_distance: Some(3)
            }
        );
    }

    #[test]
    fn test_empty_index_is_unresolved() {
        let index = ReferenceMatchIndex::new(HashSettings::default(), 10);
        assert_eq!(
            index.match_hash(&[0u8; 8]).unwrap(),
            MatchResult::Unresolved {
                nearest_distance: None
            }
        );
    }

    #[test]
    fn test_duplicate_ids_are_rejected() {
        let mut index = ReferenceMatchIndex::new(HashSettings::default(), 2);
        assert!(index.register(point("A", 0)));
        assert!(!index.register(point("A", 0xFF)));
        assert_eq!(index.len(), 1);
        assert_eq!(index.get("A").map(|p| p.hash.clone()), Some(vec![0]));
    }

    #[test]
    fn test_hash_length_mismatch_is_invalid_input() {
        let mut index = ReferenceMatchIndex::new(HashSettings::default(), 2);
        index.register(point("A", 0));
        assert!(matches!(
            index.match_hash(&[0, 0]),
            Err(GlyphError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_build_matches_identical_image() {
        let dir = tempfile::tempdir().unwrap();
        let images = dir.path().join("images");
        fs::create_dir(&images).unwrap();

        let rising = horizontal_ramp(true);
        let vertical = vertical_ramp();
        rising.save(images.join("p1.png")).unwrap();
        vertical.save(images.join("p2.png")).unwrap();
        fs::write(images.join("p4.png"), b"not an image").unwrap();

        let csv = dir.path().join("portals.csv");
        fs::write(
            &csv,
            "id,lat,lng,name\n\
             p1,31.25,121.5,first\n\
             p2,31.26,121.51,second\n\
             p3,31.27,121.52,no image\n\
             p4,31.28,121.53,corrupt\n\
             p1,0,0,duplicate\n",
        )
        .unwrap();

        let index =
            ReferenceMatchIndex::build(&csv, &images, HashSettings::default(), DEFAULT_MAX_DISTANCE)
                .unwrap();
        assert_eq!(index.len(), 2);
        assert_eq!(
            index.points().iter().map(|p| p.id.as_str()).collect::<Vec<_>>(),
            vec!["p1", "p2"]
        );

        match index.match_image(&rising).unwrap() {
            MatchResult::Resolved { point, distance } => {
                assert_eq!(point.id, "p1");
                assert_eq!(point.latitude, 31.25);
                assert_eq!(point.longitude, 121.5);
                assert_eq!(distance, 0);
            }
            other => panic!("expected a match, got {other:?}"),
        }
    }

    #[test]
    fn test_distant_crop_is_unresolved() {
        let mut index = ReferenceMatchIndex::new(HashSettings::default(), DEFAULT_MAX_DISTANCE);
        index
            .register_image(
                ReferenceRecord {
                    id: "p1".to_string(),
                    latitude: 1.0,
                    longitude: 1.0,
                },
                &horizontal_ramp(true),
            )
            .unwrap();

        let result = index.match_image(&horizontal_ramp(false)).unwrap();
        assert!(!result.is_resolved());
        assert!(result.distance().unwrap() > DEFAULT_MAX_DISTANCE);
    }

    #[test]
    fn test_missing_metadata_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = ReferenceMatchIndex::build(
            &dir.path().join("missing.csv"),
            dir.path(),
            HashSettings::default(),
            DEFAULT_MAX_DISTANCE,
        )
        .unwrap_err();
        assert!(matches!(err, GlyphError::Io(_)));
    }

    #[test]
    fn test_find_image_rejects_path_ids() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.webp"), b"").unwrap();
        assert_eq!(find_image(dir.path(), "a"), Some(dir.path().join("a.webp")));
        assert_eq!(find_image(dir.path(), "../a"), None);
        assert_eq!(find_image(dir.path(), "b"), None);
    }
}
