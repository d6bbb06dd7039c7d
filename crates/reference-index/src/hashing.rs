//! Perceptual hashing of reference images and cell crops
//!
//! `img_hash` is built on image 0.23, so images decoded with the workspace's
//! image 0.25 are handed over as raw RGBA pixels.

use glyphcode_common::{GlyphError, Result};
use image::DynamicImage;
use img_hash::{HashAlg, HasherConfig};
use serde::{Deserialize, Serialize};

/// Perceptual hash algorithms
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum HashAlgorithm {
    /// Average hash (aHash)
    Mean,
    /// Horizontal gradient hash (dHash)
    #[default]
    Gradient,
    /// Vertical gradient hash
    VertGradient,
    /// Horizontal and vertical gradients combined
    DoubleGradient,
    /// Block hash
    Block,
}

impl HashAlgorithm {
    fn to_img_hash_alg(self) -> HashAlg {
        match self {
            HashAlgorithm::Mean => HashAlg::Mean,
            HashAlgorithm::Gradient => HashAlg::Gradient,
            HashAlgorithm::VertGradient => HashAlg::VertGradient,
            HashAlgorithm::DoubleGradient => HashAlg::DoubleGradient,
            HashAlgorithm::Block => HashAlg::Blockhash,
        }
    }
}

/// Hash algorithm and grid size shared by every hash in one index
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct HashSettings {
    pub algorithm: HashAlgorithm,
    /// Side of the hash grid (8 gives a 64-bit hash)
    pub size: u32,
}

impl Default for HashSettings {
    fn default() -> Self {
        Self {
            algorithm: HashAlgorithm::Gradient,
            size: 8,
        }
    }
}

impl HashSettings {
    /// Compute the hash bytes for `image`
    pub fn hash_image(&self, image: &DynamicImage) -> Result<Vec<u8>> {
        let hasher = HasherConfig::new()
            .hash_alg(self.algorithm.to_img_hash_alg())
            .hash_size(self.size, self.size)
            .to_hasher();

        let rgba = image.to_rgba8();
        let (width, height) = rgba.dimensions();

        use img_hash::image::{ImageBuffer, Rgba};
        let converted: ImageBuffer<Rgba<u8>, Vec<u8>> =
            ImageBuffer::from_raw(width, height, rgba.into_raw()).ok_or_else(|| {
                GlyphError::Image("Failed to convert image buffer for hashing".to_string())
            })?;
        let converted = img_hash::image::DynamicImage::ImageRgba8(converted);

        Ok(hasher.hash_image(&converted).as_bytes().to_vec())
    }
}

/// Number of differing bits between two equally sized hashes
pub fn hamming_distance(a: &[u8], b: &[u8]) -> Result<u32> {
    if a.len() != b.len() {
        return Err(GlyphError::InvalidInput(format!(
            "Hash length mismatch: {} vs {} bytes",
            a.len(),
            b.len()
        )));
    }

    Ok(a.iter().zip(b).map(|(x, y)| (x ^ y).count_ones()).sum())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};

    #[test]
    fn test_hash_algorithm_conversion() {
        assert_eq!(HashAlgorithm::Mean.to_img_hash_alg(), HashAlg::Mean);
        assert_eq!(HashAlgorithm::Gradient.to_img_hash_alg(), HashAlg::Gradient);
        assert_eq!(HashAlgorithm::Block.to_img_hash_alg(), HashAlg::Blockhash);
    }

    #[test]
    fn test_hamming_distance() {
        assert_eq!(hamming_distance(&[0b0000_0000, 0xFF], &[0, 0xFF]).unwrap(), 0);
        assert_eq!(hamming_distance(&[0x00, 0xFF], &[0xFF, 0x00]).unwrap(), 16);
        assert_eq!(hamming_distance(&[0b0001], &[0b0101]).unwrap(), 1);
        assert!(hamming_distance(&[0], &[0, 0]).is_err());
    }

    #[test]
    fn test_default_hash_is_64_bits() {
        let image = DynamicImage::ImageLuma8(GrayImage::from_fn(32, 32, |x, y| {
            Luma([((x * 7 + y * 3) % 256) as u8])
        }));
        let hash = HashSettings::default().hash_image(&image).unwrap();
        assert_eq!(hash.len(), 8);
    }

    #[test]
    fn test_hash_is_stable() {
        let image = DynamicImage::ImageLuma8(GrayImage::from_fn(40, 30, |x, _| Luma([x as u8 * 6])));
        let settings = HashSettings {
            algorithm: HashAlgorithm::DoubleGradient,
            size: 8,
        };
        assert_eq!(
            settings.hash_image(&image).unwrap(),
            settings.hash_image(&image).unwrap()
        );
    }
}
