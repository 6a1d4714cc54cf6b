pub mod brief;
pub mod fast;
#[cfg(feature = "gradient-descriptor")]
pub mod gradient;

use glam::Vec2;
use image::DynamicImage;

use crate::config::FeatureAlgorithm;
use crate::error::MovementError;
use crate::imgproc::{GrayF32, gaussian_blur};

/// FAST segment-test threshold on 8-bit intensities.
const FAST_THRESHOLD: f32 = 20.0;
/// Pre-smoothing applied before descriptor sampling.
const DESCRIPTOR_BLUR_SIGMA: f32 = 2.0;

/// A detected image location with its corner response.
#[derive(Debug, Clone, Copy)]
pub struct Keypoint {
    pub p2d: Vec2,
    pub response: f32,
}

/// Distance metric implied by the descriptor type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistanceMetric {
    Hamming,
    Euclidean,
}

/// Descriptors for one frame, index-aligned with its keypoints.
/// May be empty; zero detected features is a valid state.
#[derive(Debug, Clone)]
pub enum DescriptorSet {
    Binary(Vec<brief::BinaryDescriptor>),
    #[cfg(feature = "gradient-descriptor")]
    Float(Vec<gradient::FloatDescriptor>),
}

impl DescriptorSet {
    pub fn len(&self) -> usize {
        match self {
            DescriptorSet::Binary(d) => d.len(),
            #[cfg(feature = "gradient-descriptor")]
            DescriptorSet::Float(d) => d.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn metric(&self) -> DistanceMetric {
        match self {
            DescriptorSet::Binary(_) => DistanceMetric::Hamming,
            #[cfg(feature = "gradient-descriptor")]
            DescriptorSet::Float(_) => DistanceMetric::Euclidean,
        }
    }
}

/// Detects keypoints and computes descriptors on the luma plane of `img`.
///
/// Returns an empty keypoint/descriptor pair when the frame has no usable
/// texture. Fails only when the requested algorithm is not compiled in.
pub fn extract_features(
    img: &DynamicImage,
    algorithm: FeatureAlgorithm,
    max_features: usize,
) -> Result<(Vec<Keypoint>, DescriptorSet), MovementError> {
    let gray = GrayF32::from_dynamic(img);
    match algorithm {
        FeatureAlgorithm::FastBrief => {
            let margin = brief::PATCH_RADIUS as usize + 1;
            let keypoints = fast::detect_corners(&gray, FAST_THRESHOLD, margin, max_features);
            let smoothed = gaussian_blur(&gray, DESCRIPTOR_BLUR_SIGMA);
            let descriptors = brief::describe(&smoothed, &keypoints);
            log::debug!(
                "fast-brief: {} keypoints on {}x{}",
                keypoints.len(),
                gray.width,
                gray.height
            );
            Ok((keypoints, DescriptorSet::Binary(descriptors)))
        }
        #[cfg(feature = "gradient-descriptor")]
        FeatureAlgorithm::GradientGrid => {
            let margin = gradient::PATCH_RADIUS as usize + 1;
            let keypoints = fast::detect_corners(&gray, FAST_THRESHOLD, margin, max_features);
            let smoothed = gaussian_blur(&gray, DESCRIPTOR_BLUR_SIGMA);
            let descriptors = gradient::describe(&smoothed, &keypoints);
            log::debug!(
                "gradient-grid: {} keypoints on {}x{}",
                keypoints.len(),
                gray.width,
                gray.height
            );
            Ok((keypoints, DescriptorSet::Float(descriptors)))
        }
        #[cfg(not(feature = "gradient-descriptor"))]
        FeatureAlgorithm::GradientGrid => {
            Err(MovementError::AlgorithmUnavailable(algorithm.name()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};

    fn frame_with_square() -> DynamicImage {
        let mut img = GrayImage::new(96, 96);
        for y in 30..60 {
            for x in 30..60 {
                img.put_pixel(x, y, Luma([220u8]));
            }
        }
        DynamicImage::ImageLuma8(img)
    }

    #[test]
    fn keypoints_and_descriptors_align() {
        let (kps, descs) =
            extract_features(&frame_with_square(), FeatureAlgorithm::FastBrief, 500).unwrap();
        assert_eq!(kps.len(), descs.len());
        assert!(!kps.is_empty());
        assert_eq!(descs.metric(), DistanceMetric::Hamming);
    }

    #[test]
    fn blank_frame_yields_empty_set() {
        let blank = DynamicImage::ImageLuma8(GrayImage::new(64, 64));
        let (kps, descs) =
            extract_features(&blank, FeatureAlgorithm::FastBrief, 500).unwrap();
        assert!(kps.is_empty());
        assert!(descs.is_empty());
    }

    #[cfg(feature = "gradient-descriptor")]
    #[test]
    fn gradient_grid_uses_euclidean() {
        let (kps, descs) =
            extract_features(&frame_with_square(), FeatureAlgorithm::GradientGrid, 500).unwrap();
        assert_eq!(kps.len(), descs.len());
        assert_eq!(descs.metric(), DistanceMetric::Euclidean);
    }
}
