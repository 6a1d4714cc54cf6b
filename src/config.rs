use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::MovementError;

/// Feature detector/descriptor family.
///
/// Both families share the FAST corner detector; they differ in descriptor
/// type and therefore in match metric (Hamming vs Euclidean).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum FeatureAlgorithm {
    /// 256-bit binary descriptor from pairwise intensity tests.
    FastBrief,
    /// 128-d float gradient-orientation-histogram descriptor.
    /// Requires the `gradient-descriptor` cargo feature.
    GradientGrid,
}

impl FeatureAlgorithm {
    pub const fn is_available(self) -> bool {
        match self {
            FeatureAlgorithm::FastBrief => true,
            FeatureAlgorithm::GradientGrid => cfg!(feature = "gradient-descriptor"),
        }
    }

    pub fn ensure_available(self) -> Result<(), MovementError> {
        if self.is_available() {
            Ok(())
        } else {
            Err(MovementError::AlgorithmUnavailable(self.name()))
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            FeatureAlgorithm::FastBrief => "fast-brief",
            FeatureAlgorithm::GradientGrid => "gradient-grid",
        }
    }
}

/// Thresholds for the per-pair movement classifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MovementConfig {
    pub algorithm: FeatureAlgorithm,
    /// Minimum keypoints per frame before the pair is scored geometrically.
    pub min_keypoints: usize,
    /// Translation magnitude (pixels) above which a pair counts as moved.
    pub homography_threshold_px: f64,
    /// Minimum cross-checked matches before a homography is fitted.
    pub min_matches: usize,
    /// Percentage of moving pixels above which object movement is flagged.
    pub object_flow_threshold_pct: f64,
    /// Cap on detected keypoints per frame (not a floor).
    pub max_features: usize,
}

impl Default for MovementConfig {
    fn default() -> Self {
        Self {
            algorithm: FeatureAlgorithm::FastBrief,
            min_keypoints: 20,
            homography_threshold_px: 20.0,
            min_matches: 20,
            object_flow_threshold_pct: 2.0,
            max_features: 1000,
        }
    }
}
