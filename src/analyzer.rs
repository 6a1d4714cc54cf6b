use glam::Vec2;
use image::DynamicImage;
use log::{debug, trace};
use rayon::prelude::*;
use serde::Serialize;

use crate::config::MovementConfig;
use crate::error::MovementError;
use crate::features::extract_features;
use crate::flow::{FlowParams, MOTION_FLOOR, dense_flow};
use crate::homography::find_homography;
use crate::imgproc::{GrayF32, warp_to_source_frame};
use crate::matching::match_descriptors;

/// Measurements for one consecutive pair. `inlier_ratio` and
/// `translation_px` are `None` whenever the pair never reached a usable
/// transform (too few keypoints, too few matches, or a failed fit).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PairMetrics {
    pub match_count: usize,
    pub inlier_ratio: Option<f64>,
    pub translation_px: Option<f64>,
    pub moving_pixel_pct: f64,
}

/// Classification of one consecutive pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PairVerdict {
    NoMovement,
    CameraMovement,
    ObjectMovement,
    /// Camera movement with residual object motion on top.
    Both,
}

impl PairVerdict {
    pub const fn label(self) -> &'static str {
        match self {
            PairVerdict::NoMovement => "no movement",
            PairVerdict::CameraMovement => "camera movement",
            PairVerdict::ObjectMovement => "object movement",
            PairVerdict::Both => "camera + object movement",
        }
    }
}

/// Aggregated result over a frame sequence. Index i in every per-pair list
/// refers to the destination frame of pair (i, i+1); the index sets contain
/// destination frame indices.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SequenceResult {
    /// Frames reached by a pair classified as camera movement.
    pub camera_movement_indices: Vec<usize>,
    /// Frames with object movement, geometric and flow detections merged.
    pub object_movement_indices: Vec<usize>,
    /// The flow-detected subset of `object_movement_indices`.
    pub flow_object_indices: Vec<usize>,
    pub metrics: Vec<PairMetrics>,
    pub verdicts: Vec<PairVerdict>,
}

impl SequenceResult {
    pub fn pair_count(&self) -> usize {
        self.metrics.len()
    }
}

struct PairOutcome {
    metrics: PairMetrics,
    camera: bool,
    object_geometric: bool,
    object_flow: bool,
}

fn verdict(camera: bool, object_geometric: bool, object_flow: bool) -> PairVerdict {
    match (camera, object_geometric || object_flow) {
        (true, true) => PairVerdict::Both,
        (true, false) => PairVerdict::CameraMovement,
        (false, true) => PairVerdict::ObjectMovement,
        (false, false) => PairVerdict::NoMovement,
    }
}

fn analyze_pair(
    img1: &DynamicImage,
    img2: &DynamicImage,
    config: &MovementConfig,
) -> Result<PairOutcome, MovementError> {
    let (kp1, des1) = extract_features(img1, config.algorithm, config.max_features)?;
    let (kp2, des2) = extract_features(img2, config.algorithm, config.max_features)?;

    let mut match_count = 0;
    let mut inlier_ratio = None;
    let mut translation_px = None;
    let mut camera = false;
    let mut object_geometric = false;
    let mut transform = None;

    if kp1.len() >= config.min_keypoints && kp2.len() >= config.min_keypoints {
        let matches = match_descriptors(&des1, &des2);
        match_count = matches.len();
        if match_count >= config.min_matches {
            let src: Vec<Vec2> = matches.iter().map(|m| kp1[m.query_idx].p2d).collect();
            let dst: Vec<Vec2> = matches.iter().map(|m| kp2[m.train_idx].p2d).collect();
            if let Some(h) = find_homography(&src, &dst) {
                let t = h.translation_magnitude();
                let r = h.inlier_ratio();
                translation_px = Some(t);
                inlier_ratio = Some(r);
                if t > config.homography_threshold_px {
                    if r > 0.5 {
                        camera = true;
                    } else {
                        // large apparent shift without geometric consensus
                        // reads as local/non-rigid motion, not a camera pan
                        object_geometric = true;
                    }
                }
                transform = Some(h);
            }
        }
        trace!(
            "pair: {} matches, translation {:?}, inliers {:?}",
            match_count, translation_px, inlier_ratio
        );
    } else {
        trace!(
            "pair skipped geometry: {} / {} keypoints (min {})",
            kp1.len(),
            kp2.len(),
            config.min_keypoints
        );
    }

    // flow always runs; camera pairs are scored on the transform-compensated
    // pair so residual flow reflects object motion only
    let gray1 = GrayF32::from_dynamic(img1);
    let mut gray2 = GrayF32::from_dynamic(img2);
    if camera {
        if let Some(h) = &transform {
            gray2 = warp_to_source_frame(&gray2, &h.matrix);
        }
    }
    let flow = dense_flow(&gray1, &gray2, &FlowParams::default());
    let moving_pixel_pct = flow.moving_pixel_percent(MOTION_FLOOR);
    let object_flow = moving_pixel_pct > config.object_flow_threshold_pct;

    Ok(PairOutcome {
        metrics: PairMetrics {
            match_count,
            inlier_ratio,
            translation_px,
            moving_pixel_pct,
        },
        camera,
        object_geometric,
        object_flow,
    })
}

/// Classifies every consecutive pair of `frames` and aggregates the
/// sequence-level index sets.
///
/// Pairs are independent and run as parallel tasks; results are collected
/// in pair order, so the output is identical to a sequential scan.
pub fn analyze_sequence(
    frames: &[DynamicImage],
    config: &MovementConfig,
) -> Result<SequenceResult, MovementError> {
    if frames.len() < 2 {
        return Err(MovementError::TooFewFrames(frames.len()));
    }
    config.algorithm.ensure_available()?;
    debug!(
        "analyzing {} frames ({} pairs) with {}",
        frames.len(),
        frames.len() - 1,
        config.algorithm.name()
    );

    let outcomes: Vec<PairOutcome> = (0..frames.len() - 1)
        .into_par_iter()
        .map(|i| analyze_pair(&frames[i], &frames[i + 1], config))
        .collect::<Result<_, _>>()?;

    let mut result = SequenceResult {
        camera_movement_indices: Vec::new(),
        object_movement_indices: Vec::new(),
        flow_object_indices: Vec::new(),
        metrics: Vec::with_capacity(outcomes.len()),
        verdicts: Vec::with_capacity(outcomes.len()),
    };
    for (i, outcome) in outcomes.into_iter().enumerate() {
        let dst_frame = i + 1;
        if outcome.camera {
            result.camera_movement_indices.push(dst_frame);
        }
        if outcome.object_geometric || outcome.object_flow {
            result.object_movement_indices.push(dst_frame);
        }
        if outcome.object_flow {
            result.flow_object_indices.push(dst_frame);
        }
        result.verdicts.push(verdict(
            outcome.camera,
            outcome.object_geometric,
            outcome.object_flow,
        ));
        result.metrics.push(outcome.metrics);
    }
    Ok(result)
}
