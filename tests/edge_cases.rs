use camera_movement_detection::analyzer::{PairVerdict, analyze_sequence};
use camera_movement_detection::config::{FeatureAlgorithm, MovementConfig};
use camera_movement_detection::error::MovementError;
use image::{DynamicImage, GrayImage, Luma};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

fn noise_frame(seed: u64) -> DynamicImage {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut img = GrayImage::new(128, 96);
    for y in 0..96 {
        for x in 0..128 {
            img.put_pixel(x, y, Luma([rng.random_range(0..=255u8)]));
        }
    }
    DynamicImage::ImageLuma8(img)
}

fn blank_frame() -> DynamicImage {
    DynamicImage::ImageLuma8(GrayImage::new(128, 96))
}

#[test]
fn fewer_than_two_frames_is_rejected() {
    let config = MovementConfig::default();
    assert!(matches!(
        analyze_sequence(&[], &config),
        Err(MovementError::TooFewFrames(0))
    ));
    assert!(matches!(
        analyze_sequence(&[blank_frame()], &config),
        Err(MovementError::TooFewFrames(1))
    ));
}

#[test]
fn low_texture_frame_skips_geometry_but_not_flow() {
    // the blank destination frame cannot reach the keypoint minimum
    let frames = vec![noise_frame(5), blank_frame()];
    let result = analyze_sequence(&frames, &MovementConfig::default()).unwrap();
    assert_eq!(result.pair_count(), 1);
    assert_eq!(result.metrics[0].match_count, 0);
    assert!(result.metrics[0].inlier_ratio.is_none());
    assert!(result.metrics[0].translation_px.is_none());
    assert!(result.metrics[0].moving_pixel_pct.is_finite());
    assert!(result.camera_movement_indices.is_empty());
}

#[test]
fn match_starved_pair_skips_homography() {
    // plenty of keypoints on both sides, but unrelated noise: raise the
    // match minimum beyond what cross-checking can deliver
    let config = MovementConfig {
        min_matches: 10_000,
        ..MovementConfig::default()
    };
    let frames = vec![noise_frame(5), noise_frame(6)];
    let result = analyze_sequence(&frames, &config).unwrap();
    assert!(result.metrics[0].inlier_ratio.is_none());
    assert!(result.metrics[0].translation_px.is_none());
    assert!(result.metrics[0].moving_pixel_pct.is_finite());
}

#[test]
fn identical_blank_pair_is_no_movement() {
    let frames = vec![blank_frame(), blank_frame()];
    let result = analyze_sequence(&frames, &MovementConfig::default()).unwrap();
    assert_eq!(result.verdicts[0], PairVerdict::NoMovement);
    assert!(result.metrics[0].moving_pixel_pct < 1e-9);
}

#[cfg(not(feature = "gradient-descriptor"))]
#[test]
fn gradient_grid_unavailable_in_minimal_build() {
    let config = MovementConfig {
        algorithm: FeatureAlgorithm::GradientGrid,
        ..MovementConfig::default()
    };
    let frames = vec![noise_frame(1), noise_frame(2)];
    assert!(matches!(
        analyze_sequence(&frames, &config),
        Err(MovementError::AlgorithmUnavailable(_))
    ));
}

#[cfg(feature = "gradient-descriptor")]
#[test]
fn gradient_grid_runs_when_available() {
    let config = MovementConfig {
        algorithm: FeatureAlgorithm::GradientGrid,
        ..MovementConfig::default()
    };
    let frame = noise_frame(9);
    let frames = vec![frame.clone(), frame];
    let result = analyze_sequence(&frames, &config).unwrap();
    assert_eq!(result.pair_count(), 1);
    assert_eq!(result.verdicts[0], PairVerdict::NoMovement);
}
