use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::imgproc::GrayF32;

use super::Keypoint;

/// 256-bit binary descriptor, 32 bytes.
pub type BinaryDescriptor = [u8; 32];

pub const DESCRIPTOR_BITS: usize = 256;
/// Test points are drawn inside a 31x31 patch.
pub const PATCH_RADIUS: isize = 15;
const PATTERN_SEED: u64 = 0x5143;

/// Pairwise intensity-test pattern, identical for every frame and every run.
fn test_pattern() -> Vec<(isize, isize, isize, isize)> {
    let mut rng = ChaCha8Rng::seed_from_u64(PATTERN_SEED);
    (0..DESCRIPTOR_BITS)
        .map(|_| {
            (
                rng.random_range(-(PATCH_RADIUS as i32)..=PATCH_RADIUS as i32) as isize,
                rng.random_range(-(PATCH_RADIUS as i32)..=PATCH_RADIUS as i32) as isize,
                rng.random_range(-(PATCH_RADIUS as i32)..=PATCH_RADIUS as i32) as isize,
                rng.random_range(-(PATCH_RADIUS as i32)..=PATCH_RADIUS as i32) as isize,
            )
        })
        .collect()
}

/// Binary descriptors for `keypoints` over a pre-smoothed image, one per
/// keypoint in order. Callers guarantee keypoints lie at least
/// `PATCH_RADIUS` away from the borders.
pub fn describe(smoothed: &GrayF32, keypoints: &[Keypoint]) -> Vec<BinaryDescriptor> {
    let pattern = test_pattern();
    keypoints
        .iter()
        .map(|kp| {
            let cx = kp.p2d.x as isize;
            let cy = kp.p2d.y as isize;
            let mut desc = [0u8; 32];
            for (bit, &(x0, y0, x1, y1)) in pattern.iter().enumerate() {
                let a = smoothed.at_clamped(cx + x0, cy + y0);
                let b = smoothed.at_clamped(cx + x1, cy + y1);
                if a < b {
                    desc[bit / 8] |= 1 << (bit % 8);
                }
            }
            desc
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imgproc::gaussian_blur;
    use glam::Vec2;

    fn textured() -> GrayF32 {
        let mut img = GrayF32::new(96, 96);
        for y in 0..96 {
            for x in 0..96 {
                img.set(x, y, ((x * 7 + y * 13) % 97) as f32);
            }
        }
        img
    }

    #[test]
    fn identical_patches_give_identical_descriptors() {
        let img = gaussian_blur(&textured(), 2.0);
        let kps = vec![Keypoint { p2d: Vec2::new(40.0, 40.0), response: 1.0 }];
        let d1 = describe(&img, &kps);
        let d2 = describe(&img, &kps);
        assert_eq!(d1, d2);
    }

    #[test]
    fn distinct_patches_differ() {
        let img = gaussian_blur(&textured(), 2.0);
        let kps = vec![
            Keypoint { p2d: Vec2::new(30.0, 30.0), response: 1.0 },
            Keypoint { p2d: Vec2::new(60.0, 55.0), response: 1.0 },
        ];
        let d = describe(&img, &kps);
        assert_ne!(d[0], d[1]);
    }
}
