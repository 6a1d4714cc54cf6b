use crate::imgproc::GrayF32;

use super::Keypoint;

/// 4x4 spatial cells x 8 orientation bins.
pub const DESCRIPTOR_LEN: usize = 128;
pub const PATCH_RADIUS: isize = 8;

pub type FloatDescriptor = [f32; DESCRIPTOR_LEN];

const CELLS: isize = 4;
const BINS: usize = 8;
const NORM_CLAMP: f32 = 0.2;

/// Gradient-orientation-histogram descriptor over a 16x16 patch. Upright
/// (no dominant-orientation alignment); frame pairs from the same video
/// keep orientation between frames.
pub fn describe(smoothed: &GrayF32, keypoints: &[Keypoint]) -> Vec<FloatDescriptor> {
    let cell = (2 * PATCH_RADIUS / CELLS) as f32;
    let sigma = PATCH_RADIUS as f32;
    keypoints
        .iter()
        .map(|kp| {
            let cx = kp.p2d.x as isize;
            let cy = kp.p2d.y as isize;
            let mut hist = [0.0f32; DESCRIPTOR_LEN];
            for dy in -PATCH_RADIUS..PATCH_RADIUS {
                for dx in -PATCH_RADIUS..PATCH_RADIUS {
                    let x = cx + dx;
                    let y = cy + dy;
                    let gx = smoothed.at_clamped(x + 1, y) - smoothed.at_clamped(x - 1, y);
                    let gy = smoothed.at_clamped(x, y + 1) - smoothed.at_clamped(x, y - 1);
                    let mag = (gx * gx + gy * gy).sqrt();
                    if mag == 0.0 {
                        continue;
                    }
                    let weight =
                        (-((dx * dx + dy * dy) as f32) / (2.0 * sigma * sigma)).exp() * mag;
                    let angle = gy.atan2(gx).rem_euclid(std::f32::consts::TAU);
                    let bin_f = angle / std::f32::consts::TAU * BINS as f32;
                    let bin0 = bin_f.floor() as usize % BINS;
                    let frac = bin_f - bin_f.floor();

                    let col = (((dx + PATCH_RADIUS) as f32 / cell) as isize).min(CELLS - 1);
                    let row = (((dy + PATCH_RADIUS) as f32 / cell) as isize).min(CELLS - 1);
                    let base = ((row * CELLS + col) as usize) * BINS;
                    hist[base + bin0] += weight * (1.0 - frac);
                    hist[base + (bin0 + 1) % BINS] += weight * frac;
                }
            }
            normalize(&mut hist);
            hist
        })
        .collect()
}

fn normalize(hist: &mut [f32; DESCRIPTOR_LEN]) {
    let norm = hist.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for v in hist.iter_mut() {
            *v = (*v / norm).min(NORM_CLAMP);
        }
        let norm = hist.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in hist.iter_mut() {
                *v /= norm;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imgproc::gaussian_blur;
    use glam::Vec2;

    #[test]
    fn descriptor_is_unit_norm() {
        let mut img = GrayF32::new(64, 64);
        for y in 0..64 {
            for x in 0..64 {
                img.set(x, y, ((x * 5 + y * 11) % 83) as f32);
            }
        }
        let img = gaussian_blur(&img, 1.0);
        let kps = vec![Keypoint { p2d: Vec2::new(32.0, 32.0), response: 1.0 }];
        let d = describe(&img, &kps);
        let norm: f32 = d[0].iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4);
    }

    #[test]
    fn flat_patch_gives_zero_descriptor() {
        let img = GrayF32::new(64, 64);
        let kps = vec![Keypoint { p2d: Vec2::new(32.0, 32.0), response: 1.0 }];
        let d = describe(&img, &kps);
        assert!(d[0].iter().all(|&v| v == 0.0));
    }
}
