use glam::Vec2;

use crate::imgproc::GrayF32;

use super::Keypoint;

/// Bresenham circle of radius 3 used by the segment test.
const CIRCLE: [(isize, isize); 16] = [
    (0, -3),
    (1, -3),
    (2, -2),
    (3, -1),
    (3, 0),
    (3, 1),
    (2, 2),
    (1, 3),
    (0, 3),
    (-1, 3),
    (-2, 2),
    (-3, 1),
    (-3, 0),
    (-3, -1),
    (-2, -2),
    (-1, -3),
];

/// Minimum contiguous arc length for a FAST-9 corner.
const MIN_ARC: usize = 9;

fn longest_run(flags: &[bool; 16]) -> usize {
    // circular: scan a doubled sequence
    let mut best = 0;
    let mut run = 0;
    for i in 0..32 {
        if flags[i % 16] {
            run += 1;
            best = best.max(run);
        } else {
            run = 0;
        }
    }
    best.min(16)
}

fn corner_score(img: &GrayF32, x: usize, y: usize, threshold: f32) -> f32 {
    let center = img.at(x, y);
    CIRCLE
        .iter()
        .map(|&(dx, dy)| {
            let v = img.at((x as isize + dx) as usize, (y as isize + dy) as usize);
            ((v - center).abs() - threshold).max(0.0)
        })
        .sum()
}

/// FAST-9 segment-test corners with 3x3 non-max suppression, ranked by
/// response and capped at `max_features`. Keypoints closer than `margin`
/// to any border are discarded so descriptor patches stay in bounds.
pub fn detect_corners(
    img: &GrayF32,
    threshold: f32,
    margin: usize,
    max_features: usize,
) -> Vec<Keypoint> {
    let margin = margin.max(3);
    if img.width <= 2 * margin || img.height <= 2 * margin {
        return Vec::new();
    }
    let mut scores = vec![0.0f32; img.width * img.height];
    for y in margin..img.height - margin {
        for x in margin..img.width - margin {
            let center = img.at(x, y);
            let mut brighter = [false; 16];
            let mut darker = [false; 16];
            for (i, &(dx, dy)) in CIRCLE.iter().enumerate() {
                let v = img.at((x as isize + dx) as usize, (y as isize + dy) as usize);
                brighter[i] = v > center + threshold;
                darker[i] = v < center - threshold;
            }
            if longest_run(&brighter) >= MIN_ARC || longest_run(&darker) >= MIN_ARC {
                scores[y * img.width + x] = corner_score(img, x, y, threshold);
            }
        }
    }

    let mut keypoints = Vec::new();
    for y in margin..img.height - margin {
        for x in margin..img.width - margin {
            let s = scores[y * img.width + x];
            if s <= 0.0 {
                continue;
            }
            let mut is_max = true;
            'nms: for dy in -1isize..=1 {
                for dx in -1isize..=1 {
                    if dx == 0 && dy == 0 {
                        continue;
                    }
                    let nx = (x as isize + dx) as usize;
                    let ny = (y as isize + dy) as usize;
                    if scores[ny * img.width + nx] > s {
                        is_max = false;
                        break 'nms;
                    }
                }
            }
            if is_max {
                keypoints.push(Keypoint {
                    p2d: Vec2::new(x as f32, y as f32),
                    response: s,
                });
            }
        }
    }

    keypoints.sort_by(|a, b| {
        b.response
            .total_cmp(&a.response)
            .then(a.p2d.y.total_cmp(&b.p2d.y))
            .then(a.p2d.x.total_cmp(&b.p2d.x))
    });
    keypoints.truncate(max_features);
    keypoints
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square_image() -> GrayF32 {
        let mut img = GrayF32::new(64, 64);
        for y in 20..44 {
            for x in 20..44 {
                img.set(x, y, 200.0);
            }
        }
        img
    }

    #[test]
    fn finds_square_corners() {
        let kps = detect_corners(&square_image(), 20.0, 3, 100);
        assert!(!kps.is_empty());
        // every detection sits near one of the four square corners
        for kp in &kps {
            let near = [(20.0, 20.0), (43.0, 20.0), (20.0, 43.0), (43.0, 43.0)]
                .iter()
                .any(|&(cx, cy): &(f32, f32)| {
                    (kp.p2d.x - cx).abs() <= 3.0 && (kp.p2d.y - cy).abs() <= 3.0
                });
            assert!(near, "unexpected corner at {:?}", kp.p2d);
        }
    }

    #[test]
    fn flat_image_has_no_corners() {
        let img = GrayF32::new(64, 64);
        assert!(detect_corners(&img, 20.0, 3, 100).is_empty());
    }

    #[test]
    fn cap_limits_count() {
        use rand::{Rng, SeedableRng};
        let mut rng = rand_chacha::ChaCha8Rng::seed_from_u64(7);
        // random 8x8 blocks, plenty of L-shaped junction corners
        let mut img = GrayF32::new(128, 128);
        let blocks: Vec<f32> = (0..16 * 16).map(|_| rng.random_range(0.0..255.0)).collect();
        for y in 0..128 {
            for x in 0..128 {
                img.set(x, y, blocks[(y / 8) * 16 + x / 8]);
            }
        }
        let all = detect_corners(&img, 20.0, 3, 10_000);
        assert!(all.len() > 10);
        let capped = detect_corners(&img, 20.0, 3, 10);
        assert_eq!(capped.len(), 10);
        // the cap keeps the strongest responses
        assert!(capped[0].response >= capped[9].response);
    }
}
