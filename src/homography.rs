use glam::Vec2;
use log::debug;
use nalgebra as na;
use rand::SeedableRng;
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;

/// Reprojection-error tolerance (pixels) for inlier classification.
pub const RANSAC_REPROJ_THRESHOLD: f64 = 5.0;
const RANSAC_MAX_ITERS: usize = 2000;
const RANSAC_CONFIDENCE: f64 = 0.995;
/// Fixed seed keeps repeated runs bit-identical.
const RANSAC_SEED: u64 = 0x6d76;

/// A fitted projective transform with its consensus mask. The mask is
/// index-aligned with the correspondence order passed to `find_homography`.
#[derive(Debug, Clone)]
pub struct Homography {
    pub matrix: na::Matrix3<f64>,
    pub inlier_mask: Vec<bool>,
}

impl Homography {
    /// Euclidean norm of the transform's translation column.
    pub fn translation_magnitude(&self) -> f64 {
        let tx = self.matrix[(0, 2)];
        let ty = self.matrix[(1, 2)];
        (tx * tx + ty * ty).sqrt()
    }

    /// Fraction of correspondences consistent with the transform.
    pub fn inlier_ratio(&self) -> f64 {
        let inliers = self.inlier_mask.iter().filter(|&&m| m).count();
        inliers as f64 / self.inlier_mask.len() as f64
    }
}

fn normalize_points(pts: &[Vec2]) -> Option<(Vec<na::Vector2<f64>>, na::Matrix3<f64>)> {
    let n = pts.len() as f64;
    let (cx, cy) = pts.iter().fold((0.0, 0.0), |(sx, sy), p| {
        (sx + p.x as f64, sy + p.y as f64)
    });
    let (cx, cy) = (cx / n, cy / n);
    let mean_dist = pts
        .iter()
        .map(|p| ((p.x as f64 - cx).powi(2) + (p.y as f64 - cy).powi(2)).sqrt())
        .sum::<f64>()
        / n;
    if mean_dist < 1e-9 {
        return None;
    }
    let scale = std::f64::consts::SQRT_2 / mean_dist;
    let normalized = pts
        .iter()
        .map(|p| {
            na::Vector2::new(
                (p.x as f64 - cx) * scale,
                (p.y as f64 - cy) * scale,
            )
        })
        .collect();
    let t = na::Matrix3::new(scale, 0.0, -scale * cx, 0.0, scale, -scale * cy, 0.0, 0.0, 1.0);
    Some((normalized, t))
}

/// Direct linear transform on normalized coordinates. Returns `None` for
/// rank-deficient systems or a vanishing scale entry.
fn fit_dlt(src: &[Vec2], dst: &[Vec2]) -> Option<na::Matrix3<f64>> {
    let n = src.len();
    if n < 4 {
        return None;
    }
    let (src_n, t_src) = normalize_points(src)?;
    let (dst_n, t_dst) = normalize_points(dst)?;

    let mut a = na::DMatrix::<f64>::zeros(2 * n, 9);
    for i in 0..n {
        let (x, y) = (src_n[i].x, src_n[i].y);
        let (u, v) = (dst_n[i].x, dst_n[i].y);
        a.row_mut(2 * i)
            .copy_from_slice(&[-x, -y, -1.0, 0.0, 0.0, 0.0, u * x, u * y, u]);
        a.row_mut(2 * i + 1)
            .copy_from_slice(&[0.0, 0.0, 0.0, -x, -y, -1.0, v * x, v * y, v]);
    }

    // null vector of A via the smallest eigenpair of AᵀA
    let ata = a.transpose() * &a;
    let eigen = na::SymmetricEigen::new(ata);
    let min_idx = eigen
        .eigenvalues
        .iter()
        .enumerate()
        .min_by(|a, b| a.1.total_cmp(b.1))
        .map(|(i, _)| i)?;
    let h = eigen.eigenvectors.column(min_idx);
    let h_norm = na::Matrix3::new(h[0], h[1], h[2], h[3], h[4], h[5], h[6], h[7], h[8]);

    let t_dst_inv = t_dst.try_inverse()?;
    let h_mat = t_dst_inv * h_norm * t_src;
    if h_mat[(2, 2)].abs() < 1e-10 {
        return None;
    }
    Some(h_mat / h_mat[(2, 2)])
}

fn reprojection_error(h_mat: &na::Matrix3<f64>, src: Vec2, dst: Vec2) -> f64 {
    let p = h_mat * na::Vector3::new(src.x as f64, src.y as f64, 1.0);
    if p[2].abs() < 1e-10 {
        return f64::INFINITY;
    }
    let dx = p[0] / p[2] - dst.x as f64;
    let dy = p[1] / p[2] - dst.y as f64;
    (dx * dx + dy * dy).sqrt()
}

fn inlier_mask(h_mat: &na::Matrix3<f64>, src: &[Vec2], dst: &[Vec2]) -> Vec<bool> {
    src.iter()
        .zip(dst)
        .map(|(&s, &d)| reprojection_error(h_mat, s, d) < RANSAC_REPROJ_THRESHOLD)
        .collect()
}

fn triple_area(a: Vec2, b: Vec2, c: Vec2) -> f32 {
    ((b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x)).abs()
}

/// A minimal sample is unusable when any three of its four points are
/// (near-)collinear, on either side of the correspondence.
fn sample_is_degenerate(pts: &[Vec2; 4]) -> bool {
    for skip in 0..4 {
        let kept: Vec<Vec2> = (0..4).filter(|&i| i != skip).map(|i| pts[i]).collect();
        if triple_area(kept[0], kept[1], kept[2]) < 1e-6 {
            return true;
        }
    }
    false
}

/// Robust consensus fit of a projective transform mapping `src` points to
/// `dst` points. Requires at least 4 correspondences; tolerates well over
/// half outliers. Returns `None` when no non-degenerate model exists,
/// a legitimate outcome for low-texture pairs rather than an error.
pub fn find_homography(src: &[Vec2], dst: &[Vec2]) -> Option<Homography> {
    let n = src.len();
    debug_assert_eq!(n, dst.len());
    if n < 4 {
        return None;
    }

    let mut rng = ChaCha8Rng::seed_from_u64(RANSAC_SEED);
    let mut indices: Vec<usize> = (0..n).collect();
    let mut best_count = 0usize;
    let mut best: Option<(na::Matrix3<f64>, Vec<bool>)> = None;

    let mut max_iters = RANSAC_MAX_ITERS;
    let mut iter = 0;
    while iter < max_iters {
        iter += 1;
        indices.shuffle(&mut rng);
        let sample_src = [src[indices[0]], src[indices[1]], src[indices[2]], src[indices[3]]];
        let sample_dst = [dst[indices[0]], dst[indices[1]], dst[indices[2]], dst[indices[3]]];
        if sample_is_degenerate(&sample_src) || sample_is_degenerate(&sample_dst) {
            continue;
        }
        let Some(h_mat) = fit_dlt(&sample_src, &sample_dst) else {
            continue;
        };
        let mask = inlier_mask(&h_mat, src, dst);
        let count = mask.iter().filter(|&&m| m).count();
        if count > best_count {
            best_count = count;
            best = Some((h_mat, mask));
            // adaptive stopping once the inlier ratio is known to be high
            let eps = count as f64 / n as f64;
            let denom = (1.0 - eps.powi(4)).max(1e-12).ln();
            if denom < 0.0 {
                let needed = ((1.0 - RANSAC_CONFIDENCE).ln() / denom).ceil() as usize;
                max_iters = max_iters.min(needed.max(1));
            }
        }
    }

    let (h_mat, mask) = best?;
    debug!("ransac: {}/{} inliers after {} iters", best_count, n, iter);

    // refit on the consensus set; fall back to the minimal-sample model
    // when the refit degenerates
    if best_count >= 4 {
        let inlier_src: Vec<Vec2> = src
            .iter()
            .zip(&mask)
            .filter_map(|(&p, &m)| m.then_some(p))
            .collect();
        let inlier_dst: Vec<Vec2> = dst
            .iter()
            .zip(&mask)
            .filter_map(|(&p, &m)| m.then_some(p))
            .collect();
        if let Some(refined) = fit_dlt(&inlier_src, &inlier_dst) {
            let refined_mask = inlier_mask(&refined, src, dst);
            return Some(Homography {
                matrix: refined,
                inlier_mask: refined_mask,
            });
        }
    }
    Some(Homography {
        matrix: h_mat,
        inlier_mask: mask,
    })
}
