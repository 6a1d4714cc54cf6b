use serde::{Deserialize, Serialize};

use crate::imgproc::{GrayF32, gaussian_blur, resize_bilinear};

/// Per-pixel motion floor (units/frame) above which a pixel counts as moving.
pub const MOTION_FLOOR: f32 = 1.0;

/// Parameters of the pyramidal polynomial-expansion flow. The defaults are
/// the design values of the movement classifier and should not be changed
/// when comparing runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowParams {
    pub pyr_scale: f64,
    pub levels: usize,
    pub winsize: usize,
    pub iterations: usize,
    pub poly_n: usize,
    pub poly_sigma: f64,
}

impl Default for FlowParams {
    fn default() -> Self {
        Self {
            pyr_scale: 0.5,
            levels: 3,
            winsize: 15,
            iterations: 3,
            poly_n: 5,
            poly_sigma: 1.2,
        }
    }
}

/// Dense displacement field: content at (x, y) in the first image appears
/// at (x + u, y + v) in the second.
#[derive(Debug, Clone)]
pub struct FlowField {
    pub width: usize,
    pub height: usize,
    pub u: Vec<f32>,
    pub v: Vec<f32>,
}

impl FlowField {
    fn zeros(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            u: vec![0.0; width * height],
            v: vec![0.0; width * height],
        }
    }

    /// Per-pixel flow magnitude.
    pub fn magnitude(&self) -> Vec<f32> {
        self.u
            .iter()
            .zip(&self.v)
            .map(|(u, v)| (u * u + v * v).sqrt())
            .collect()
    }

    /// Percentage of pixels whose motion magnitude exceeds `floor`.
    pub fn moving_pixel_percent(&self, floor: f32) -> f64 {
        if self.u.is_empty() {
            return 0.0;
        }
        let moving = self
            .magnitude()
            .iter()
            .filter(|&&m| m > floor)
            .count();
        100.0 * moving as f64 / self.u.len() as f64
    }
}

/// Per-pixel quadratic fit f(x) ≈ c + b·x + xᵀAx over a Gaussian-weighted
/// neighborhood. Only the coefficients used by the displacement update are
/// kept: b = (b1, b2), A = [[a11, a12], [a12, a22]].
struct PolyExpansion {
    b1: Vec<f32>,
    b2: Vec<f32>,
    a11: Vec<f32>,
    a12: Vec<f32>,
    a22: Vec<f32>,
}

fn poly_expansion(img: &GrayF32, poly_n: usize, poly_sigma: f64) -> PolyExpansion {
    let n = (poly_n / 2) as isize;
    let g: Vec<f64> = {
        let raw: Vec<f64> = (-n..=n)
            .map(|i| (-(i * i) as f64 / (2.0 * poly_sigma * poly_sigma)).exp())
            .collect();
        let sum: f64 = raw.iter().sum();
        raw.into_iter().map(|v| v / sum).collect()
    };
    // moments of the normalized applicability
    let mu: f64 = g.iter().zip(-n..=n).map(|(w, i)| w * (i * i) as f64).sum();
    let nu: f64 = g
        .iter()
        .zip(-n..=n)
        .map(|(w, i)| w * (i * i * i * i) as f64)
        .sum();
    let numu = nu - mu * mu;

    let (w, h) = (img.width, img.height);
    // vertical pass: 0th, 1st and 2nd y-moments
    let mut t0 = vec![0.0f64; w * h];
    let mut t1 = vec![0.0f64; w * h];
    let mut t2 = vec![0.0f64; w * h];
    for y in 0..h {
        for x in 0..w {
            let (mut s0, mut s1, mut s2) = (0.0, 0.0, 0.0);
            for (k, &gk) in g.iter().enumerate() {
                let dy = k as isize - n;
                let v = img.at_clamped(x as isize, y as isize + dy) as f64;
                s0 += gk * v;
                s1 += gk * dy as f64 * v;
                s2 += gk * (dy * dy) as f64 * v;
            }
            let idx = y * w + x;
            t0[idx] = s0;
            t1[idx] = s1;
            t2[idx] = s2;
        }
    }

    let mut out = PolyExpansion {
        b1: vec![0.0; w * h],
        b2: vec![0.0; w * h],
        a11: vec![0.0; w * h],
        a12: vec![0.0; w * h],
        a22: vec![0.0; w * h],
    };
    let clamp_x = |x: isize| x.clamp(0, w as isize - 1) as usize;
    for y in 0..h {
        for x in 0..w {
            let (mut s0, mut sx, mut sy, mut sxx, mut syy, mut sxy) =
                (0.0, 0.0, 0.0, 0.0, 0.0, 0.0);
            for (k, &gk) in g.iter().enumerate() {
                let dx = k as isize - n;
                let col = clamp_x(x as isize + dx);
                let f0 = t0[y * w + col];
                let f1 = t1[y * w + col];
                let f2 = t2[y * w + col];
                s0 += gk * f0;
                sx += gk * dx as f64 * f0;
                sy += gk * f1;
                sxx += gk * (dx * dx) as f64 * f0;
                syy += gk * f2;
                sxy += gk * dx as f64 * f1;
            }
            // least squares against the basis {1, x, y, x², y², xy}; the
            // only coupling is between the constant and the squared terms
            let sum_sq = (sxx + syy - 2.0 * mu * s0) / numu;
            let diff_sq = (sxx - syy) / numu;
            let idx = y * w + x;
            out.b1[idx] = (sx / mu) as f32;
            out.b2[idx] = (sy / mu) as f32;
            out.a11[idx] = ((sum_sq + diff_sq) * 0.5) as f32;
            out.a22[idx] = ((sum_sq - diff_sq) * 0.5) as f32;
            out.a12[idx] = (sxy / (mu * mu) * 0.5) as f32;
        }
    }
    out
}

/// Per-pixel normal equations (G, h) of the displacement, using the prior
/// flow both to pick the comparison point in the second image and as the
/// expansion point of the constraint.
fn update_matrices(
    r1: &PolyExpansion,
    r2: &PolyExpansion,
    flow: &FlowField,
) -> [Vec<f32>; 5] {
    let (w, h) = (flow.width, flow.height);
    let mut m: [Vec<f32>; 5] = std::array::from_fn(|_| vec![0.0; w * h]);
    for y in 0..h {
        for x in 0..w {
            let idx = y * w + x;
            let du = flow.u[idx];
            let dv = flow.v[idx];
            let x1 = ((x as f32 + du).round() as isize).clamp(0, w as isize - 1) as usize;
            let y1 = ((y as f32 + dv).round() as isize).clamp(0, h as isize - 1) as usize;
            let idx2 = y1 * w + x1;

            let a11 = 0.5 * (r1.a11[idx] + r2.a11[idx2]);
            let a12 = 0.5 * (r1.a12[idx] + r2.a12[idx2]);
            let a22 = 0.5 * (r1.a22[idx] + r2.a22[idx2]);
            let db1 = 0.5 * (r1.b1[idx] - r2.b1[idx2]) + a11 * du + a12 * dv;
            let db2 = 0.5 * (r1.b2[idx] - r2.b2[idx2]) + a12 * du + a22 * dv;

            m[0][idx] = a11 * a11 + a12 * a12;
            m[1][idx] = a12 * (a11 + a22);
            m[2][idx] = a12 * a12 + a22 * a22;
            m[3][idx] = a11 * db1 + a12 * db2;
            m[4][idx] = a12 * db1 + a22 * db2;
        }
    }
    m
}

/// Separable box average with shrinking windows at the borders.
fn box_blur(field: &[f32], w: usize, h: usize, winsize: usize) -> Vec<f32> {
    let r = (winsize / 2) as isize;
    let mut tmp = vec![0.0f32; w * h];
    for y in 0..h {
        // horizontal prefix sums per row
        let row = &field[y * w..(y + 1) * w];
        let mut prefix = vec![0.0f64; w + 1];
        for x in 0..w {
            prefix[x + 1] = prefix[x] + row[x] as f64;
        }
        for x in 0..w as isize {
            let lo = (x - r).max(0) as usize;
            let hi = (x + r).min(w as isize - 1) as usize;
            tmp[y * w + x as usize] =
                ((prefix[hi + 1] - prefix[lo]) / (hi + 1 - lo) as f64) as f32;
        }
    }
    let mut out = vec![0.0f32; w * h];
    for x in 0..w {
        let mut prefix = vec![0.0f64; h + 1];
        for y in 0..h {
            prefix[y + 1] = prefix[y] + tmp[y * w + x] as f64;
        }
        for y in 0..h as isize {
            let lo = (y - r).max(0) as usize;
            let hi = (y + r).min(h as isize - 1) as usize;
            out[y as usize * w + x] =
                ((prefix[hi + 1] - prefix[lo]) / (hi + 1 - lo) as f64) as f32;
        }
    }
    out
}

fn solve_flow(m: &[Vec<f32>; 5], w: usize, h: usize) -> FlowField {
    let mut flow = FlowField::zeros(w, h);
    for idx in 0..w * h {
        let (g11, g12, g22) = (m[0][idx], m[1][idx], m[2][idx]);
        let (h1, h2) = (m[3][idx], m[4][idx]);
        // small regularizer keeps flat regions at zero instead of NaN
        let det = (g11 * g22 - g12 * g12) + 1e-3;
        flow.u[idx] = (g22 * h1 - g12 * h2) / det;
        flow.v[idx] = (g11 * h2 - g12 * h1) / det;
    }
    flow
}

/// Dense displacement field from `img1` to `img2` via coarse-to-fine
/// polynomial-expansion flow.
pub fn dense_flow(img1: &GrayF32, img2: &GrayF32, params: &FlowParams) -> FlowField {
    debug_assert_eq!(img1.width, img2.width);
    debug_assert_eq!(img1.height, img2.height);
    let mut flow: Option<FlowField> = None;

    for k in (0..params.levels).rev() {
        let scale = params.pyr_scale.powi(k as i32);
        let w = ((img1.width as f64 * scale).round() as usize).max(2);
        let h = ((img1.height as f64 * scale).round() as usize).max(2);

        // each level is cut from the full-resolution image, pre-smoothed in
        // proportion to the downscale factor
        let sigma_pre = ((1.0 / scale - 1.0) * 0.5) as f32;
        let level = |img: &GrayF32| -> GrayF32 {
            if k == 0 {
                img.clone()
            } else {
                resize_bilinear(&gaussian_blur(img, sigma_pre), w, h)
            }
        };
        let l1 = level(img1);
        let l2 = level(img2);

        let mut level_flow = match flow.take() {
            None => FlowField::zeros(w, h),
            Some(prev) => {
                let inv_scale = (1.0 / params.pyr_scale) as f32;
                let mut up = FlowField::zeros(w, h);
                let u_img = GrayF32 { width: prev.width, height: prev.height, data: prev.u };
                let v_img = GrayF32 { width: prev.width, height: prev.height, data: prev.v };
                up.u = resize_bilinear(&u_img, w, h)
                    .data
                    .iter()
                    .map(|v| v * inv_scale)
                    .collect();
                up.v = resize_bilinear(&v_img, w, h)
                    .data
                    .iter()
                    .map(|v| v * inv_scale)
                    .collect();
                up
            }
        };

        let r1 = poly_expansion(&l1, params.poly_n, params.poly_sigma);
        let r2 = poly_expansion(&l2, params.poly_n, params.poly_sigma);
        for _ in 0..params.iterations {
            let mut m = update_matrices(&r1, &r2, &level_flow);
            for field in &mut m {
                let blurred = box_blur(field, w, h, params.winsize);
                *field = blurred;
            }
            level_flow = solve_flow(&m, w, h);
        }
        flow = Some(level_flow);
    }

    flow.unwrap_or_else(|| FlowField::zeros(img1.width, img1.height))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Smooth 2D sinusoid texture, well behaved under the pyramid.
    fn sinusoid(width: usize, height: usize, shift_x: f32) -> GrayF32 {
        let mut img = GrayF32::new(width, height);
        for y in 0..height {
            for x in 0..width {
                let fx = (x as f32 - shift_x) / 17.0;
                let fy = y as f32 / 23.0;
                img.set(x, y, 128.0 + 60.0 * fx.sin() * fy.cos() + 30.0 * (fx * 0.7).cos());
            }
        }
        img
    }

    #[test]
    fn identical_frames_have_no_motion() {
        let img = sinusoid(96, 96, 0.0);
        let flow = dense_flow(&img, &img, &FlowParams::default());
        assert!(flow.moving_pixel_percent(MOTION_FLOOR) < 1.0);
    }

    #[test]
    fn recovers_horizontal_shift() {
        let img1 = sinusoid(96, 96, 0.0);
        let img2 = sinusoid(96, 96, 3.0);
        let flow = dense_flow(&img1, &img2, &FlowParams::default());
        // average over the interior, away from boundary effects
        let mut sum_u = 0.0;
        let mut sum_v = 0.0;
        let mut count = 0;
        for y in 20..76 {
            for x in 20..76 {
                sum_u += flow.u[y * 96 + x];
                sum_v += flow.v[y * 96 + x];
                count += 1;
            }
        }
        let mean_u = sum_u / count as f32;
        let mean_v = sum_v / count as f32;
        assert!((mean_u - 3.0).abs() < 1.0, "mean u = {}", mean_u);
        assert!(mean_v.abs() < 1.0, "mean v = {}", mean_v);
    }

    #[test]
    fn shifted_frames_have_high_moving_percent() {
        let img1 = sinusoid(96, 96, 0.0);
        let img2 = sinusoid(96, 96, 4.0);
        let flow = dense_flow(&img1, &img2, &FlowParams::default());
        assert!(flow.moving_pixel_percent(MOTION_FLOOR) > 50.0);
    }
}
