use image::{DynamicImage, GrayImage};
use nalgebra as na;

/// Row-major single-channel f32 raster. Pixel (x, y) = data[y * width + x].
#[derive(Debug, Clone)]
pub struct GrayF32 {
    pub width: usize,
    pub height: usize,
    pub data: Vec<f32>,
}

impl GrayF32 {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![0.0; width * height],
        }
    }

    pub fn from_luma8(img: &GrayImage) -> Self {
        Self {
            width: img.width() as usize,
            height: img.height() as usize,
            data: img.as_raw().iter().map(|&v| v as f32).collect(),
        }
    }

    pub fn from_dynamic(img: &DynamicImage) -> Self {
        Self::from_luma8(&img.to_luma8())
    }

    #[inline]
    pub fn at(&self, x: usize, y: usize) -> f32 {
        self.data[y * self.width + x]
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, v: f32) {
        self.data[y * self.width + x] = v;
    }

    /// Value at (x, y) with replicated borders.
    #[inline]
    pub fn at_clamped(&self, x: isize, y: isize) -> f32 {
        let x = x.clamp(0, self.width as isize - 1) as usize;
        let y = y.clamp(0, self.height as isize - 1) as usize;
        self.at(x, y)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Bilinear sample at a sub-pixel position. Out-of-bounds reads return
/// `fill` (everything beyond the outer pixel centers counts as outside).
pub fn sample_bilinear(img: &GrayF32, x: f32, y: f32, fill: f32) -> f32 {
    if x < 0.0 || y < 0.0 || x > (img.width - 1) as f32 || y > (img.height - 1) as f32 {
        return fill;
    }
    let x0 = x.floor() as usize;
    let y0 = y.floor() as usize;
    let x1 = (x0 + 1).min(img.width - 1);
    let y1 = (y0 + 1).min(img.height - 1);
    let fx = x - x0 as f32;
    let fy = y - y0 as f32;
    let top = img.at(x0, y0) * (1.0 - fx) + img.at(x1, y0) * fx;
    let bot = img.at(x0, y1) * (1.0 - fx) + img.at(x1, y1) * fx;
    top * (1.0 - fy) + bot * fy
}

fn gaussian_kernel_1d(sigma: f32) -> Vec<f32> {
    let radius = (sigma * 3.0).ceil().max(1.0) as isize;
    let mut kernel: Vec<f32> = (-radius..=radius)
        .map(|i| (-(i * i) as f32 / (2.0 * sigma * sigma)).exp())
        .collect();
    let sum: f32 = kernel.iter().sum();
    for v in &mut kernel {
        *v /= sum;
    }
    kernel
}

/// Separable Gaussian blur with replicated borders.
pub fn gaussian_blur(img: &GrayF32, sigma: f32) -> GrayF32 {
    if sigma <= 0.0 {
        return img.clone();
    }
    let kernel = gaussian_kernel_1d(sigma);
    let radius = (kernel.len() / 2) as isize;
    let mut tmp = GrayF32::new(img.width, img.height);
    for y in 0..img.height {
        for x in 0..img.width {
            let mut acc = 0.0;
            for (k, w) in kernel.iter().enumerate() {
                acc += w * img.at_clamped(x as isize + k as isize - radius, y as isize);
            }
            tmp.set(x, y, acc);
        }
    }
    let mut out = GrayF32::new(img.width, img.height);
    for y in 0..img.height {
        for x in 0..img.width {
            let mut acc = 0.0;
            for (k, w) in kernel.iter().enumerate() {
                acc += w * tmp.at_clamped(x as isize, y as isize + k as isize - radius);
            }
            out.set(x, y, acc);
        }
    }
    out
}

/// Bilinear resize to an explicit target size.
pub fn resize_bilinear(img: &GrayF32, width: usize, height: usize) -> GrayF32 {
    let mut out = GrayF32::new(width, height);
    let sx = img.width as f32 / width as f32;
    let sy = img.height as f32 / height as f32;
    for y in 0..height {
        for x in 0..width {
            // map the destination pixel center into the source grid
            let src_x = ((x as f32 + 0.5) * sx - 0.5).clamp(0.0, (img.width - 1) as f32);
            let src_y = ((y as f32 + 0.5) * sy - 0.5).clamp(0.0, (img.height - 1) as f32);
            out.set(x, y, sample_bilinear(img, src_x, src_y, 0.0));
        }
    }
    out
}

/// Warp `img` into the coordinate frame of the transform's source plane:
/// out(p) = img(H * p). With H fitted from frame-1 points to frame-2 points
/// and `img` = frame 2, the output is frame 2 re-rendered on frame 1's
/// pixel grid. Out-of-bounds samples are filled with 0.
pub fn warp_to_source_frame(img: &GrayF32, h_mat: &na::Matrix3<f64>) -> GrayF32 {
    let mut out = GrayF32::new(img.width, img.height);
    for y in 0..img.height {
        for x in 0..img.width {
            let p = h_mat * na::Vector3::new(x as f64, y as f64, 1.0);
            if p[2].abs() < 1e-12 {
                continue;
            }
            let sx = (p[0] / p[2]) as f32;
            let sy = (p[1] / p[2]) as f32;
            out.set(x, y, sample_bilinear(img, sx, sy, 0.0));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(width: usize, height: usize) -> GrayF32 {
        let mut img = GrayF32::new(width, height);
        for y in 0..height {
            for x in 0..width {
                img.set(x, y, (x * 2 + y) as f32);
            }
        }
        img
    }

    #[test]
    fn bilinear_midpoint() {
        let img = ramp(8, 8);
        let v = sample_bilinear(&img, 2.5, 3.0, 0.0);
        assert!((v - 8.0).abs() < 1e-5);
    }

    #[test]
    fn blur_preserves_constant() {
        let mut img = GrayF32::new(16, 16);
        img.data.fill(42.0);
        let out = gaussian_blur(&img, 1.5);
        for &v in &out.data {
            assert!((v - 42.0).abs() < 1e-3);
        }
    }

    #[test]
    fn warp_identity_is_noop() {
        let img = ramp(12, 10);
        let warped = warp_to_source_frame(&img, &na::Matrix3::identity());
        for (a, b) in img.data.iter().zip(&warped.data) {
            assert!((a - b).abs() < 1e-4);
        }
    }

    #[test]
    fn warp_translation_shifts_content() {
        let img = ramp(16, 16);
        // H maps source-frame points to img points: p_img = p_src + (3, 0).
        let mut h_mat = na::Matrix3::identity();
        h_mat[(0, 2)] = 3.0;
        let warped = warp_to_source_frame(&img, &h_mat);
        // warped(x, y) == img(x + 3, y) away from the border
        for y in 0..16 {
            for x in 0..12 {
                assert!((warped.at(x, y) - img.at(x + 3, y)).abs() < 1e-4);
            }
        }
    }
}
