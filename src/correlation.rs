//! Pearson correlation over raw pixel buffers.
//!
//! Sums are accumulated in integers so that a constant buffer has exactly
//! zero variance; its correlation is undefined and reported as `None`.

use image::{GrayImage, Luma, RgbImage};

/// Running first and second moments of a `u8` buffer.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Moments {
    pub n: u64,
    pub sum: u64,
    pub sum_sq: u64,
}

impl Moments {
    pub fn of(values: &[u8]) -> Self {
        let mut m = Self::default();
        for &v in values {
            m.push(v);
        }
        m
    }

    #[inline]
    pub fn push(&mut self, v: u8) {
        let v = v as u64;
        self.n += 1;
        self.sum += v;
        self.sum_sq += v * v;
    }

    /// `n^2 * variance`, exact.
    fn scaled_variance(&self) -> i128 {
        self.n as i128 * self.sum_sq as i128 - self.sum as i128 * self.sum as i128
    }
}

/// Pearson coefficient from the moments of both series and their cross sum.
pub(crate) fn correlation_from_moments(a: &Moments, b: &Moments, sum_ab: u64) -> Option<f64> {
    if a.n != b.n || a.n == 0 {
        return None;
    }
    let var_a = a.scaled_variance();
    let var_b = b.scaled_variance();
    if var_a <= 0 || var_b <= 0 {
        return None;
    }
    let cov = a.n as i128 * sum_ab as i128 - a.sum as i128 * b.sum as i128;
    let r = cov as f64 / ((var_a as f64).sqrt() * (var_b as f64).sqrt());
    Some(r.clamp(-1.0, 1.0))
}

pub(crate) fn cross_sum(a: &[u8], b: &[u8]) -> u64 {
    a.iter().zip(b).map(|(&x, &y)| x as u64 * y as u64).sum()
}

/// Pearson correlation coefficient of two equally sized buffers.
///
/// Returns `None` when the lengths differ, the buffers are empty, or either
/// one is constant.
pub fn pearson(a: &[u8], b: &[u8]) -> Option<f64> {
    if a.len() != b.len() {
        return None;
    }
    correlation_from_moments(&Moments::of(a), &Moments::of(b), cross_sum(a, b))
}

/// Extract a single color channel as a grayscale image.
pub fn channel(rgb: &RgbImage, index: usize) -> GrayImage {
    let (w, h) = rgb.dimensions();
    let mut out = GrayImage::new(w, h);
    for (x, y, pixel) in rgb.enumerate_pixels() {
        out.put_pixel(x, y, Luma([pixel[index]]));
    }
    out
}

/// Drop `part` of the width and height (floored) from every edge.
///
/// Reference crops carry a border of the neighbouring cells when the grid is
/// slightly off; trimming leaves only the symbol body.
pub fn trim(image: &GrayImage, part: f32) -> GrayImage {
    let (w, h) = image.dimensions();
    let dx = ((w as f32 * part) as u32).min(w / 2);
    let dy = ((h as f32 * part) as u32).min(h / 2);
    image::imageops::crop_imm(image, dx, dy, w - 2 * dx, h - 2 * dy).to_image()
}

/// Slide `template` across `candidate` with the given step and return the
/// highest Pearson correlation over all window positions.
///
/// Window origins are `0, step, 2 * step, ...` in both axes for as long as the
/// window fits. Positions where the correlation is undefined are skipped;
/// `None` means no position produced a value (template larger than the
/// candidate, or constant images).
pub fn window_correlation(candidate: &GrayImage, template: &GrayImage, step: u32) -> Option<f64> {
    let (cw, ch) = candidate.dimensions();
    let (tw, th) = template.dimensions();
    if tw == 0 || th == 0 || tw > cw || th > ch {
        return None;
    }
    let step = step.max(1) as usize;
    let (cw, tw, th) = (cw as usize, tw as usize, th as usize);

    let tmpl = template.as_raw();
    let tmpl_moments = Moments::of(tmpl);
    if tmpl_moments.scaled_variance() <= 0 {
        return None;
    }
    let cand = candidate.as_raw();

    let mut best: Option<f64> = None;
    for y0 in (0..=ch as usize - th).step_by(step) {
        for x0 in (0..=cw - tw).step_by(step) {
            let mut window = Moments::default();
            let mut sum_wt = 0u64;
            for ty in 0..th {
                let row_start = (y0 + ty) * cw + x0;
                let row = &cand[row_start..row_start + tw];
                let trow = &tmpl[ty * tw..(ty + 1) * tw];
                for (&w, &t) in row.iter().zip(trow) {
                    window.push(w);
                    sum_wt += w as u64 * t as u64;
                }
            }

            if let Some(r) = correlation_from_moments(&window, &tmpl_moments, sum_wt)
                && best.is_none_or(|b| r > b)
            {
                best = Some(r);
            }
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_pearson_identical() {
        let a = [1u8, 5, 9, 20, 3];
        assert_relative_eq!(pearson(&a, &a).unwrap(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_pearson_inverted() {
        let a = [0u8, 50, 100, 150];
        let b = [150u8, 100, 50, 0];
        assert_relative_eq!(pearson(&a, &b).unwrap(), -1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_pearson_affine_invariant() {
        let a = [3u8, 7, 1, 9, 4];
        let b: Vec<u8> = a.iter().map(|v| v * 2 + 10).collect();
        assert_relative_eq!(pearson(&a, &b).unwrap(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_pearson_undefined() {
        assert_eq!(pearson(&[4, 4, 4], &[1, 2, 3]), None);
        assert_eq!(pearson(&[], &[]), None);
        assert_eq!(pearson(&[1, 2], &[1, 2, 3]), None);
    }

    #[test]
    fn test_channel_takes_first_component() {
        let rgb = RgbImage::from_fn(3, 2, |x, y| image::Rgb([x as u8, 100 + y as u8, 200]));
        let red = channel(&rgb, 0);
        assert_eq!(red.get_pixel(2, 1).0, [2]);
        let green = channel(&rgb, 1);
        assert_eq!(green.get_pixel(2, 1).0, [101]);
    }

    #[test]
    fn test_trim_floors_margin() {
        let img = GrayImage::from_fn(25, 40, |x, y| Luma([(x + y) as u8]));
        let trimmed = trim(&img, 0.1);
        // 2 px off each side horizontally, 4 px vertically
        assert_eq!(trimmed.dimensions(), (21, 32));
        assert_eq!(trimmed.get_pixel(0, 0).0, [6]);
    }

    #[test]
    fn test_trim_zero_keeps_image() {
        let img = GrayImage::new(8, 8);
        assert_eq!(trim(&img, 0.0).dimensions(), (8, 8));
    }

    #[test]
    fn test_window_correlation_finds_aligned_template() {
        let candidate = GrayImage::from_fn(30, 30, |x, y| Luma([((x * 37 + y * 91) % 251) as u8]));
        let template = image::imageops::crop_imm(&candidate, 6, 9, 12, 12).to_image();
        let score = window_correlation(&candidate, &template, 3).unwrap();
        assert_relative_eq!(score, 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_window_correlation_template_too_large() {
        let candidate = GrayImage::new(10, 10);
        let template = GrayImage::new(11, 5);
        assert_eq!(window_correlation(&candidate, &template, 3), None);
    }
}
