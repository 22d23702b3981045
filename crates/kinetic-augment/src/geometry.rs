//! Shared-rectangle geometric crop sampling.

use image::{imageops, imageops::FilterType, RgbImage};
use kinetic_core::CropRect;
use rand::{rngs::StdRng, Rng};

/// Samples one random-resized-crop rectangle per branch invocation.
///
/// The rectangle is drawn from the first frame's dimensions and then
/// applied identically to every frame of the sequence; this identity
/// across frames is what makes the difference channels meaningful.
#[derive(Debug, Clone, Copy)]
pub struct CropSampler {
    /// Area fraction range of the original frame
    pub scale_range: (f64, f64),
    /// Aspect ratio window; near-square by default
    pub ratio_range: (f64, f64),
    /// Rejection-sampling attempts before the centered fallback
    pub attempts: usize,
}

impl Default for CropSampler {
    fn default() -> Self {
        Self {
            scale_range: (0.4, 1.0),
            ratio_range: (0.999, 1.001),
            attempts: 10,
        }
    }
}

impl CropSampler {
    pub fn new(scale_range: (f64, f64)) -> Self {
        Self {
            scale_range,
            ..Default::default()
        }
    }

    /// Draw a crop rectangle for a frame of the given size.
    ///
    /// Standard random-resized-crop procedure: a target area uniform in
    /// `scale_range` times the frame area and a log-uniform aspect ratio
    /// within `ratio_range`, rejected until the rectangle fits. If no
    /// attempt fits, falls back to a centered crop clamped to the aspect
    /// window.
    pub fn sample(&self, width: u32, height: u32, rng: &mut StdRng) -> CropRect {
        let area = (width as f64) * (height as f64);
        let (log_rmin, log_rmax) = (self.ratio_range.0.ln(), self.ratio_range.1.ln());

        for _ in 0..self.attempts {
            let target_area = area * rng.gen_range(self.scale_range.0..=self.scale_range.1);
            let aspect = rng.gen_range(log_rmin..=log_rmax).exp();

            let w = (target_area * aspect).sqrt().round() as u32;
            let h = (target_area / aspect).sqrt().round() as u32;

            if w > 0 && h > 0 && w <= width && h <= height {
                let top = rng.gen_range(0..=height - h);
                let left = rng.gen_range(0..=width - w);
                return CropRect::new(top, left, h, w);
            }
        }

        // Centered fallback, clamped to the aspect window
        let in_ratio = width as f64 / height as f64;
        let (w, h) = if in_ratio < self.ratio_range.0 {
            let w = width;
            (w, (w as f64 / self.ratio_range.0).round() as u32)
        } else if in_ratio > self.ratio_range.1 {
            let h = height;
            ((h as f64 * self.ratio_range.1).round() as u32, h)
        } else {
            (width, height)
        };
        CropRect::new((height - h) / 2, (width - w) / 2, h, w)
    }
}

/// Apply one crop rectangle to every frame and resize each result to the
/// branch's square target resolution with a bicubic-equivalent filter.
pub fn crop_and_resize(frames: &[RgbImage], rect: CropRect, target: u32) -> Vec<RgbImage> {
    frames
        .iter()
        .map(|frame| {
            let cropped =
                imageops::crop_imm(frame, rect.left, rect.top, rect.width, rect.height).to_image();
            imageops::resize(&cropped, target, target, FilterType::CatmullRom)
        })
        .collect()
}
