//! Branch-consistent photometric perturbations.
//!
//! All randomness for one branch is sampled once into
//! [`PhotometricParams`] and then broadcast to every frame, so a branch's
//! frames stay mutually consistent: same flips, same jitter order and
//! factors, same blur, same solarization.
//!
//! The blur/solarize gates keep the source polarity: a gate draws
//! u ~ U(0,1) and applies its operation when `u >= threshold`. The
//! threshold names therefore read inverted: `blur_threshold = 0.1` means
//! blur is applied ~90% of the time. Do not "fix" this without flagging
//! calibration owners; the real apply rates depend on it.

use image::{imageops, RgbImage};
use palette::{FromColor, Hsv, RgbHue, Srgb};
use rand::{rngs::StdRng, seq::SliceRandom, Rng};

/// Blur sigma range used whenever the blur gate fires.
pub const BLUR_SIGMA_RANGE: (f32, f32) = (0.1, 2.0);

/// Solarization threshold in the u8 pixel domain (0.5 of the range).
pub const SOLARIZE_PIXEL_THRESHOLD: u8 = 128;

/// Per-branch gating profile for the stochastic stages.
#[derive(Debug, Clone, Copy)]
pub struct GateProfile {
    /// Blur applies when a uniform draw is >= this threshold.
    /// 0.0 means the blur always fires.
    pub blur_threshold: f64,
    /// Solarization applies when a uniform draw is >= this threshold;
    /// `None` disables solarization for the branch.
    pub solarize_threshold: Option<f64>,
}

/// One color-jitter operation; the sampled order permutes all four.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JitterOp {
    Brightness,
    Contrast,
    Saturation,
    Hue,
}

/// Sampled color-jitter parameters, shared by every frame in the branch.
#[derive(Debug, Clone, Copy)]
pub struct ColorJitter {
    pub order: [JitterOp; 4],
    /// Multiplicative factor in [0.6, 1.4]
    pub brightness: f32,
    /// Multiplicative factor in [0.6, 1.4]
    pub contrast: f32,
    /// Multiplicative factor in [0.6, 1.4]
    pub saturation: f32,
    /// Hue rotation in turns, in [-0.1, 0.1]
    pub hue: f32,
}

/// Fully sampled photometric parameters for one branch invocation.
#[derive(Debug, Clone, Copy)]
pub struct PhotometricParams {
    pub hflip: bool,
    pub vflip: bool,
    pub jitter: ColorJitter,
    /// Gaussian blur sigma; `None` when the gate did not fire
    pub blur_sigma: Option<f32>,
    pub solarize: bool,
}

impl PhotometricParams {
    /// Sample a branch's parameters. Draw order is fixed: flips, jitter
    /// permutation and factors, blur gate (+ sigma when it fires),
    /// solarize gate.
    pub fn sample(profile: &GateProfile, rng: &mut StdRng) -> Self {
        let hflip = rng.gen_bool(0.5);
        let vflip = rng.gen_bool(0.5);

        let mut order = [
            JitterOp::Brightness,
            JitterOp::Contrast,
            JitterOp::Saturation,
            JitterOp::Hue,
        ];
        order.shuffle(rng);
        let jitter = ColorJitter {
            order,
            brightness: rng.gen_range(0.6f32..=1.4),
            contrast: rng.gen_range(0.6f32..=1.4),
            saturation: rng.gen_range(0.6f32..=1.4),
            hue: rng.gen_range(-0.1f32..=0.1),
        };

        let blur_sigma = if rng.gen_range(0.0f64..1.0) >= profile.blur_threshold {
            Some(rng.gen_range(BLUR_SIGMA_RANGE.0..=BLUR_SIGMA_RANGE.1))
        } else {
            None
        };

        let solarize = match profile.solarize_threshold {
            Some(threshold) => rng.gen_range(0.0f64..1.0) >= threshold,
            None => false,
        };

        Self {
            hflip,
            vflip,
            jitter,
            blur_sigma,
            solarize,
        }
    }

    /// Apply the sampled parameters to every frame of a branch.
    pub fn apply(&self, frames: &mut [RgbImage]) {
        for frame in frames.iter_mut() {
            if self.hflip {
                *frame = imageops::flip_horizontal(frame);
            }
            if self.vflip {
                *frame = imageops::flip_vertical(frame);
            }
            for op in self.jitter.order {
                match op {
                    JitterOp::Brightness => adjust_brightness(frame, self.jitter.brightness),
                    JitterOp::Contrast => adjust_contrast(frame, self.jitter.contrast),
                    JitterOp::Saturation => adjust_saturation(frame, self.jitter.saturation),
                    JitterOp::Hue => adjust_hue(frame, self.jitter.hue),
                }
            }
            if let Some(sigma) = self.blur_sigma {
                *frame = imageops::blur(frame, sigma);
            }
            if self.solarize {
                solarize(frame);
            }
        }
    }
}

fn luma(p: &[u8; 3]) -> f32 {
    0.299 * p[0] as f32 + 0.587 * p[1] as f32 + 0.114 * p[2] as f32
}

fn clamp_u8(v: f32) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}

/// Scale every channel by `factor`.
pub fn adjust_brightness(img: &mut RgbImage, factor: f32) {
    for p in img.pixels_mut() {
        for c in 0..3 {
            p.0[c] = clamp_u8(p.0[c] as f32 * factor);
        }
    }
}

/// Blend every pixel toward the image's mean grayscale value.
pub fn adjust_contrast(img: &mut RgbImage, factor: f32) {
    let n = (img.width() * img.height()) as f32;
    let mean: f32 = img.pixels().map(|p| luma(&p.0)).sum::<f32>() / n;
    for p in img.pixels_mut() {
        for c in 0..3 {
            p.0[c] = clamp_u8(factor * p.0[c] as f32 + (1.0 - factor) * mean);
        }
    }
}

/// Blend every pixel toward its own grayscale value.
pub fn adjust_saturation(img: &mut RgbImage, factor: f32) {
    for p in img.pixels_mut() {
        let gray = luma(&p.0);
        for c in 0..3 {
            p.0[c] = clamp_u8(factor * p.0[c] as f32 + (1.0 - factor) * gray);
        }
    }
}

/// Rotate hue by `turns` (fraction of the full circle) in HSV space.
pub fn adjust_hue(img: &mut RgbImage, turns: f32) {
    let degrees = turns * 360.0;
    for p in img.pixels_mut() {
        let rgb = Srgb::new(
            p.0[0] as f32 / 255.0,
            p.0[1] as f32 / 255.0,
            p.0[2] as f32 / 255.0,
        );
        let mut hsv = Hsv::from_color(rgb);
        hsv.hue = RgbHue::from_degrees(hsv.hue.into_degrees() + degrees);
        let out = Srgb::from_color(hsv);
        p.0 = [
            clamp_u8(out.red * 255.0),
            clamp_u8(out.green * 255.0),
            clamp_u8(out.blue * 255.0),
        ];
    }
}

/// Invert every pixel at or above the fixed threshold.
pub fn solarize(img: &mut RgbImage) {
    for p in img.pixels_mut() {
        for c in 0..3 {
            if p.0[c] >= SOLARIZE_PIXEL_THRESHOLD {
                p.0[c] = 255 - p.0[c];
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;
    use rand::SeedableRng;

    #[test]
    fn brightness_scales_channels() {
        let mut img = RgbImage::from_pixel(2, 2, Rgb([100, 50, 200]));
        adjust_brightness(&mut img, 1.4);
        assert_eq!(img.get_pixel(0, 0).0, [140, 70, 255]);
    }

    #[test]
    fn saturation_zero_is_grayscale() {
        let mut img = RgbImage::from_pixel(2, 2, Rgb([255, 0, 0]));
        adjust_saturation(&mut img, 0.0);
        let p = img.get_pixel(0, 0).0;
        assert_eq!(p[0], p[1]);
        assert_eq!(p[1], p[2]);
    }

    #[test]
    fn hue_rotation_leaves_gray_untouched() {
        let mut img = RgbImage::from_pixel(2, 2, Rgb([77, 77, 77]));
        adjust_hue(&mut img, 0.1);
        assert_eq!(img.get_pixel(0, 0).0, [77, 77, 77]);
    }

    #[test]
    fn solarize_inverts_bright_pixels_only() {
        let mut img = RgbImage::new(2, 1);
        img.put_pixel(0, 0, Rgb([200, 127, 128]));
        img.put_pixel(1, 0, Rgb([0, 50, 255]));
        solarize(&mut img);
        assert_eq!(img.get_pixel(0, 0).0, [55, 127, 127]);
        assert_eq!(img.get_pixel(1, 0).0, [0, 50, 0]);
    }

    #[test]
    fn params_apply_identically_across_frames() {
        let profile = GateProfile {
            blur_threshold: 0.0,
            solarize_threshold: Some(0.2),
        };
        let mut rng = StdRng::seed_from_u64(42);
        let params = PhotometricParams::sample(&profile, &mut rng);

        let base = RgbImage::from_fn(16, 16, |x, y| Rgb([(x * 16) as u8, (y * 16) as u8, 80]));
        let mut frames = vec![base.clone(), base];
        params.apply(&mut frames);
        assert_eq!(frames[0], frames[1]);
    }

    #[test]
    fn zero_threshold_always_blurs() {
        let profile = GateProfile {
            blur_threshold: 0.0,
            solarize_threshold: None,
        };
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..50 {
            let params = PhotometricParams::sample(&profile, &mut rng);
            assert!(params.blur_sigma.is_some());
            assert!(!params.solarize);
        }
    }

    #[test]
    fn gate_polarity_is_apply_on_high_draw() {
        // threshold 0.5 must apply roughly half the time, never always
        let profile = GateProfile {
            blur_threshold: 0.5,
            solarize_threshold: None,
        };
        let mut rng = StdRng::seed_from_u64(9);
        let applied = (0..1000)
            .filter(|_| PhotometricParams::sample(&profile, &mut rng).blur_sigma.is_some())
            .count();
        assert!((350..=650).contains(&applied), "applied {} of 1000", applied);
    }
}
