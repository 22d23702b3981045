//! View tensor assembly.

use candle_core::{Device, Tensor};
use image::RgbImage;
use kinetic_core::Result;

/// Per-channel normalization statistics (ImageNet).
pub const NORM_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
pub const NORM_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Interleave normalized frames and difference images into one view tensor.
///
/// Frames are normalized with the ImageNet mean/std per RGB channel;
/// difference images use zero mean with the same std (they already encode
/// signed differences shifted by the fixed offset). The output iterates
/// frames from last to first with the matching difference between
/// consecutive frames:
///
/// `frame[F-1], diff[F-2], frame[F-2], ..., diff[0], frame[0]`
///
/// each contributing 3 channels, for a final shape of (3*(2F-1), H, W).
/// Channel index 0 is the last frame. The downstream network's channel
/// semantics depend on this exact order.
pub fn assemble_view(frames: &[RgbImage], diffs: &[RgbImage], device: &Device) -> Result<Tensor> {
    debug_assert_eq!(diffs.len() + 1, frames.len());
    let (width, height) = frames[0].dimensions();
    let (w, h) = (width as usize, height as usize);
    let channels = 3 * (frames.len() + diffs.len());

    let mut data = Vec::with_capacity(channels * h * w);
    for k in (0..frames.len()).rev() {
        push_planes(&mut data, &frames[k], NORM_MEAN, NORM_STD);
        if k > 0 {
            push_planes(&mut data, &diffs[k - 1], [0.0; 3], NORM_STD);
        }
    }

    Ok(Tensor::from_vec(data, (channels, h, w), device)?)
}

/// Append one image as three normalized channel planes in CHW order.
fn push_planes(data: &mut Vec<f32>, img: &RgbImage, mean: [f32; 3], std: [f32; 3]) {
    for c in 0..3 {
        for p in img.pixels() {
            data.push((p.0[c] as f32 / 255.0 - mean[c]) / std[c]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn solid(v: [u8; 3], size: u32) -> RgbImage {
        RgbImage::from_pixel(size, size, Rgb(v))
    }

    #[test]
    fn channel_count_is_three_times_2f_minus_1() -> Result<()> {
        let frames: Vec<_> = (0..4u8).map(|i| solid([i * 10; 3], 8)).collect();
        let diffs: Vec<_> = (0..3u8).map(|i| solid([i; 3], 8)).collect();
        let view = assemble_view(&frames, &diffs, &Device::Cpu)?;
        assert_eq!(view.dims(), &[21, 8, 8]);
        Ok(())
    }

    #[test]
    fn deinterleave_recovers_inputs() -> Result<()> {
        let frames: Vec<_> = (0..3u8).map(|i| solid([100 + i * 20, 50, 10], 4)).collect();
        let diffs: Vec<_> = (0..2u8).map(|i| solid([i * 5 + 2, 2, 2], 4)).collect();
        let view = assemble_view(&frames, &diffs, &Device::Cpu)?;
        assert_eq!(view.dims(), &[15, 4, 4]);

        // block b covers channels 3b..3b+3; frame k lives at block 2*(F-1-k),
        // diff j at block 2*(F-1-j)-1
        let f = frames.len();
        for (k, frame) in frames.iter().enumerate() {
            let block = 2 * (f - 1 - k);
            let plane = view.narrow(0, 3 * block, 3)?;
            for c in 0..3 {
                let got: f32 = plane.narrow(0, c, 1)?.mean_all()?.to_scalar()?;
                let want = (frame.get_pixel(0, 0).0[c] as f32 / 255.0 - NORM_MEAN[c]) / NORM_STD[c];
                assert!((got - want).abs() < 1e-6, "frame {} channel {}", k, c);
            }
        }
        for (j, diff) in diffs.iter().enumerate() {
            let block = 2 * (f - 1 - j) - 1;
            let plane = view.narrow(0, 3 * block, 3)?;
            for c in 0..3 {
                let got: f32 = plane.narrow(0, c, 1)?.mean_all()?.to_scalar()?;
                let want = (diff.get_pixel(0, 0).0[c] as f32 / 255.0) / NORM_STD[c];
                assert!((got - want).abs() < 1e-6, "diff {} channel {}", j, c);
            }
        }
        Ok(())
    }

    #[test]
    fn channel_zero_is_last_frame() -> Result<()> {
        let frames = vec![solid([0; 3], 4), solid([255; 3], 4)];
        let diffs = vec![solid([2; 3], 4)];
        let view = assemble_view(&frames, &diffs, &Device::Cpu)?;
        let first: f32 = view.narrow(0, 0, 1)?.mean_all()?.to_scalar()?;
        let want = (1.0 - NORM_MEAN[0]) / NORM_STD[0];
        assert!((first - want).abs() < 1e-6);
        Ok(())
    }
}
