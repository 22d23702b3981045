//! Inter-frame difference channels.

use image::RgbImage;

/// Offset added to raw pixel differences so small negative motion survives
/// the clamp to the u8 range.
pub const DIFF_OFFSET: i16 = 2;

/// Compute pairwise differences between consecutive frames.
///
/// For i in 0..F-1: `diff[i] = clamp(frame[i] - frame[i+1] + 2, 0, 255)`
/// per channel at full bit depth. Must run on the freshly cropped and
/// resized frames, before flips and the photometric stage: the motion
/// signal reflects raw structure, not color-jittered content, and keeps
/// the pre-flip geometry.
pub fn encode_differences(frames: &[RgbImage]) -> Vec<RgbImage> {
    frames
        .windows(2)
        .map(|pair| subtract_with_offset(&pair[0], &pair[1]))
        .collect()
}

fn subtract_with_offset(a: &RgbImage, b: &RgbImage) -> RgbImage {
    let (width, height) = a.dimensions();
    let mut out = RgbImage::new(width, height);
    for (pa, (pb, po)) in a.pixels().zip(b.pixels().zip(out.pixels_mut())) {
        for c in 0..3 {
            let v = pa.0[c] as i16 - pb.0[c] as i16 + DIFF_OFFSET;
            po.0[c] = v.clamp(0, 255) as u8;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn identical_frames_give_constant_offset() {
        let frame = RgbImage::from_pixel(8, 8, Rgb([100, 150, 200]));
        let diffs = encode_differences(&[frame.clone(), frame]);
        assert_eq!(diffs.len(), 1);
        assert!(diffs[0].pixels().all(|p| p.0 == [2, 2, 2]));
    }

    #[test]
    fn difference_clamps_to_pixel_range() {
        let bright = RgbImage::from_pixel(4, 4, Rgb([255, 255, 255]));
        let dark = RgbImage::from_pixel(4, 4, Rgb([0, 0, 0]));

        // 255 - 0 + 2 clamps to 255
        let up = encode_differences(&[bright.clone(), dark.clone()]);
        assert!(up[0].pixels().all(|p| p.0 == [255, 255, 255]));

        // 0 - 255 + 2 clamps to 0
        let down = encode_differences(&[dark, bright]);
        assert!(down[0].pixels().all(|p| p.0 == [0, 0, 0]));
    }

    #[test]
    fn produces_one_fewer_than_frame_count() {
        let frames: Vec<_> = (0..4)
            .map(|i| RgbImage::from_pixel(4, 4, Rgb([i * 10, 0, 0])))
            .collect();
        let diffs = encode_differences(&frames);
        assert_eq!(diffs.len(), 3);
        // frame[i] - frame[i+1] = -10, shifted by 2 and clamped to 0
        assert!(diffs.iter().all(|d| d.get_pixel(0, 0).0[0] == 0));
    }
}
