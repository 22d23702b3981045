//! Composite image slicing.

use image::{imageops, RgbImage};
use kinetic_core::{CompositeLayout, Error, Result};

/// Splits a composite image into its fixed-size camera frames.
///
/// Frames are extracted in row-major order, top to bottom, and the order
/// is meaningful: later pipeline stages diff consecutive frames. A
/// composite whose dimensions do not match the configured layout is an
/// error, never a silent truncation; the caller decides whether to skip
/// the sample or abort.
#[derive(Debug, Clone, Copy)]
pub struct FrameSplitter {
    layout: CompositeLayout,
}

impl FrameSplitter {
    pub fn new(layout: CompositeLayout) -> Result<Self> {
        layout.validate()?;
        Ok(Self { layout })
    }

    /// Slice the composite into `layout.frame_count()` tiles.
    ///
    /// # Errors
    /// `Error::CompositeShape` when the input dimensions differ from the
    /// configured composite size.
    pub fn split(&self, composite: &RgbImage) -> Result<Vec<RgbImage>> {
        let (width, height) = composite.dimensions();
        if width != self.layout.composite_width || height != self.layout.composite_height {
            return Err(Error::CompositeShape {
                expected_width: self.layout.composite_width,
                expected_height: self.layout.composite_height,
                width,
                height,
            });
        }

        let tw = self.layout.tile_width;
        let th = self.layout.tile_height;
        let mut frames = Vec::with_capacity(self.layout.frame_count());
        for y in (0..height).step_by(th as usize) {
            for x in (0..width).step_by(tw as usize) {
                frames.push(imageops::crop_imm(composite, x, y, tw, th).to_image());
            }
        }
        Ok(frames)
    }

    pub fn layout(&self) -> &CompositeLayout {
        &self.layout
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    /// Composite with a distinct solid color per 480-row band.
    fn banded_composite() -> RgbImage {
        RgbImage::from_fn(640, 1920, |_, y| {
            let band = (y / 480) as u8;
            Rgb([band * 60, 255 - band * 60, band])
        })
    }

    #[test]
    fn splits_default_layout_into_four_frames() {
        let splitter = FrameSplitter::new(CompositeLayout::default()).unwrap();
        let frames = splitter.split(&banded_composite()).unwrap();
        assert_eq!(frames.len(), 4);

        for (i, frame) in frames.iter().enumerate() {
            assert_eq!(frame.dimensions(), (640, 480));
            let expected = Rgb([i as u8 * 60, 255 - i as u8 * 60, i as u8]);
            // exact pixel equality against the reference sub-region
            assert!(frame.pixels().all(|p| *p == expected), "frame {} mismatch", i);
        }
    }

    #[test]
    fn preserves_frame_order() {
        let composite = RgbImage::from_fn(640, 1920, |_, y| Rgb([(y / 480) as u8, 0, 0]));
        let splitter = FrameSplitter::new(CompositeLayout::default()).unwrap();
        let frames = splitter.split(&composite).unwrap();
        for (i, frame) in frames.iter().enumerate() {
            assert_eq!(frame.get_pixel(0, 0).0[0], i as u8);
        }
    }

    #[test]
    fn rejects_wrong_composite_size() {
        let splitter = FrameSplitter::new(CompositeLayout::default()).unwrap();
        let wrong = RgbImage::new(640, 1919);
        assert!(matches!(
            splitter.split(&wrong),
            Err(Error::CompositeShape { height: 1919, .. })
        ));
    }

    #[test]
    fn rejects_non_multiple_layout_at_construction() {
        let layout = CompositeLayout {
            composite_width: 641,
            composite_height: 1920,
            tile_width: 640,
            tile_height: 480,
        };
        assert!(FrameSplitter::new(layout).is_err());
    }
}
