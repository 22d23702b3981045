//! Fundamental types shared across the Kinetic-DINO crates.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Geometry of a composite input image: a vertical stack of fixed-size
/// camera frames captured as one tall image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompositeLayout {
    /// Width of the full composite in pixels
    pub composite_width: u32,
    /// Height of the full composite in pixels
    pub composite_height: u32,
    /// Width of a single camera frame
    pub tile_width: u32,
    /// Height of a single camera frame
    pub tile_height: u32,
}

impl Default for CompositeLayout {
    fn default() -> Self {
        Self {
            composite_width: 640,
            composite_height: 1920,
            tile_width: 640,
            tile_height: 480,
        }
    }
}

impl CompositeLayout {
    pub fn new(
        composite_width: u32,
        composite_height: u32,
        tile_width: u32,
        tile_height: u32,
    ) -> Result<Self> {
        let layout = Self {
            composite_width,
            composite_height,
            tile_width,
            tile_height,
        };
        layout.validate()?;
        Ok(layout)
    }

    /// Number of frames stacked in one composite.
    pub fn frame_count(&self) -> usize {
        ((self.composite_height / self.tile_height) * (self.composite_width / self.tile_width))
            as usize
    }

    /// Channel count of an assembled view: 3 RGB channels per frame plus
    /// 3 per difference image between consecutive frames.
    pub fn view_channels(&self) -> usize {
        3 * (2 * self.frame_count() - 1)
    }

    /// The composite dimensions must be exact multiples of the tile size;
    /// anything else would silently drop partial tiles downstream.
    pub fn validate(&self) -> Result<()> {
        if self.tile_width == 0
            || self.tile_height == 0
            || self.composite_width % self.tile_width != 0
            || self.composite_height % self.tile_height != 0
        {
            return Err(Error::FrameLayout {
                composite_width: self.composite_width,
                composite_height: self.composite_height,
                tile_width: self.tile_width,
                tile_height: self.tile_height,
            });
        }
        Ok(())
    }
}

/// A crop rectangle sampled once per augmentation branch and applied
/// identically to every frame of the sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CropRect {
    pub top: u32,
    pub left: u32,
    pub height: u32,
    pub width: u32,
}

impl CropRect {
    pub fn new(top: u32, left: u32, height: u32, width: u32) -> Self {
        Self {
            top,
            left,
            height,
            width,
        }
    }

    /// Whether the rectangle lies fully inside an image of the given size.
    pub fn fits(&self, width: u32, height: u32) -> bool {
        self.left + self.width <= width && self.top + self.height <= height
    }
}

/// Kind of augmented view produced by a branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ViewKind {
    /// High-resolution view (224x224); exactly two per sample.
    Global,
    /// Low-resolution view (96x96); zero or more per sample.
    Local,
}
