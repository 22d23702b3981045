//! Multi-view branch orchestration.

use candle_core::{Device, Tensor};
use image::RgbImage;
use kinetic_core::{CropConfig, Error, Result, ViewKind};
use rand::rngs::StdRng;

use crate::assemble::assemble_view;
use crate::diff::encode_differences;
use crate::geometry::{crop_and_resize, CropSampler};
use crate::photometric::{GateProfile, PhotometricParams};
use crate::splitter::FrameSplitter;

/// Output resolution of a global view.
pub const GLOBAL_VIEW_SIZE: u32 = 224;
/// Output resolution of a local view.
pub const LOCAL_VIEW_SIZE: u32 = 96;

/// One augmentation branch: a view kind, target resolution, crop scale
/// range, and the stochastic gate profile for blur/solarization.
#[derive(Debug, Clone, Copy)]
pub struct BranchProfile {
    pub kind: ViewKind,
    pub output_size: u32,
    pub scale_range: (f64, f64),
    pub gates: GateProfile,
}

/// Produces the full list of views for one composite image.
///
/// Every sample yields exactly two global views with distinct
/// blur/solarization policies followed by `local_crops_number` local
/// views. Each branch samples its own crop rectangle and photometric
/// parameters; sharing happens only across the frames *within* a branch.
#[derive(Debug, Clone)]
pub struct MultiViewPolicy {
    splitter: FrameSplitter,
    global_1: BranchProfile,
    global_2: BranchProfile,
    local: BranchProfile,
    local_crops_number: usize,
    device: Device,
}

impl MultiViewPolicy {
    pub fn new(config: &CropConfig) -> Result<Self> {
        let (gmin, gmax) = config.global_crops_scale;
        let (lmin, lmax) = config.local_crops_scale;
        if !(0.0 < gmin && gmin <= gmax && gmax <= 1.0) {
            return Err(Error::Config(format!(
                "invalid global crop scale range ({gmin}, {gmax})"
            )));
        }
        if !(0.0 < lmin && lmin <= lmax && lmax <= 1.0) {
            return Err(Error::Config(format!(
                "invalid local crop scale range ({lmin}, {lmax})"
            )));
        }

        Ok(Self {
            splitter: FrameSplitter::new(config.layout)?,
            // first global branch: blur always fires, no solarization
            global_1: BranchProfile {
                kind: ViewKind::Global,
                output_size: GLOBAL_VIEW_SIZE,
                scale_range: config.global_crops_scale,
                gates: GateProfile {
                    blur_threshold: 0.0,
                    solarize_threshold: None,
                },
            },
            // second global branch: blur gated at 0.1, solarize gated at 0.2
            // (apply-on-high-draw polarity, see photometric module docs)
            global_2: BranchProfile {
                kind: ViewKind::Global,
                output_size: GLOBAL_VIEW_SIZE,
                scale_range: config.global_crops_scale,
                gates: GateProfile {
                    blur_threshold: 0.1,
                    solarize_threshold: Some(0.2),
                },
            },
            local: BranchProfile {
                kind: ViewKind::Local,
                output_size: LOCAL_VIEW_SIZE,
                scale_range: config.local_crops_scale,
                gates: GateProfile {
                    blur_threshold: 0.5,
                    solarize_threshold: None,
                },
            },
            local_crops_number: config.local_crops_number,
            device: Device::Cpu,
        })
    }

    /// Number of views per sample: 2 global + N local.
    pub fn views_per_sample(&self) -> usize {
        2 + self.local_crops_number
    }

    /// Generate all views for one composite image.
    ///
    /// # Errors
    /// Propagates the splitter's shape mismatch; the caller chooses
    /// between skipping the sample and aborting.
    pub fn views(&self, composite: &RgbImage, rng: &mut StdRng) -> Result<Vec<Tensor>> {
        let frames = self.splitter.split(composite)?;

        let mut views = Vec::with_capacity(self.views_per_sample());
        views.push(self.branch(&frames, &self.global_1, rng)?);
        views.push(self.branch(&frames, &self.global_2, rng)?);
        for _ in 0..self.local_crops_number {
            views.push(self.branch(&frames, &self.local, rng)?);
        }
        Ok(views)
    }

    /// Run one branch: shared crop, differences on the raw geometry, then
    /// the shared photometric stage, then assembly.
    fn branch(
        &self,
        frames: &[RgbImage],
        profile: &BranchProfile,
        rng: &mut StdRng,
    ) -> Result<Tensor> {
        let sampler = CropSampler::new(profile.scale_range);
        let (width, height) = frames[0].dimensions();
        let rect = sampler.sample(width, height, rng);

        let mut cropped = crop_and_resize(frames, rect, profile.output_size);
        let diffs = encode_differences(&cropped);

        let params = PhotometricParams::sample(&profile.gates, rng);
        params.apply(&mut cropped);

        assemble_view(&cropped, &diffs, &self.device)
    }

    pub fn splitter(&self) -> &FrameSplitter {
        &self.splitter
    }
}
