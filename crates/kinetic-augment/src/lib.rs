//! # Kinetic-Augment
//!
//! Multi-view, multi-frame data augmentation for self-distillation
//! training on composite camera images.
//!
//! One composite image (a vertical stack of camera frames) becomes several
//! independently augmented "views". Within a view, every frame shares the
//! same crop rectangle and the same photometric perturbation, so that the
//! inter-frame difference channels carry motion rather than augmentation
//! noise.
//!
//! Pipeline per branch:
//!
//! 1. **FrameSplitter**: slice the composite into fixed-size frames
//! 2. **CropSampler**: one random-resized-crop rectangle for all frames
//! 3. **DifferenceEncoder**: pairwise frame differences, pre-flip geometry
//! 4. **PhotometricPipeline**: flips, color jitter, blur, solarization
//! 5. **ViewAssembler**: normalize and interleave frames + differences
//!    into one multi-channel tensor

pub mod assemble;
pub mod diff;
pub mod geometry;
pub mod loader;
pub mod photometric;
pub mod policy;
pub mod splitter;

pub use assemble::*;
pub use diff::*;
pub use geometry::*;
pub use loader::*;
pub use photometric::*;
pub use policy::*;
pub use splitter::*;
