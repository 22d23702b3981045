//! # Kinetic-Train
//!
//! Self-distillation training for multi-frame composite views.
//!
//! A student and a teacher network share one architecture; the student is
//! trained by gradient descent to match the teacher's centered, sharpened
//! output distribution across asymmetric view pairs, while the teacher's
//! parameters drift toward the student through an exponential moving
//! average. The teacher only ever sees the two global views; the student
//! sees every view.
//!
//! Components:
//!
//! 1. **Registry**: explicit architecture-name to backbone-factory map
//! 2. **Projection head**: MLP + L2-normalized bottleneck + final layer
//! 3. **Multi-crop wrapper**: resolution-grouped forward over view lists
//! 4. **DistillationLoss**: centered/sharpened teacher cross-entropy
//! 5. **Trainer**: schedules, optimizer step, EMA update, checkpoints

pub mod checkpoint;
pub mod collective;
pub mod ema;
pub mod head;
pub mod loss;
pub mod multicrop;
pub mod registry;
pub mod trainer;

pub use checkpoint::*;
pub use collective::*;
pub use ema::*;
pub use head::*;
pub use loss::*;
pub use multicrop::*;
pub use registry::*;
pub use trainer::*;
