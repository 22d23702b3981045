//! Training configuration surface.
//!
//! Plain data structs deserialized from the driver's configuration file.
//! Validation that requires the model registry (architecture names) happens
//! eagerly at trainer construction, not here.

use serde::{Deserialize, Serialize};

use crate::types::CompositeLayout;

/// Complete training configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainConfig {
    /// Model architecture and projection head
    pub model: ModelConfig,

    /// Multi-view crop generation
    pub crops: CropConfig,

    /// Teacher temperature schedule
    pub temperature: TemperatureConfig,

    /// Optimizer and regularization
    pub optim: OptimConfig,

    /// Number of training epochs
    pub epochs: usize,

    /// Per-process batch size
    pub batch_size: usize,

    /// Base EMA momentum for the teacher update, increased to 1.0 over
    /// training with a cosine schedule
    pub momentum_teacher: f64,

    /// Mixed-precision toggle; ignored with a warning on backends without
    /// an AMP path
    pub use_fp16: bool,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            model: ModelConfig::default(),
            crops: CropConfig::default(),
            temperature: TemperatureConfig::default(),
            optim: OptimConfig::default(),
            epochs: 100,
            batch_size: 64,
            momentum_teacher: 0.996,
            use_fp16: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Architecture identifier, resolved through the explicit registry
    pub arch: String,

    /// Patch size, consumed by patch-based architectures
    pub patch_size: usize,

    /// Output dimension of the projection head
    pub out_dim: usize,

    /// Hidden width of the projection head MLP
    pub head_hidden_dim: usize,

    /// Bottleneck width before the final projection
    pub head_bottleneck_dim: usize,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            arch: "conv_small".to_string(),
            patch_size: 16,
            out_dim: 65536,
            head_hidden_dim: 2048,
            head_bottleneck_dim: 256,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CropConfig {
    /// Composite/tile geometry of the input images
    pub layout: CompositeLayout,

    /// Area scale range for the two global crops
    pub global_crops_scale: (f64, f64),

    /// Area scale range for the local crops
    pub local_crops_scale: (f64, f64),

    /// Number of local views per sample; 0 disables local views
    pub local_crops_number: usize,
}

impl Default for CropConfig {
    fn default() -> Self {
        Self {
            layout: CompositeLayout::default(),
            global_crops_scale: (0.4, 1.0),
            local_crops_scale: (0.05, 0.4),
            local_crops_number: 8,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemperatureConfig {
    /// Initial teacher temperature
    pub warmup_teacher_temp: f64,

    /// Final teacher temperature after linear warmup
    pub teacher_temp: f64,

    /// Number of warmup epochs for the teacher temperature
    pub warmup_teacher_temp_epochs: usize,
}

impl Default for TemperatureConfig {
    fn default() -> Self {
        Self {
            warmup_teacher_temp: 0.04,
            teacher_temp: 0.04,
            warmup_teacher_temp_epochs: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptimizerKind {
    AdamW,
    Sgd,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimConfig {
    pub optimizer: OptimizerKind,

    /// Peak learning rate reached after warmup
    pub lr: f64,

    /// Final learning rate at the end of the cosine decay
    pub min_lr: f64,

    /// Linear learning-rate warmup epochs
    pub warmup_epochs: usize,

    /// Initial weight decay
    pub weight_decay: f64,

    /// Final weight decay at the end of the cosine schedule
    pub weight_decay_end: f64,

    /// Global gradient-norm clip threshold; 0 disables clipping
    pub clip_grad: f64,

    /// Keep the projection head's last layer frozen for this many epochs
    pub freeze_last_layer: usize,
}

impl Default for OptimConfig {
    fn default() -> Self {
        Self {
            optimizer: OptimizerKind::AdamW,
            lr: 5e-4,
            min_lr: 1e-6,
            warmup_epochs: 10,
            weight_decay: 0.04,
            weight_decay_end: 0.4,
            clip_grad: 3.0,
            freeze_last_layer: 1,
        }
    }
}
