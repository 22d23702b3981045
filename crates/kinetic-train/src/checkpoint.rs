//! Checkpoint persistence.
//!
//! Weights go to safetensors files, everything else to a JSON metadata
//! record. Restoring rebuilds exact continuation semantics: `epoch` is
//! the next epoch to run, and schedules indexed by absolute step line up
//! again because they are derived from config + steps-per-epoch.
//!
//! Optimizer moments are not persisted; candle's optimizers do not expose
//! their state for serialization.

use std::path::Path;

use kinetic_core::{Result, TrainConfig};
use serde::{Deserialize, Serialize};

use crate::trainer::Trainer;

pub const STUDENT_WEIGHTS_FILE: &str = "student.safetensors";
pub const TEACHER_WEIGHTS_FILE: &str = "teacher.safetensors";
pub const META_FILE: &str = "checkpoint.json";

/// Mixed-precision scaler state; present only when an AMP backend was
/// active when the checkpoint was written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScalerState {
    pub scale: f64,
}

/// Serialized loss-module state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LossState {
    pub center: Vec<f32>,
    pub teacher_temp_schedule: Vec<f64>,
}

/// Checkpoint metadata record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointMeta {
    /// Next epoch to run
    pub epoch: usize,
    /// Training arguments the run was started with
    pub args: TrainConfig,
    pub loss: LossState,
    pub scaler: Option<ScalerState>,
}

impl Trainer {
    /// Write weights and metadata into `dir`.
    pub fn save_checkpoint(&self, dir: &Path, next_epoch: usize) -> Result<()> {
        std::fs::create_dir_all(dir)?;
        self.student_vars.save(dir.join(STUDENT_WEIGHTS_FILE))?;
        self.teacher_vars.save(dir.join(TEACHER_WEIGHTS_FILE))?;

        let meta = CheckpointMeta {
            epoch: next_epoch,
            args: self.config.clone(),
            loss: LossState {
                center: self.loss.center_values()?,
                teacher_temp_schedule: self.loss.temp_schedule().to_vec(),
            },
            scaler: None,
        };
        std::fs::write(dir.join(META_FILE), serde_json::to_string_pretty(&meta)?)?;
        Ok(())
    }

    /// Restore weights and loss state from `dir`, returning the next
    /// epoch to run.
    pub fn restore_checkpoint(&mut self, dir: &Path) -> Result<usize> {
        let meta: CheckpointMeta =
            serde_json::from_str(&std::fs::read_to_string(dir.join(META_FILE))?)?;

        self.student_vars.load(dir.join(STUDENT_WEIGHTS_FILE))?;
        self.teacher_vars.load(dir.join(TEACHER_WEIGHTS_FILE))?;
        self.loss.set_center(&meta.loss.center)?;
        Ok(meta.epoch)
    }
}
