//! Self-distillation loss.
//!
//! Cross-entropy between the teacher's centered, sharpened softmax over
//! the two global views and the student's temperature-scaled log-softmax
//! over every view, averaged over all (teacher view, student view) pairs
//! with distinct indices. As a side effect of every evaluation, the
//! centering statistic tracks the global batch mean of teacher logits
//! with an exponential moving average.

use candle_core::{DType, Device, Tensor};
use candle_nn::ops::{log_softmax, softmax};
use kinetic_core::{teacher_temp_schedule, Error, Result};

use crate::collective::Collective;

/// Configuration for the distillation loss
#[derive(Debug, Clone)]
pub struct DistillationConfig {
    /// Output logit dimension of the projection head
    pub out_dim: usize,
    /// Total number of views per sample (2 global + N local)
    pub ncrops: usize,
    /// Initial teacher temperature
    pub warmup_teacher_temp: f64,
    /// Teacher temperature after linear warmup
    pub teacher_temp: f64,
    /// Warmup length in epochs
    pub warmup_teacher_temp_epochs: usize,
    /// Total training epochs (fixes the schedule length)
    pub epochs: usize,
    /// Student temperature
    pub student_temp: f64,
    /// EMA momentum of the centering statistic
    pub center_momentum: f64,
}

impl Default for DistillationConfig {
    fn default() -> Self {
        Self {
            out_dim: 65536,
            ncrops: 10,
            warmup_teacher_temp: 0.04,
            teacher_temp: 0.04,
            warmup_teacher_temp_epochs: 0,
            epochs: 100,
            student_temp: 0.1,
            center_momentum: 0.9,
        }
    }
}

/// Distillation loss with its running center and temperature schedule.
pub struct DistillationLoss {
    config: DistillationConfig,
    center: Tensor,
    temp_schedule: Vec<f64>,
}

impl DistillationLoss {
    /// Build the loss module, validating the pairing configuration
    /// eagerly: fewer than two views leaves no off-diagonal
    /// (teacher, student) pairs and the loss is undefined.
    pub fn new(config: DistillationConfig, device: &Device) -> Result<Self> {
        if config.ncrops < 2 {
            return Err(Error::DegenerateLoss(format!(
                "ncrops = {} leaves no valid teacher/student view pairs",
                config.ncrops
            )));
        }
        if config.out_dim == 0 || config.epochs == 0 {
            return Err(Error::Config(
                "out_dim and epochs must be positive".to_string(),
            ));
        }

        let temp_schedule = teacher_temp_schedule(
            config.warmup_teacher_temp,
            config.teacher_temp,
            config.warmup_teacher_temp_epochs,
            config.epochs,
        );
        let center = Tensor::zeros((1, config.out_dim), DType::F32, device)?;

        Ok(Self {
            config,
            center,
            temp_schedule,
        })
    }

    /// Compute the loss for one step and update the center.
    ///
    /// # Arguments
    /// * `student_output` - logits (ncrops * batch, out_dim), view-major
    /// * `teacher_output` - logits (2 * batch, out_dim) for the two
    ///   global views; gradients are never tracked through it
    /// * `epoch` - current epoch, indexing the temperature schedule
    /// * `collective` - reduction seam for the center update; called on
    ///   every step, unconditionally
    pub fn evaluate(
        &mut self,
        student_output: &Tensor,
        teacher_output: &Tensor,
        epoch: usize,
        collective: &dyn Collective,
    ) -> Result<Tensor> {
        let temp = self.temp_schedule[epoch.min(self.temp_schedule.len() - 1)];

        let student = (student_output / self.config.student_temp)?;
        let student_chunks = student.chunk(self.config.ncrops, 0)?;

        // teacher centering and sharpening; no gradient flows back
        let centered = teacher_output.broadcast_sub(&self.center)?;
        let teacher_probs = softmax(&(centered / temp)?, 1)?.detach();
        let teacher_chunks = teacher_probs.chunk(2, 0)?;

        let mut total = Tensor::zeros((), DType::F32, student_output.device())?;
        let mut n_terms = 0usize;
        for (iq, q) in teacher_chunks.iter().enumerate() {
            for (v, s) in student_chunks.iter().enumerate() {
                if v == iq {
                    // teacher and student operating on the same view carry
                    // no distillation signal
                    continue;
                }
                let log_p = log_softmax(s, 1)?;
                let term = (q * &log_p)?.sum(1)?.neg()?.mean(0)?;
                total = (total + term)?;
                n_terms += 1;
            }
        }
        if n_terms == 0 {
            return Err(Error::DegenerateLoss(
                "no valid teacher/student view pairs".to_string(),
            ));
        }

        let loss = (total / n_terms as f64)?;
        self.update_center(teacher_output, collective)?;
        Ok(loss)
    }

    /// EMA update of the center from the true global batch mean: sum
    /// locally, sum across workers, divide by (local batch x world size).
    fn update_center(&mut self, teacher_output: &Tensor, collective: &dyn Collective) -> Result<()> {
        let local_batch = teacher_output.dim(0)?;
        let batch_sum = teacher_output.sum_keepdim(0)?.detach();
        let batch_sum = collective.all_reduce_sum(&batch_sum)?;
        let batch_center = (batch_sum / ((local_batch * collective.world_size()) as f64))?;

        self.center = ((&self.center * self.config.center_momentum)?
            + (batch_center * (1.0 - self.config.center_momentum))?)?;
        Ok(())
    }

    pub fn center(&self) -> &Tensor {
        &self.center
    }

    /// Flat copy of the center, for checkpointing.
    pub fn center_values(&self) -> Result<Vec<f32>> {
        Ok(self.center.flatten_all()?.to_vec1()?)
    }

    /// Restore the center from checkpointed values.
    pub fn set_center(&mut self, values: &[f32]) -> Result<()> {
        if values.len() != self.config.out_dim {
            return Err(Error::Checkpoint(format!(
                "center length {} does not match out_dim {}",
                values.len(),
                self.config.out_dim
            )));
        }
        self.center = Tensor::from_vec(
            values.to_vec(),
            (1, self.config.out_dim),
            self.center.device(),
        )?;
        Ok(())
    }

    pub fn temp_schedule(&self) -> &[f64] {
        &self.temp_schedule
    }

    pub fn config(&self) -> &DistillationConfig {
        &self.config
    }
}
