//! Training loop.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use candle_core::backprop::GradStore;
use candle_core::{DType, Device, Tensor, Var};
use candle_nn::{AdamW, Optimizer, ParamsAdamW, VarBuilder, VarMap, SGD};
use kinetic_core::{cosine_schedule, Error, OptimizerKind, Result, TrainConfig};

use crate::collective::Collective;
use crate::ema::{ema_update, init_teacher_from_student};
use crate::head::{HeadConfig, ProjectionHead, LAST_LAYER_SCOPE};
use crate::loss::{DistillationConfig, DistillationLoss};
use crate::multicrop::MultiCropModel;
use crate::registry::build_backbone;

/// Metrics from one optimization step
#[derive(Debug, Clone, Copy)]
pub struct StepStats {
    pub loss: f64,
    pub lr: f64,
    pub wd: f64,
}

/// Running averages over one epoch
#[derive(Debug, Clone, Copy)]
pub struct EpochStats {
    pub epoch: usize,
    pub loss: f64,
    pub lr: f64,
    pub wd: f64,
    pub steps: usize,
}

enum Opt {
    AdamW(AdamW),
    Sgd(SGD),
}

impl Opt {
    fn new(kind: OptimizerKind, vars: Vec<Var>, lr: f64) -> Result<Self> {
        Ok(match kind {
            OptimizerKind::AdamW => Opt::AdamW(AdamW::new(
                vars,
                ParamsAdamW {
                    lr,
                    // weight decay is scheduled per step and applied
                    // explicitly by the trainer
                    weight_decay: 0.0,
                    ..Default::default()
                },
            )?),
            OptimizerKind::Sgd => Opt::Sgd(SGD::new(vars, lr)?),
        })
    }

    fn set_learning_rate(&mut self, lr: f64) {
        match self {
            Opt::AdamW(o) => o.set_learning_rate(lr),
            Opt::Sgd(o) => o.set_learning_rate(lr),
        }
    }

    fn step(&mut self, grads: &GradStore) -> candle_core::Result<()> {
        match self {
            Opt::AdamW(o) => o.step(grads),
            Opt::Sgd(o) => o.step(grads),
        }
    }
}

/// Drives self-distillation training: schedules, student update, teacher
/// EMA, and per-epoch logging. The teacher forward covers only the two
/// global views; the student forward covers every view.
pub struct Trainer {
    pub(crate) config: TrainConfig,
    pub(crate) device: Device,
    pub(crate) student: MultiCropModel,
    pub(crate) student_vars: VarMap,
    pub(crate) teacher: MultiCropModel,
    pub(crate) teacher_vars: VarMap,
    pub(crate) loss: DistillationLoss,
    optimizer: Opt,
    student_params: Vec<Var>,
    /// Regularized parameter group (rank >= 2), with variable names so
    /// the last-layer freeze can exempt its members from decay
    regularized: Vec<(String, Var)>,
    lr_schedule: Vec<f64>,
    wd_schedule: Vec<f64>,
    momentum_schedule: Vec<f64>,
    steps_per_epoch: usize,
    collective: Arc<dyn Collective>,
}

impl Trainer {
    /// Build student, teacher, loss, optimizer and schedules.
    ///
    /// The architecture name is resolved eagerly; an unknown name fails
    /// here, before any data is touched.
    pub fn new(
        config: TrainConfig,
        steps_per_epoch: usize,
        device: Device,
        collective: Arc<dyn Collective>,
    ) -> Result<Self> {
        if steps_per_epoch == 0 {
            return Err(Error::Config("steps_per_epoch must be positive".to_string()));
        }
        if config.use_fp16 {
            tracing::warn!("mixed precision requested but not supported on this backend; training in f32");
        }

        let in_channels = config.crops.layout.view_channels();
        let head_config = |embed_dim: usize| HeadConfig {
            in_dim: embed_dim,
            hidden_dim: config.model.head_hidden_dim,
            bottleneck_dim: config.model.head_bottleneck_dim,
            out_dim: config.model.out_dim,
        };

        let student_vars = VarMap::new();
        let vb = VarBuilder::from_varmap(&student_vars, DType::F32, &device);
        let (backbone, embed_dim) = build_backbone(&config.model.arch, in_channels, vb.pp("backbone"))?;
        let head = ProjectionHead::new(head_config(embed_dim), vb.pp("head"))?;
        let student = MultiCropModel::new(backbone, head);

        let teacher_vars = VarMap::new();
        let vb = VarBuilder::from_varmap(&teacher_vars, DType::F32, &device);
        let (backbone, _) = build_backbone(&config.model.arch, in_channels, vb.pp("backbone"))?;
        let head = ProjectionHead::new(head_config(embed_dim), vb.pp("head"))?;
        let teacher = MultiCropModel::new(backbone, head);

        // teacher and student start from the same weights
        init_teacher_from_student(&student_vars, &teacher_vars)?;

        let loss = DistillationLoss::new(
            DistillationConfig {
                out_dim: config.model.out_dim,
                ncrops: 2 + config.crops.local_crops_number,
                warmup_teacher_temp: config.temperature.warmup_teacher_temp,
                teacher_temp: config.temperature.teacher_temp,
                warmup_teacher_temp_epochs: config.temperature.warmup_teacher_temp_epochs,
                epochs: config.epochs,
                ..Default::default()
            },
            &device,
        )?;

        // linear scaling rule over the global batch
        let world = collective.world_size();
        let scaled_lr = config.optim.lr * (config.batch_size * world) as f64 / 256.0;
        let lr_schedule = cosine_schedule(
            scaled_lr,
            config.optim.min_lr,
            config.epochs,
            steps_per_epoch,
            config.optim.warmup_epochs,
            0.0,
        );
        let wd_schedule = cosine_schedule(
            config.optim.weight_decay,
            config.optim.weight_decay_end,
            config.epochs,
            steps_per_epoch,
            0,
            0.0,
        );
        // teacher momentum rises toward 1.0 over the run
        let momentum_schedule = cosine_schedule(
            config.momentum_teacher,
            1.0,
            config.epochs,
            steps_per_epoch,
            0,
            0.0,
        );

        let student_params = student_vars.all_vars();
        let regularized: Vec<(String, Var)> = student_vars
            .data()
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, var)| var.as_tensor().rank() >= 2)
            .map(|(name, var)| (name.clone(), var.clone()))
            .collect();

        let optimizer = Opt::new(
            config.optim.optimizer,
            student_params.clone(),
            lr_schedule[0],
        )?;

        Ok(Self {
            config,
            device,
            student,
            student_vars,
            teacher,
            teacher_vars,
            loss,
            optimizer,
            student_params,
            regularized,
            lr_schedule,
            wd_schedule,
            momentum_schedule,
            steps_per_epoch,
            collective,
        })
    }

    /// One optimization step over a batch of view tensors.
    ///
    /// # Errors
    /// `Error::NonFiniteLoss` on a diverged step; this is fatal by design
    /// and must not be retried.
    pub fn train_step(&mut self, views: &[Tensor], epoch: usize, step: usize) -> Result<StepStats> {
        if views.len() < 2 {
            return Err(Error::Config(format!(
                "need at least the 2 global views, got {}",
                views.len()
            )));
        }

        let it = (epoch * self.steps_per_epoch + step).min(self.lr_schedule.len() - 1);
        let lr = self.lr_schedule[it];
        let wd = self.wd_schedule[it];
        self.optimizer.set_learning_rate(lr);

        let views: Vec<Tensor> = views
            .iter()
            .map(|v| v.to_device(&self.device))
            .collect::<candle_core::Result<_>>()?;

        // only the 2 global views pass through the teacher
        let teacher_output = self.teacher.forward(&views[..2])?.detach();
        let student_output = self.student.forward(&views)?;
        let loss = self
            .loss
            .evaluate(&student_output, &teacher_output, epoch, self.collective.as_ref())?;

        let loss_value = loss.to_scalar::<f32>()? as f64;
        if !loss_value.is_finite() {
            tracing::error!("loss is {}, stopping training", loss_value);
            return Err(Error::NonFiniteLoss {
                value: loss_value,
                epoch,
                step,
            });
        }

        let mut grads = loss.backward()?;

        // decoupled weight decay on the regularized group; the frozen last
        // layer receives no update of any kind during its freeze epochs
        let frozen = epoch < self.config.optim.freeze_last_layer;
        for (name, var) in &self.regularized {
            if frozen && name.contains(LAST_LAYER_SCOPE) {
                continue;
            }
            var.set(&(var.as_tensor() * (1.0 - lr * wd))?)?;
        }

        if self.config.optim.clip_grad > 0.0 {
            clip_grad_norm(&self.student_params, &mut grads, self.config.optim.clip_grad)?;
        }
        if frozen {
            cancel_last_layer_gradients(&self.student_vars, &mut grads);
        }
        self.optimizer.step(&grads)?;

        // teacher EMA only after the optimizer step has committed
        let momentum = self.momentum_schedule[it];
        ema_update(&self.student_vars, &self.teacher_vars, momentum)?;

        Ok(StepStats {
            loss: loss_value,
            lr,
            wd,
        })
    }

    /// Train one epoch over pre-collated batches, returning running
    /// averages of loss, learning rate and weight decay.
    pub fn train_epoch<I>(&mut self, batches: I, epoch: usize) -> Result<EpochStats>
    where
        I: IntoIterator<Item = Vec<Tensor>>,
    {
        let mut sums = (0.0f64, 0.0f64, 0.0f64);
        let mut steps = 0usize;

        for (step, views) in batches.into_iter().enumerate() {
            let stats = self.train_step(&views, epoch, step)?;
            sums.0 += stats.loss;
            sums.1 += stats.lr;
            sums.2 += stats.wd;
            steps += 1;
        }
        if steps == 0 {
            return Err(Error::Config("epoch yielded no batches".to_string()));
        }

        let stats = EpochStats {
            epoch,
            loss: sums.0 / steps as f64,
            lr: sums.1 / steps as f64,
            wd: sums.2 / steps as f64,
            steps,
        };
        tracing::info!(
            epoch,
            loss = stats.loss,
            lr = stats.lr,
            wd = stats.wd,
            "epoch complete"
        );
        Ok(stats)
    }

    pub fn config(&self) -> &TrainConfig {
        &self.config
    }

    pub fn loss(&self) -> &DistillationLoss {
        &self.loss
    }

    pub fn momentum_schedule(&self) -> &[f64] {
        &self.momentum_schedule
    }
}

/// Append one epoch's metrics as a JSON line to the training log.
pub fn append_epoch_log(path: &Path, stats: &EpochStats) -> Result<()> {
    let record = serde_json::json!({
        "epoch": stats.epoch,
        "train_loss": stats.loss,
        "train_lr": stats.lr,
        "train_wd": stats.wd,
    });
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{}", record)?;
    Ok(())
}

/// Scale gradients so their global L2 norm does not exceed `max_norm`.
/// Returns the pre-clip norm.
pub fn clip_grad_norm(vars: &[Var], grads: &mut GradStore, max_norm: f64) -> Result<f64> {
    let mut total_sq = 0.0f64;
    for var in vars {
        if let Some(grad) = grads.get(var.as_tensor()) {
            total_sq += grad.sqr()?.sum_all()?.to_scalar::<f32>()? as f64;
        }
    }
    let norm = total_sq.sqrt();

    if norm > max_norm {
        let scale = max_norm / (norm + 1e-6);
        for var in vars {
            if let Some(grad) = grads.remove(var.as_tensor()) {
                grads.insert(var.as_tensor(), (grad * scale)?);
            }
        }
    }
    Ok(norm)
}

/// Drop the gradients of the projection head's last layer so the
/// optimizer leaves it untouched.
pub fn cancel_last_layer_gradients(varmap: &VarMap, grads: &mut GradStore) {
    let vars = varmap.data().lock().unwrap();
    for (name, var) in vars.iter() {
        if name.contains(LAST_LAYER_SCOPE) {
            grads.remove(var.as_tensor());
        }
    }
}
