//! Augmentation output feeding the training loop, end to end.

use std::sync::Arc;

use candle_core::Device;
use image::{Rgb, RgbImage};
use kinetic_augment::{collate, MultiViewPolicy};
use kinetic_core::{CropConfig, ModelConfig, OptimConfig, TrainConfig};
use kinetic_train::{SingleProcess, Trainer};
use rand::{rngs::StdRng, SeedableRng};

fn banded_composite(shift: u8) -> RgbImage {
    RgbImage::from_fn(640, 1920, |x, y| {
        let band = (y / 480) as u8;
        Rgb([
            band.wrapping_mul(40).wrapping_add(shift),
            (x / 4) as u8,
            200 - band * 30,
        ])
    })
}

#[test]
fn augmented_sample_trains_one_step() {
    let config = TrainConfig {
        model: ModelConfig {
            arch: "conv_tiny".to_string(),
            out_dim: 16,
            head_hidden_dim: 32,
            head_bottleneck_dim: 8,
            ..Default::default()
        },
        crops: CropConfig {
            local_crops_number: 2,
            ..Default::default()
        },
        optim: OptimConfig {
            warmup_epochs: 0,
            freeze_last_layer: 0,
            ..Default::default()
        },
        epochs: 1,
        batch_size: 2,
        ..Default::default()
    };

    let policy = MultiViewPolicy::new(&config.crops).unwrap();
    let mut rng = StdRng::seed_from_u64(99);
    let samples: Vec<_> = (0..2)
        .map(|i| policy.views(&banded_composite(i * 30), &mut rng).unwrap())
        .collect();
    let views = collate(&samples).unwrap();

    // 2 global + 2 local views, batch of 2, 21 channels each
    assert_eq!(views.len(), 4);
    assert_eq!(views[0].dims(), &[2, 21, 224, 224]);
    assert_eq!(views[3].dims(), &[2, 21, 96, 96]);

    let mut trainer = Trainer::new(config, 1, Device::Cpu, Arc::new(SingleProcess)).unwrap();
    let stats = trainer.train_step(&views, 0, 0).unwrap();
    assert!(stats.loss.is_finite());
    assert!(stats.loss > 0.0);
}
