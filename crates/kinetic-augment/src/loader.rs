//! Parallel sample loading.
//!
//! Composites stream in over a channel, a pool of worker tasks runs the
//! augmentation policy, and finished samples stream out. Each worker owns
//! an independently seeded random generator; there is no shared mutable
//! state between workers beyond the channels themselves.

use std::sync::Arc;

use candle_core::Tensor;
use image::RgbImage;
use kinetic_core::Result;
use rand::{rngs::StdRng, SeedableRng};
use tokio::sync::{mpsc, Mutex};

use crate::policy::MultiViewPolicy;

/// All views generated from one composite image.
pub type Sample = Vec<Tensor>;

/// Configuration for the sample loader
#[derive(Debug, Clone)]
pub struct LoaderConfig {
    /// Number of augmentation workers
    pub workers: usize,
    /// Capacity of the input and output queues
    pub queue_size: usize,
    /// Base seed; worker i draws from `seed + i`
    pub seed: u64,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            queue_size: 64,
            seed: 0,
        }
    }
}

/// Worker-pool sample loader.
pub struct SampleLoader {
    input_tx: mpsc::Sender<RgbImage>,
    output_rx: mpsc::Receiver<Sample>,
}

impl SampleLoader {
    /// Start the worker pool. Composites submitted on the returned sender
    /// come back as augmented samples; order across workers is not
    /// guaranteed. Malformed composites are logged and skipped.
    pub fn start(policy: MultiViewPolicy, config: LoaderConfig) -> Self {
        let (input_tx, input_rx) = mpsc::channel::<RgbImage>(config.queue_size);
        let (output_tx, output_rx) = mpsc::channel::<Sample>(config.queue_size);

        let policy = Arc::new(policy);
        let input_rx = Arc::new(Mutex::new(input_rx));

        for worker in 0..config.workers.max(1) {
            let policy = policy.clone();
            let input_rx = input_rx.clone();
            let output_tx = output_tx.clone();
            // independent generator per worker, no shared lock
            let mut rng = StdRng::seed_from_u64(config.seed.wrapping_add(worker as u64));

            tokio::spawn(async move {
                loop {
                    let composite = {
                        let mut rx = input_rx.lock().await;
                        rx.recv().await
                    };
                    let Some(composite) = composite else { break };

                    match policy.views(&composite, &mut rng) {
                        Ok(views) => {
                            if output_tx.send(views).await.is_err() {
                                break; // receiver dropped
                            }
                        }
                        Err(e) => {
                            tracing::warn!("skipping sample: {}", e);
                        }
                    }
                }
            });
        }

        Self {
            input_tx,
            output_rx,
        }
    }

    /// Submit a composite for augmentation.
    pub async fn submit(
        &self,
        composite: RgbImage,
    ) -> std::result::Result<(), mpsc::error::SendError<RgbImage>> {
        self.input_tx.send(composite).await
    }

    /// Receive the next finished sample.
    pub async fn recv(&mut self) -> Option<Sample> {
        self.output_rx.recv().await
    }

    /// Clone of the input sender, for drivers that feed from several tasks.
    pub fn sender(&self) -> mpsc::Sender<RgbImage> {
        self.input_tx.clone()
    }
}

/// Stack a batch of samples into one tensor per view index.
///
/// Every sample must carry the same number of views; view i of the output
/// has shape (batch, channels, H, W).
pub fn collate(samples: &[Sample]) -> Result<Vec<Tensor>> {
    let Some(first) = samples.first() else {
        return Ok(Vec::new());
    };
    let n_views = first.len();
    let mut batched = Vec::with_capacity(n_views);
    for v in 0..n_views {
        let slices: Vec<Tensor> = samples.iter().map(|s| s[v].clone()).collect();
        batched.push(Tensor::stack(&slices, 0)?);
    }
    Ok(batched)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;
    use kinetic_core::CropConfig;

    fn small_policy(local: usize) -> MultiViewPolicy {
        let config = CropConfig {
            local_crops_number: local,
            ..Default::default()
        };
        MultiViewPolicy::new(&config).unwrap()
    }

    fn composite(shade: u8) -> RgbImage {
        RgbImage::from_pixel(640, 1920, Rgb([shade, shade, shade]))
    }

    #[tokio::test]
    async fn loads_samples_in_parallel() {
        let mut loader = SampleLoader::start(
            small_policy(0),
            LoaderConfig {
                workers: 2,
                queue_size: 8,
                seed: 1,
            },
        );

        for i in 0..4 {
            loader.submit(composite(i * 40)).await.unwrap();
        }
        for _ in 0..4 {
            let sample = loader.recv().await.expect("sample");
            assert_eq!(sample.len(), 2);
            assert_eq!(sample[0].dims(), &[21, 224, 224]);
        }
    }

    #[tokio::test]
    async fn skips_malformed_composites() {
        let mut loader = SampleLoader::start(
            small_policy(0),
            LoaderConfig {
                workers: 1,
                queue_size: 4,
                seed: 0,
            },
        );

        loader.submit(RgbImage::new(640, 960)).await.unwrap();
        loader.submit(composite(10)).await.unwrap();

        // only the well-formed composite comes back
        let sample = loader.recv().await.expect("sample");
        assert_eq!(sample.len(), 2);
    }

    #[test]
    fn collate_stacks_per_view() -> Result<()> {
        let policy = small_policy(1);
        let mut rng = StdRng::seed_from_u64(2);
        let a = policy.views(&composite(0), &mut rng)?;
        let b = policy.views(&composite(100), &mut rng)?;

        let batched = collate(&[a, b])?;
        assert_eq!(batched.len(), 3);
        assert_eq!(batched[0].dims(), &[2, 21, 224, 224]);
        assert_eq!(batched[2].dims(), &[2, 21, 96, 96]);
        Ok(())
    }
}
