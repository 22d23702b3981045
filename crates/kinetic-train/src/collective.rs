//! Distributed collective seam.
//!
//! The loss module's centering statistic must average teacher logits over
//! the *global* batch. That reduction goes through this trait so the
//! single-process and multi-worker paths share one code shape; every
//! worker must call it on every step, unconditionally, or the collective
//! deadlocks. Process-group bootstrap itself lives outside this crate.

use candle_core::Tensor;
use kinetic_core::Result;

pub trait Collective: Send + Sync {
    /// Element-wise sum of `tensor` across all workers. Blocking; returns
    /// once every worker has contributed.
    fn all_reduce_sum(&self, tensor: &Tensor) -> Result<Tensor>;

    fn world_size(&self) -> usize;
}

/// Trivial collective for single-process training.
#[derive(Debug, Clone, Copy, Default)]
pub struct SingleProcess;

impl Collective for SingleProcess {
    fn all_reduce_sum(&self, tensor: &Tensor) -> Result<Tensor> {
        Ok(tensor.clone())
    }

    fn world_size(&self) -> usize {
        1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::Device;

    #[test]
    fn single_process_is_identity() -> Result<()> {
        let t = Tensor::new(&[1.0f32, 2.0, 3.0], &Device::Cpu)?;
        let reduced = SingleProcess.all_reduce_sum(&t)?;
        assert_eq!(reduced.to_vec1::<f32>()?, vec![1.0, 2.0, 3.0]);
        assert_eq!(SingleProcess.world_size(), 1);
        Ok(())
    }
}
