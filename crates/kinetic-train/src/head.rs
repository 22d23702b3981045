//! Projection head.

use candle_core::{Module, Tensor};
use candle_nn::{linear, linear_no_bias, Linear, VarBuilder};
use kinetic_core::Result;

/// Name of the final projection layer inside the head's variable scope.
/// The trainer freezes gradients for variables under this path during the
/// first `freeze_last_layer` epochs.
pub const LAST_LAYER_SCOPE: &str = "last_layer";

/// Configuration for the projection head
#[derive(Debug, Clone)]
pub struct HeadConfig {
    /// Backbone embedding dimension
    pub in_dim: usize,
    /// Hidden width of the MLP
    pub hidden_dim: usize,
    /// Bottleneck width before the final projection
    pub bottleneck_dim: usize,
    /// Output logit dimension
    pub out_dim: usize,
}

impl Default for HeadConfig {
    fn default() -> Self {
        Self {
            in_dim: 256,
            hidden_dim: 2048,
            bottleneck_dim: 256,
            out_dim: 65536,
        }
    }
}

/// Three-layer MLP with GELU, an L2-normalized bottleneck, and a final
/// bias-free projection to the output logit dimension.
pub struct ProjectionHead {
    layer1: Linear,
    layer2: Linear,
    layer3: Linear,
    last_layer: Linear,
    config: HeadConfig,
}

impl ProjectionHead {
    pub fn new(config: HeadConfig, vb: VarBuilder) -> Result<Self> {
        let layer1 = linear(config.in_dim, config.hidden_dim, vb.pp("mlp1"))?;
        let layer2 = linear(config.hidden_dim, config.hidden_dim, vb.pp("mlp2"))?;
        let layer3 = linear(config.hidden_dim, config.bottleneck_dim, vb.pp("mlp3"))?;
        let last_layer = linear_no_bias(
            config.bottleneck_dim,
            config.out_dim,
            vb.pp(LAST_LAYER_SCOPE),
        )?;

        Ok(Self {
            layer1,
            layer2,
            layer3,
            last_layer,
            config,
        })
    }

    /// Project embeddings (batch, in_dim) to logits (batch, out_dim).
    pub fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        let x = self.layer1.forward(xs)?.gelu()?;
        let x = self.layer2.forward(&x)?.gelu()?;
        let x = self.layer3.forward(&x)?;

        // unit-normalize the bottleneck before the final projection
        let norm = (x.sqr()?.sum_keepdim(1)? + 1e-12)?.sqrt()?;
        let x = x.broadcast_div(&norm)?;

        Ok(self.last_layer.forward(&x)?)
    }

    pub fn config(&self) -> &HeadConfig {
        &self.config
    }
}
