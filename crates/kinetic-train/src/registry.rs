//! Explicit backbone registry.
//!
//! Architecture names resolve through one table, validated eagerly: an
//! unknown name is a fatal configuration error at startup, never a logged
//! warning with corrupted fallback behavior.

use candle_core::{Module, Tensor, D};
use candle_nn::{conv2d, Conv2d, Conv2dConfig, VarBuilder};
use kinetic_core::{Error, Result};

/// A backbone maps a batch of fixed-size view tensors to embeddings.
///
/// Implementations must accept any spatial resolution the multi-crop
/// policy produces (global and local views differ in size).
pub trait Backbone: Send + Sync {
    /// Forward a batch (batch, channels, H, W) to embeddings
    /// (batch, embed_dim).
    fn forward(&self, xs: &Tensor) -> candle_core::Result<Tensor>;

    fn embed_dim(&self) -> usize;
}

/// Architectures the registry can build.
pub const KNOWN_ARCHITECTURES: &[&str] = &["conv_tiny", "conv_small"];

/// Build a backbone by name.
///
/// # Errors
/// `Error::UnknownArchitecture` listing the known names when `arch` does
/// not resolve.
pub fn build_backbone(
    arch: &str,
    in_channels: usize,
    vb: VarBuilder,
) -> Result<(Box<dyn Backbone>, usize)> {
    let widths: &[usize] = match arch {
        "conv_tiny" => &[32, 64, 128],
        "conv_small" => &[64, 128, 256],
        _ => {
            return Err(Error::UnknownArchitecture {
                name: arch.to_string(),
                known: KNOWN_ARCHITECTURES.join(", "),
            })
        }
    };
    let backbone = ConvBackbone::new(in_channels, widths, vb)?;
    let embed_dim = backbone.embed_dim();
    Ok((Box::new(backbone), embed_dim))
}

/// Small strided convolutional backbone.
///
/// Stands in for the opaque model capability the training loop consumes;
/// global average pooling keeps it resolution-agnostic.
pub struct ConvBackbone {
    stages: Vec<Conv2d>,
    embed_dim: usize,
}

impl ConvBackbone {
    pub fn new(in_channels: usize, widths: &[usize], vb: VarBuilder) -> Result<Self> {
        let config = Conv2dConfig {
            padding: 1,
            stride: 2,
            ..Default::default()
        };

        let mut stages = Vec::with_capacity(widths.len());
        let mut prev = in_channels;
        for (i, &width) in widths.iter().enumerate() {
            stages.push(conv2d(prev, width, 3, config, vb.pp(format!("stage_{}", i)))?);
            prev = width;
        }

        Ok(Self {
            stages,
            embed_dim: prev,
        })
    }
}

impl Backbone for ConvBackbone {
    fn forward(&self, xs: &Tensor) -> candle_core::Result<Tensor> {
        let mut x = xs.clone();
        for stage in &self.stages {
            x = stage.forward(&x)?.relu()?;
        }
        // global average pool over the spatial dims
        x.mean(D::Minus1)?.mean(D::Minus1)
    }

    fn embed_dim(&self) -> usize {
        self.embed_dim
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::{DType, Device};
    use candle_nn::VarMap;

    fn vb(varmap: &VarMap) -> VarBuilder {
        VarBuilder::from_varmap(varmap, DType::F32, &Device::Cpu)
    }

    #[test]
    fn unknown_architecture_is_fatal() {
        let varmap = VarMap::new();
        let err = build_backbone("vit_base", 21, vb(&varmap)).err().unwrap();
        let message = err.to_string();
        assert!(message.contains("vit_base"));
        assert!(message.contains("conv_tiny"));
    }

    #[test]
    fn forward_handles_mixed_resolutions() -> Result<()> {
        let varmap = VarMap::new();
        let (backbone, embed_dim) = build_backbone("conv_tiny", 21, vb(&varmap))?;
        assert_eq!(embed_dim, 128);

        let global = Tensor::zeros((2, 21, 32, 32), DType::F32, &Device::Cpu)?;
        let local = Tensor::zeros((2, 21, 16, 16), DType::F32, &Device::Cpu)?;
        assert_eq!(backbone.forward(&global)?.dims(), &[2, 128]);
        assert_eq!(backbone.forward(&local)?.dims(), &[2, 128]);
        Ok(())
    }
}
