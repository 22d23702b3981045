//! Multi-crop forward wrapper.

use candle_core::Tensor;
use kinetic_core::Result;

use crate::head::ProjectionHead;
use crate::registry::Backbone;

/// Wraps a backbone and projection head so a list of views with mixed
/// spatial resolutions can be forwarded efficiently: consecutive views
/// with the same resolution are concatenated along the batch axis and
/// forwarded once, and the outputs are concatenated back in the original
/// view order before projection.
pub struct MultiCropModel {
    backbone: Box<dyn Backbone>,
    head: ProjectionHead,
}

impl MultiCropModel {
    pub fn new(backbone: Box<dyn Backbone>, head: ProjectionHead) -> Self {
        Self { backbone, head }
    }

    /// Forward a list of view batches, each (batch, channels, H, W).
    ///
    /// Returns logits (n_views * batch, out_dim), ordered view-major to
    /// match the loss module's chunking.
    pub fn forward(&self, views: &[Tensor]) -> Result<Tensor> {
        let mut outputs = Vec::new();
        let mut start = 0;
        while start < views.len() {
            let resolution = views[start].dim(3)?;
            let mut end = start + 1;
            while end < views.len() && views[end].dim(3)? == resolution {
                end += 1;
            }

            let group = Tensor::cat(&views[start..end], 0)?;
            outputs.push(self.backbone.forward(&group)?);
            start = end;
        }

        let embeddings = Tensor::cat(&outputs, 0)?;
        self.head.forward(&embeddings)
    }

    pub fn head(&self) -> &ProjectionHead {
        &self.head
    }
}
