use candle_core::{Device, Module, Tensor};
use candle_nn::Linear;

/// One block of the toy stack, with its own output head
pub struct Layer {
    block: Linear,
    head: Linear,
    sharpness: f64,
}

impl Layer {
    /// Hidden states after this block, and the head's logits on them
    pub fn forward(&self, hidden: &Tensor) -> candle_core::Result<(Tensor, Tensor)> {
        let hidden = self.block.forward(hidden)?.tanh()?;
        let logits = (self.head.forward(&hidden)? * self.sharpness)?;
        Ok((hidden, logits))
    }
}

/// Randomly initialised layers whose heads grow sharper with depth, so
/// confidence rises as a row moves through the stack
pub struct Model {
    layers: Vec<Layer>,
}

impl Model {
    pub fn new(num_layers: usize, hidden: usize, vocab: usize, device: &Device) -> candle_core::Result<Self> {
        let layers = (0..num_layers)
            .map(|i| -> candle_core::Result<Layer> {
                let block = Linear::new(Tensor::randn(0f32, 0.5, (hidden, hidden), device)?, None);
                let head = Linear::new(Tensor::randn(0f32, 1.0, (vocab, hidden), device)?, None);
                Ok(Layer { block, head, sharpness: (i + 1) as f64 })
            })
            .collect::<candle_core::Result<Vec<_>>>()?;
        Ok(Self { layers })
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }
}
