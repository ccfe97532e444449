use crate::error::Result;
use crate::partition::SkipMask;
use crate::tensor::operations::squeeze_all;
use serde::{Deserialize, Serialize};

/// Host-side confidence values, one per scored element, with their shape.
///
/// Shapes follow the reduction that produced them: the scored axis is dropped
/// and every remaining singleton dimension is squeezed, so a batch of one
/// scores as a scalar.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Scores {
    shape: Vec<usize>,
    values: Vec<f32>,
}

impl Scores {
    /// The "never exit" sentinel, one zero per batch element
    pub fn zeros(batch_size: usize) -> Self {
        Self {
            shape: vec![batch_size],
            values: vec![0.0; batch_size],
        }
    }

    pub(crate) fn new(shape: Vec<usize>, values: Vec<f32>) -> Self {
        Self { shape, values }
    }

    /// Wraps values reduced over the last dimension of a tensor of `shape`
    pub(crate) fn reduced(shape: &[usize], values: Vec<f32>) -> Self {
        let kept = &shape[..shape.len().saturating_sub(1)];
        Self {
            shape: squeeze_all(kept),
            values,
        }
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Marks every value strictly above `threshold`.
    ///
    /// Ties and `NaN` stay in the continue group.
    pub fn exceeding(&self, threshold: f32) -> Result<SkipMask> {
        SkipMask::new(
            self.shape.clone(),
            self.values.iter().map(|&c| c > threshold).collect(),
        )
    }
}
