use std::fmt::Debug;
use crate::error::Result;

/// The backend trait that must be fulfilled by any tensor type to support exit routing.
///
/// Dimension `0` is always the batch dimension. Reductions keep the reduced
/// dimension with size `1`, so implementations never change rank except through
/// [`Backend::flatten`] and [`Backend::unflatten`].
pub trait Backend: Debug + Clone + Send + Sync + 'static {
    /// Where a tensor lives
    type Device: Debug + Clone + Send + Sync;

    /// The rank `1` form of this tensor, produced by elementwise partitioning
    type Flat: Backend<Device = Self::Device>;

    /// Return the shape of this tensor
    fn shape(&self) -> Vec<usize>;

    /// Return the device this tensor lives on
    fn device(&self) -> Self::Device;

    /// Copy this tensor onto `device`
    fn to_device(&self, device: &Self::Device) -> Result<Self>;

    /// Concatenate several tensors to each other along dimension `dim`, in the order supplied
    fn cat(tensors: &[Self], dim: usize) -> Result<Self>;

    /// Gather the slices at `indices` along `dim`, in the order supplied
    fn index_select(&self, indices: &[usize], dim: usize) -> Result<Self>;

    /// Reshape to `shape`, which must hold the same number of elements
    fn reshape(&self, shape: &[usize]) -> Result<Self>;

    /// Flatten every dimension into one, in row-major order
    fn flatten(&self) -> Result<Self::Flat>;

    /// Rebuild a tensor of `shape` from its flattened form
    fn unflatten(flat: &Self::Flat, shape: &[usize]) -> Result<Self>;

    /// Softmax across the last dimension
    fn softmax_last(&self) -> Result<Self>;

    /// The `k` largest values along the last dimension, in descending order
    fn top_k_last(&self, k: usize) -> Result<Self>;

    /// Element-wise product with a tensor of equal shape
    fn mul(&self, other: &Self) -> Result<Self>;

    /// Sum across the last dimension, keeping it with size `1`
    fn sum_last_keepdim(&self) -> Result<Self>;

    /// Copy every element to the host as `f32`, in row-major order
    fn to_vec_f32(&self) -> Result<Vec<f32>>;

    /// Number of elements held by this tensor
    fn elem_count(&self) -> usize {
        self.shape().iter().product()
    }

    /// Size of dimension `0`, or `1` for a scalar
    fn batch_size(&self) -> usize {
        self.shape().first().copied().unwrap_or(1)
    }
}
