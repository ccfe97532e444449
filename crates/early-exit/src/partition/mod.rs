//! # Mask Partitioning
//!
//! Splits a batch into a continue group and an exit group by a [`SkipMask`],
//! and restores any such split back into original batch order.
//!
//! ## Key Components
//!
//! * [`split`] - Elementwise partition; the mask is broadcast over the whole tensor
//!   and both groups come back flattened
//! * [`split_rows`] - Batch-axis partition; one mask value per row of dimension `0`,
//!   both groups keep the tensor's rank
//! * [`restore`] - Concatenate `[keep, skip]` and gather along dimension `0`
//! * [`restore_shaped`] - [`restore`] followed by a reshape, undoing [`split`]
//!
//! ## Guarantees
//!
//! Within each group the relative order of the original elements is preserved,
//! and `restore(split(t, mask))` reproduces `t` exactly.
//!
//! # Example
//!
//! ```rust
//! # #[cfg(feature = "candle")]
//! # fn main() -> early_exit::Result<()> {
//! use candle_core::{Device, Tensor};
//! use early_exit::partition::{restore, split_rows, SkipMask};
//!
//! let device = Device::Cpu;
//! let hidden = Tensor::new(&[[0f32, 0.], [1., 1.], [2., 2.]], &device)?;
//! let mask = SkipMask::from_vec(vec![false, true, false]);
//!
//! let partition = split_rows(&hidden, &mask, None)?;
//! assert_eq!(partition.keep.dims(), &[2, 2]);
//! assert_eq!(partition.skip.dims(), &[1, 2]);
//!
//! let restored = restore(&partition.keep, &partition.skip, &partition.restore_index)?;
//! assert_eq!(restored.to_vec2::<f32>()?, hidden.to_vec2::<f32>()?);
//! # Ok(())
//! # }
//! # #[cfg(not(feature = "candle"))]
//! # fn main() {}
//! ```

mod mask;

pub use mask::{RestoreIndex, SkipMask};

use crate::backend::Backend;
use crate::error::{Error, Result};
use crate::tensor::constant::{BATCH_DIM, MAX_RESTORE_RANK};
use crate::tensor::operations::{broadcast_mask, partition_positions};
use tracing::trace;

/// The two groups produced by a split, plus the index that undoes it
#[derive(Clone, Debug)]
pub struct Partition<T> {
    /// Elements whose mask value is `false`, in original order
    pub keep: T,

    /// Elements whose mask value is `true`, in original order
    pub skip: T,

    /// Gathers `[keep, skip]` back into original order
    pub restore_index: RestoreIndex,
}

/// Splits a tensor elementwise by a broadcastable mask.
///
/// # Parameters
///
/// * `tensor` - Tensor of any rank
/// * `mask` - Mask whose shape broadcasts against the trailing dimensions of `tensor`
/// * `restore_index` - Index to echo back instead of deriving one from the mask
///
/// # Returns
///
/// A [`Partition`] of rank `1` groups. `keep.len() + skip.len()` equals the number
/// of elements in `tensor`.
///
/// # Implementation Notes
///
/// The function:
/// 1. Expands the mask to the full tensor shape, prepending singleton dimensions
/// 2. Derives the restore index from the expanded mask when none is supplied
/// 3. Flattens the tensor and gathers each group in order
///
/// A mask of lower rank is aligned against the *trailing* dimensions, so a rank `1`
/// mask over a rank `2` tensor selects columns, not rows. Use [`split_rows`] for a
/// batch-axis split.
pub fn split<B>(
    tensor: &B,
    mask: &SkipMask,
    restore_index: Option<RestoreIndex>,
) -> Result<Partition<B::Flat>>
where B: Backend
{
    let shape = tensor.shape();
    let expanded = broadcast_mask(mask.shape(), mask.values(), &shape)?;
    let restore_index = restore_index.unwrap_or_else(|| RestoreIndex::from_mask(&expanded));
    trace!(?shape, mask_shape = ?mask.shape(), "elementwise split");

    let (keep_idx, skip_idx) = partition_positions(&expanded);
    let flat = tensor.flatten()?;
    Ok(Partition {
        keep: flat.index_select(&keep_idx, BATCH_DIM)?,
        skip: flat.index_select(&skip_idx, BATCH_DIM)?,
        restore_index,
    })
}

/// Splits a tensor along the batch dimension.
///
/// `mask` must hold exactly one value per row of dimension `0`; a scalar mask
/// therefore only fits a batch of one. Both groups keep the rank of `tensor`.
pub fn split_rows<B>(
    tensor: &B,
    mask: &SkipMask,
    restore_index: Option<RestoreIndex>,
) -> Result<Partition<B>>
where B: Backend
{
    let shape = tensor.shape();
    let rows = shape.get(BATCH_DIM).copied().ok_or_else(|| {
        Error::Shape("cannot split the rows of a scalar".to_string())
    })?;
    if mask.len() != rows || mask.shape().len() > 1 {
        return Err(Error::Shape(format!(
            "row mask of shape {:?} does not match batch of {} in {:?}", mask.shape(), rows, shape
        )));
    }
    let restore_index = restore_index.unwrap_or_else(|| RestoreIndex::from_mask(mask.values()));

    let (keep_idx, skip_idx) = partition_positions(mask.values());
    trace!(keep = keep_idx.len(), skip = skip_idx.len(), "row split");
    Ok(Partition {
        keep: tensor.index_select(&keep_idx, BATCH_DIM)?,
        skip: tensor.index_select(&skip_idx, BATCH_DIM)?,
        restore_index,
    })
}

/// Restores a split back into original order.
///
/// # Parameters
///
/// * `keep` - The continue group, of rank `0` through `4`
/// * `skip` - The exit group; moved onto `keep`'s device before concatenation
/// * `restore_index` - Permutation over the rows of `[keep, skip]`
///
/// # Returns
///
/// The concatenation of both groups along dimension `0`, gathered by `restore_index`.
///
/// # Errors
///
/// * [`Error::Shape`] - if the concatenation has rank above `4` or the groups disagree on
///   trailing dimensions
/// * [`Error::Index`] - if `restore_index` is not a permutation of the concatenated rows
pub fn restore<B>(keep: &B, skip: &B, restore_index: &RestoreIndex) -> Result<B>
where B: Backend
{
    let device = keep.device();
    let keep = as_sequence(keep)?;
    let skip = as_sequence(&skip.to_device(&device)?)?;

    let (keep_shape, skip_shape) = (keep.shape(), skip.shape());
    let rank = keep_shape.len();
    if rank > MAX_RESTORE_RANK {
        return Err(Error::Shape(format!(
            "restore supports rank 1 through {}, got {:?}", MAX_RESTORE_RANK, keep_shape
        )));
    }
    if skip_shape.len() != rank || keep_shape[1..] != skip_shape[1..] {
        return Err(Error::Shape(format!(
            "groups of shape {:?} and {:?} cannot be concatenated", keep_shape, skip_shape
        )));
    }

    let total = keep_shape[BATCH_DIM] + skip_shape[BATCH_DIM];
    restore_index.validate(total)?;

    let joined = B::cat(&[keep, skip], BATCH_DIM)?;
    joined.index_select(restore_index.positions(), BATCH_DIM)
}

/// Undoes [`split`], reshaping the restored elements to the original `shape`.
pub fn restore_shaped<B>(
    keep: &B::Flat,
    skip: &B::Flat,
    restore_index: &RestoreIndex,
    shape: &[usize],
) -> Result<B>
where B: Backend
{
    let flat = restore(keep, skip, restore_index)?;
    B::unflatten(&flat, shape)
}

// scalars become singleton sequences so they can be concatenated
fn as_sequence<B: Backend>(tensor: &B) -> Result<B> {
    if tensor.shape().is_empty() {
        tensor.reshape(&[1])
    } else {
        Ok(tensor.clone())
    }
}
