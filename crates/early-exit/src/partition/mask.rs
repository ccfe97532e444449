use crate::error::{Error, Result};
use crate::tensor::operations::{invert_permutation, partition_positions};
use serde::{Deserialize, Serialize};

/// # SkipMask
///
/// A host-side boolean mask with a shape. `true` routes an element to the exit
/// group, `false` keeps it in the continue group.
///
/// Masks are produced by the confidence engine, one value per scored element,
/// and consumed by [`split`](super::split) and [`split_rows`](super::split_rows).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawSkipMask")]
pub struct SkipMask {
    shape: Vec<usize>,
    values: Vec<bool>,
}

/// Wire form of a [`SkipMask`], checked by [`SkipMask::new`] on the way in
#[derive(Deserialize)]
struct RawSkipMask {
    shape: Vec<usize>,
    values: Vec<bool>,
}

impl TryFrom<RawSkipMask> for SkipMask {
    type Error = Error;

    fn try_from(raw: RawSkipMask) -> Result<Self> {
        Self::new(raw.shape, raw.values)
    }
}

impl SkipMask {
    /// Creates a mask of the given shape from row-major values.
    ///
    /// Fails with [`Error::Shape`] when the value count does not match the shape.
    pub fn new(shape: Vec<usize>, values: Vec<bool>) -> Result<Self> {
        let expected: usize = shape.iter().product();
        if expected != values.len() {
            return Err(Error::Shape(format!(
                "mask of shape {:?} needs {} values, got {}", shape, expected, values.len()
            )));
        }
        Ok(Self { shape, values })
    }

    /// Rank `1` mask, one value per batch element
    pub fn from_vec(values: Vec<bool>) -> Self {
        Self { shape: vec![values.len()], values }
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn values(&self) -> &[bool] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Number of elements routed to the exit group
    pub fn count_exits(&self) -> usize {
        self.values.iter().filter(|&&v| v).count()
    }

    /// True when no element exits
    pub fn none(&self) -> bool {
        self.values.iter().all(|&v| !v)
    }

    /// True when every element exits
    pub fn all(&self) -> bool {
        self.values.iter().all(|&v| v)
    }
}

/// # RestoreIndex
///
/// A permutation of `0..n` that gathers `[continue ++ exit]` back into original order.
///
/// When derived from a mask it is the inverse of the stable sort of the mask
/// (`false` before `true`), so position `i` of the original batch is found at
/// `positions()[i]` in the concatenation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestoreIndex {
    positions: Vec<usize>,
}

impl RestoreIndex {
    /// Wraps caller-supplied positions. They are validated when used by a restore.
    pub fn new(positions: Vec<usize>) -> Self {
        Self { positions }
    }

    /// Derives the restore index for a flat mask
    pub fn from_mask(mask: &[bool]) -> Self {
        let (mut order, skip) = partition_positions(mask);
        order.extend(skip);
        Self { positions: invert_permutation(&order) }
    }

    /// Builds the index that restores a concatenation of groups, where `groups[g]`
    /// holds the original positions of the rows in group `g`, in the order they
    /// appear within that group.
    pub fn from_groups(groups: &[Vec<usize>]) -> Result<Self> {
        let order: Vec<usize> = groups.iter().flatten().copied().collect();
        Self::new(order.clone()).validate(order.len())?;
        Ok(Self { positions: invert_permutation(&order) })
    }

    pub fn positions(&self) -> &[usize] {
        &self.positions
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Checks this is a permutation of `0..total`.
    ///
    /// Fails with [`Error::Index`] on a length mismatch, an out-of-range value,
    /// or a repeated value.
    pub fn validate(&self, total: usize) -> Result<()> {
        if self.positions.len() != total {
            return Err(Error::Index(format!(
                "restore index has {} entries for {} rows", self.positions.len(), total
            )));
        }
        let mut seen = vec![false; total];
        for &p in &self.positions {
            if p >= total {
                return Err(Error::Index(format!("restore index {} out of range 0..{}", p, total)));
            }
            if seen[p] {
                return Err(Error::Index(format!("restore index {} repeated", p)));
            }
            seen[p] = true;
        }
        Ok(())
    }
}
