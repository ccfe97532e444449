//! # Exit Ledger
//!
//! Bookkeeping for a batch that shrinks layer by layer.
//!
//! Each [`route`](ExitLedger::route) row-splits the active batch, keeps the exit
//! group aside with the original positions of its rows and hands back the
//! continue group. [`finish`](ExitLedger::finish) composes every stored split
//! into a single [`RestoreIndex`] and reassembles the full batch in original
//! order.
//!
//! ```rust
//! # #[cfg(feature = "candle")]
//! # fn main() -> early_exit::Result<()> {
//! use candle_core::{Device, Tensor};
//! use early_exit::{ExitLedger, SkipMask};
//!
//! let hidden = Tensor::new(&[[0f32], [1.], [2.], [3.]], &Device::Cpu)?;
//! let mut ledger = ExitLedger::new(4);
//!
//! let active = ledger.route(&hidden, &SkipMask::from_vec(vec![false, true, false, false]))?;
//! let active = ledger.route(&active, &SkipMask::from_vec(vec![true, false, false]))?;
//! let output = ledger.finish(&active)?;
//!
//! assert_eq!(output.to_vec2::<f32>()?, hidden.to_vec2::<f32>()?);
//! assert_eq!(ledger.exit_layers(), &[Some(2), Some(1), None, None]);
//! # Ok(())
//! # }
//! # #[cfg(not(feature = "candle"))]
//! # fn main() {}
//! ```

use tracing::debug;

use crate::backend::Backend;
use crate::error::{Error, Result};
use crate::partition::{split_rows, RestoreIndex, SkipMask};
use crate::tensor::constant::BATCH_DIM;

/// An exit group with the original positions of its rows
#[derive(Debug, Clone)]
struct ExitedGroup<B> {
    positions: Vec<usize>,
    rows: B,
}

/// # ExitLedger
///
/// Tracks which original batch positions are still running and stores the rows
/// that exited at each layer until the batch is reassembled.
#[derive(Debug, Clone)]
pub struct ExitLedger<B> {
    active: Vec<usize>,
    exited: Vec<ExitedGroup<B>>,
    exit_layers: Vec<Option<usize>>,
    exit_counts: Vec<usize>,
    layer: usize,
}

impl<B: Backend> ExitLedger<B> {
    pub fn new(batch_size: usize) -> Self {
        Self {
            active: (0..batch_size).collect(),
            exited: Vec::new(),
            exit_layers: vec![None; batch_size],
            exit_counts: Vec::new(),
            layer: 1,
        }
    }

    /// Splits the active rows by `mask` and returns the continue group.
    ///
    /// The exit group is stored against the current layer, and the ledger
    /// moves on to the next layer.
    ///
    /// # Errors
    ///
    /// [`Error::Shape`] when `mask` does not hold one value per active row.
    pub fn route(&mut self, active: &B, mask: &SkipMask) -> Result<B> {
        if mask.len() != self.active.len() {
            return Err(Error::Shape(format!(
                "mask of {} values for {} active rows", mask.len(), self.active.len()
            )));
        }
        let partition = split_rows(active, mask, None)?;

        let (still_active, exiting): (Vec<(usize, bool)>, Vec<(usize, bool)>) = self
            .active
            .iter()
            .zip(mask.values())
            .map(|(&position, &exits)| (position, exits))
            .partition(|&(_, exits)| !exits);

        let exiting: Vec<usize> = exiting.into_iter().map(|(p, _)| p).collect();
        for &position in &exiting {
            self.exit_layers[position] = Some(self.layer);
        }
        debug!(layer = self.layer, exits = exiting.len(), remaining = still_active.len(), "routed batch");

        self.exit_counts.push(exiting.len());
        if !exiting.is_empty() {
            self.exited.push(ExitedGroup { positions: exiting, rows: partition.skip });
        }
        self.active = still_active.into_iter().map(|(p, _)| p).collect();
        self.layer += 1;
        Ok(partition.keep)
    }

    /// Reassembles the full batch from the stored exit groups and the rows
    /// that ran to the end.
    ///
    /// Every group is moved onto `remaining`'s device.
    ///
    /// # Errors
    ///
    /// [`Error::Shape`] when `remaining` does not hold one row per active position.
    pub fn finish(&self, remaining: &B) -> Result<B> {
        let rows = remaining.shape().get(BATCH_DIM).copied().unwrap_or(1);
        if rows != self.active.len() {
            return Err(Error::Shape(format!(
                "{} remaining rows for {} active positions", rows, self.active.len()
            )));
        }
        if self.exited.is_empty() {
            return Ok(remaining.clone());
        }

        let device = remaining.device();
        let mut groups = Vec::with_capacity(self.exited.len() + 1);
        let mut parts = Vec::with_capacity(self.exited.len() + 1);
        for group in &self.exited {
            groups.push(group.positions.clone());
            parts.push(group.rows.to_device(&device)?);
        }
        if !self.active.is_empty() {
            groups.push(self.active.clone());
            parts.push(remaining.clone());
        }

        let restore_index = RestoreIndex::from_groups(&groups)?;
        let joined = B::cat(&parts, BATCH_DIM)?;
        joined.index_select(restore_index.positions(), BATCH_DIM)
    }

    /// Original positions still running, in the order their rows appear
    pub fn active_positions(&self) -> &[usize] {
        &self.active
    }

    /// For each original position, the layer it exited at, or `None` if it is still running
    pub fn exit_layers(&self) -> &[Option<usize>] {
        &self.exit_layers
    }

    /// Number of exits at each routed layer, starting at layer `1`
    pub fn exit_counts(&self) -> &[usize] {
        &self.exit_counts
    }

    /// The layer the next [`route`](Self::route) is recorded against
    pub fn layer(&self) -> usize {
        self.layer
    }
}
