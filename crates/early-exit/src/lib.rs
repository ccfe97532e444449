//! # Early Exit
//!
//! Confidence-driven **early exit** routing for layered sequence models.
//!
//! ## Overview
//!
//! At every layer of a decoding step the model's output is scored, and the
//! tokens or sequences that are already confident leave the layer stack while
//! the rest keep going. This crate provides the two pieces that make that work:
//!
//! - A confidence engine that scores a layer with one of several pluggable
//!   measures and compares the scores to a threshold schedule
//! - A mask partitioner that splits a batch into continue and exit groups and
//!   later restores the groups to original batch order
//!
//! The model, the auxiliary classifier's weights and the decoding loop stay with
//! the caller. They hand tensors in and get boolean masks and partitions back.
//!
//! ## Architecture
//!
//! ### Assumptions
//! Regardless of backend used, early-exit reserves one dimension with special meaning:
//!  - The `0th` dimension is reserved as the batch dimension
//!  - Logits and hidden states carry their classes or features on the last dimension
//!
//! ### Backend Trait
//!
//! The [`Backend`](backend::Backend) trait defines the tensor operations the
//! partitioner and the measures need. Partitioning and scoring are written
//! against it, so the same code runs on every supported tensor library.
//!
//! ### Confidence
//!
//! [`ConfidenceEngine`](confidence::ConfidenceEngine) is built from an
//! [`ExitConfig`] and, given a layer's tensors, an optional
//! [`ExitClassifier`](confidence::ExitClassifier) and the caller's
//! [`LayerHistory`](confidence::LayerHistory), yields an exit mask.
//!
//! ### Partitioning
//!
//! [`partition::split_rows`] and [`partition::restore`] move rows between the
//! continue and exit paths, and [`ExitLedger`] composes those splits across
//! layers.
//!
//! ## Features
//!
//! - **candle** - Enables candle backend (default)
//! - **burn** - Enables burn backend
//!

mod tensor;

pub mod backend;
pub mod confidence;
pub mod config;
pub mod error;
pub mod ledger;
pub mod partition;

/// Constants for client reference
pub use tensor::constant;

pub use config::ExitConfig;
pub use error::{Error, Result};
pub use ledger::ExitLedger;
pub use partition::{Partition, RestoreIndex, SkipMask};
