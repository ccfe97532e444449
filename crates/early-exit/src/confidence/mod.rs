//! # Confidence
//!
//! Per-layer confidence scoring and the exit decision.
//!
//! A [`ConfidenceEngine`] is built once from an [`ExitConfig`](crate::ExitConfig)
//! and called for every layer of every decoding step. Each call takes an
//! [`ExitQuery`] with the layer's tensors, an optional [`ExitClassifier`] and
//! the caller's [`LayerHistory`], and yields an [`ExitDecision`] whose mask
//! feeds straight into [`partition`](crate::partition).
//!
//! Scores are compared to the threshold with a strict `>`: an element whose
//! confidence equals the threshold keeps going.

mod classifier;
mod engine;
mod history;
mod measure;
mod scores;
mod threshold;

pub use classifier::ExitClassifier;
pub use engine::{ConfidenceEngine, ExitDecision};
pub use history::LayerHistory;
pub use measure::{ConfidenceMeasure, ExitQuery};
pub use scores::Scores;
pub use threshold::ThresholdSchedule;
