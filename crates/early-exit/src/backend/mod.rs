//! # Tensor Backend
//!
//! This module provides a unified interface for different tensor backends,
//! allowing the partitioning and confidence apis to work in a backend-agnostic manner
//!
//! ## Feature Flags
//!
//! The module uses feature flags to conditionally compile support for different backends:
//!
//! - `candle`: Enables support for the Candle tensor library (on by default)
//! - `burn`: Enables support for the Burn tensor library
//!
//! ## Usage
//!
//! Users of this crate can work with tensors in a backend-agnostic way by:
//!
//! 1. Importing the [`Backend`] trait
//! 2. Writing code against this trait interface
//! 3. Enabling the appropriate feature flag for their desired backend
//!
//! This allows for easy switching between tensor backends without changing application code.

mod core_trait;

#[cfg_attr(docsrs, doc(cfg(feature = "candle")))]
#[cfg(feature = "candle")]
/// Candle tensor backend implementation.
///
/// This module is only available when the `candle` feature flag is enabled.
/// It provides an implementation of the [`Backend`] trait for Candle's `Tensor` type,
/// with softmax taken from `candle-nn`.
pub mod candle;

#[cfg_attr(docsrs, doc(cfg(feature = "burn")))]
#[cfg(feature = "burn")]
/// Burn tensor backend implementation.
///
/// This module is only available when the `burn` feature flag is enabled.
/// It provides an implementation of the [`Backend`] trait for Burn float
/// tensors of rank `1` through `4`.
///
/// Burn encodes rank in the type, so flattening always lands on a rank `1` tensor.
pub mod burn;


// Re-export the core trait for convenient imports
pub use core_trait::*;


#[cfg(test)]
/// Mock tensor implementation.
///
/// Operates on dense host vectors with a fake device tag
pub(crate) mod mock_tensor;
