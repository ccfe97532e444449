/// # Constants with reserved meanings in early-exit routing

/// In a given tensor shape, the `0th` dimension is reserved for batching
pub const BATCH_DIM: usize = 0;

/// Highest tensor rank a restore will gather across
pub const MAX_RESTORE_RANK: usize = 4;
