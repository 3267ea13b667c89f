//! Error types for the spatial index.

use thiserror::Error;

/// Errors that can occur while constructing or querying the spatial index.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SpatialIndexError {
    /// Hilbert curve order outside the supported `[1, 30]` range.
    #[error("invalid resolution: order {0} must be in [1, 30]")]
    InvalidResolution(u32),

    /// Latitude outside `[-90, 90]`. Longitude is normalized silently and
    /// never produces this error.
    #[error("invalid coordinate: latitude {0} must be in [-90, 90]")]
    InvalidCoordinate(f64),

    /// A decomposed rectangle has no in-world piece left after clipping and
    /// wrapping (see [`crate::ranges`]'s world-wrap handling).
    #[error("rectangle lies entirely outside the grid after world-wrap")]
    OutOfWorld,

    /// Compaction was invoked on an empty range list. This is a programming
    /// error, not a data error: callers should check emptiness first.
    #[error("compaction called on an empty range list")]
    EmptyRanges,

    /// Debug-build-only check: construction input was not sorted ascending
    /// by `hid` as the pre-sorted contract requires. Release builds trust
    /// the contract and never produce this error.
    #[error("index input at position {0} is out of order (hid {1} < previous hid {2})")]
    DuplicateIndexInputNotSorted(usize, u64, u64),
}

/// Result alias for spatial index operations.
pub type SpatialResult<T> = Result<T, SpatialIndexError>;
