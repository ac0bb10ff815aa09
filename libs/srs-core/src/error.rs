//! Error types for srs-core.

use thiserror::Error;

/// Result type alias using SrsError.
pub type Result<T> = std::result::Result<T, SrsError>;

/// Errors raised for caller-side precondition violations.
///
/// Numeric degeneracy (non-positive stability, clock skew) is never an
/// error: the scheduler clamps and keeps going.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SrsError {
    #[error("session has no remaining cards")]
    SessionExhausted,

    #[error("invalid weight vector: expected 13 coefficients, got {0}")]
    InvalidWeights(usize),
}
