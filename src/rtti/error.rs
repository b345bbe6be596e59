// Wed Feb 11 2026 - Alex

use thiserror::Error;

use crate::memory::{Address, MemoryError};

/// Failures that propagate out of the RTTI core.
///
/// Ordinary negative results ("not this shape") are `None` values, never
/// errors. `Malformed` is reserved for a base descriptor whose target fails
/// identification: sibling offsets become unreliable, so the whole base
/// graph for that class is rejected rather than silently truncated.
#[derive(Error, Debug)]
pub enum RttiError {
    #[error("analysis cancelled")]
    Cancelled,
    #[error("malformed base descriptor at {0}: {1}")]
    Malformed(Address, String),
    #[error("unsupported image: {0}")]
    Unsupported(String),
    #[error(transparent)]
    Memory(#[from] MemoryError),
}
