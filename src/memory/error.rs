// Mon Feb 9 2026 - Alex

use thiserror::Error;

use crate::memory::Address;

#[derive(Error, Debug)]
pub enum MemoryError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Unmapped address: {0}")]
    Unmapped(Address),
    #[error("Read of {1} bytes at {0} crosses block boundary")]
    Truncated(Address, usize),
    #[error("Binary parse error: {0}")]
    BinaryParseError(String),
    #[error("Unsupported image: {0}")]
    Unsupported(String),
}
