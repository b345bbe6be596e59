// Mon Feb 9 2026 - Alex

pub mod address;
pub mod elf;
pub mod error;
pub mod image;
pub mod range;
pub mod sparse;

pub use address::Address;
pub use elf::load_elf;
pub use error::MemoryError;
pub use image::{ImageFunction, ImageSymbol, MemoryImage};
pub use range::MemoryRange;
pub use sparse::{BlockKind, ImageDatum, SparseImage};
