// Mon Feb 9 2026 - Alex

use crate::memory::{Address, MemoryError, MemoryRange};

/// A symbol defined somewhere in the image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageSymbol {
    pub name: String,
    pub address: Address,
}

/// A function known to the image, referenced by entry point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageFunction {
    pub entry: Address,
    pub name: String,
}

/// Byte-addressable view of a compiled program.
///
/// This is the capability the RTTI core consumes; it never owns the image.
/// Pointer reads resolve relocations when one is recorded at the read
/// address, falling back to the absolute little/big-endian value.
///
/// `define_string` is the only mutating operation and must be idempotent:
/// materializing the same address twice is a no-op, and a conflicting
/// non-string datum at the address fails soft by returning `None`.
pub trait MemoryImage: Send + Sync {
    /// Pointer width in bytes (4 or 8).
    fn pointer_size(&self) -> usize;

    fn is_big_endian(&self) -> bool {
        false
    }

    fn contains(&self, addr: Address) -> bool;

    fn read_bytes(&self, addr: Address, len: usize) -> Result<Vec<u8>, MemoryError>;

    /// Symbol name of the relocation applied at `addr`, if any.
    fn relocation_at(&self, addr: Address) -> Option<String>;

    /// All data-bearing (initialized, non-executable) ranges.
    fn data_ranges(&self) -> Vec<MemoryRange>;

    /// Load or create a NUL-terminated string datum at `addr`.
    fn define_string(&self, addr: Address) -> Option<String>;

    fn function_at(&self, addr: Address) -> Option<ImageFunction>;

    fn symbol_address(&self, name: &str) -> Option<Address>;

    /// All symbols whose name starts with `prefix`.
    fn symbols_matching(&self, prefix: &str) -> Vec<ImageSymbol>;

    /// Address of the nearest symbol strictly after `addr`, if any.
    fn next_symbol_after(&self, addr: Address) -> Option<Address>;

    /// End of the block containing `addr`, if `addr` is mapped.
    fn block_end(&self, addr: Address) -> Option<Address>;

    /// Whether the image was produced by a GNU-family toolchain. The RTTI
    /// core refuses to run when this is false.
    fn is_gnu(&self) -> bool;

    fn read_uint(&self, addr: Address, len: usize) -> Result<u64, MemoryError> {
        let bytes = self.read_bytes(addr, len)?;
        let mut value = 0u64;
        if self.is_big_endian() {
            for b in bytes {
                value = (value << 8) | b as u64;
            }
        } else {
            for b in bytes.iter().rev() {
                value = (value << 8) | *b as u64;
            }
        }
        Ok(value)
    }

    fn read_u32(&self, addr: Address) -> Result<u32, MemoryError> {
        Ok(self.read_uint(addr, 4)? as u32)
    }

    /// Pointer-sized signed integer, sign-extended.
    fn read_int_ptr(&self, addr: Address) -> Result<i64, MemoryError> {
        let size = self.pointer_size();
        let raw = self.read_uint(addr, size)?;
        let shift = 64 - size as u32 * 8;
        Ok(((raw << shift) as i64) >> shift)
    }

    /// Pointer read with relocation resolution.
    fn read_pointer(&self, addr: Address) -> Result<Address, MemoryError> {
        if let Some(symbol) = self.relocation_at(addr) {
            if let Some(target) = self.symbol_address(&symbol) {
                return Ok(target);
            }
        }
        Ok(Address::new(self.read_uint(addr, self.pointer_size())?))
    }
}
