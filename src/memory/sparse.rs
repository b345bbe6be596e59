// Tue Feb 10 2026 - Alex

use crate::memory::{Address, ImageFunction, ImageSymbol, MemoryError, MemoryImage, MemoryRange};
use parking_lot::RwLock;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    Code,
    Data,
}

#[derive(Debug, Clone)]
struct Block {
    range: MemoryRange,
    data: Vec<u8>,
    kind: BlockKind,
}

/// A typed datum previously materialized at an address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageDatum {
    TerminatedString(String),
    Opaque,
}

/// In-memory implementation of [`MemoryImage`].
///
/// Backs both the ELF loader and synthetic test fixtures. Blocks are
/// immutable after construction; the only interior mutability is the datum
/// map written by `define_string`/`mark_opaque`, which is idempotent.
pub struct SparseImage {
    pointer_size: usize,
    big_endian: bool,
    gnu: bool,
    blocks: Vec<Block>,
    symbols: Vec<ImageSymbol>,
    by_name: HashMap<String, Address>,
    relocations: HashMap<Address, String>,
    functions: HashMap<Address, String>,
    data: RwLock<HashMap<Address, ImageDatum>>,
}

impl SparseImage {
    pub fn new(pointer_size: usize) -> Self {
        Self {
            pointer_size,
            big_endian: false,
            gnu: true,
            blocks: Vec::new(),
            symbols: Vec::new(),
            by_name: HashMap::new(),
            relocations: HashMap::new(),
            functions: HashMap::new(),
            data: RwLock::new(HashMap::new()),
        }
    }

    pub fn set_big_endian(&mut self, big_endian: bool) {
        self.big_endian = big_endian;
    }

    pub fn set_gnu(&mut self, gnu: bool) {
        self.gnu = gnu;
    }

    pub fn add_block(&mut self, start: Address, data: Vec<u8>, kind: BlockKind) {
        let range = MemoryRange::with_len(start, data.len() as u64);
        self.blocks.push(Block { range, data, kind });
    }

    pub fn add_symbol(&mut self, name: &str, address: Address) {
        self.by_name.insert(name.to_string(), address);
        self.symbols.push(ImageSymbol { name: name.to_string(), address });
    }

    pub fn add_relocation(&mut self, address: Address, symbol: &str) {
        self.relocations.insert(address, symbol.to_string());
    }

    pub fn add_function(&mut self, entry: Address, name: &str) {
        self.functions.insert(entry, name.to_string());
    }

    /// Overwrite bytes inside an existing block. Fixture assembly only.
    pub fn patch(&mut self, addr: Address, bytes: &[u8]) {
        for block in &mut self.blocks {
            if block.range.contains(addr) {
                let off = (addr - block.range.start) as usize;
                block.data[off..off + bytes.len()].copy_from_slice(bytes);
                return;
            }
        }
        panic!("patch outside any block: {}", addr);
    }

    /// Write a pointer-sized value at `addr`. Fixture assembly only.
    pub fn put_ptr(&mut self, addr: Address, value: u64) {
        let mut bytes = value.to_le_bytes().to_vec();
        bytes.truncate(self.pointer_size);
        if self.big_endian {
            bytes.reverse();
        }
        self.patch(addr, &bytes);
    }

    /// Mark an address as holding a non-string datum, forcing later
    /// `define_string` calls at the same address to fail soft.
    pub fn mark_opaque(&self, addr: Address) {
        self.data.write().entry(addr).or_insert(ImageDatum::Opaque);
    }

    fn block_containing(&self, addr: Address) -> Option<&Block> {
        self.blocks.iter().find(|b| b.range.contains(addr))
    }
}

impl MemoryImage for SparseImage {
    fn pointer_size(&self) -> usize {
        self.pointer_size
    }

    fn is_big_endian(&self) -> bool {
        self.big_endian
    }

    fn contains(&self, addr: Address) -> bool {
        self.block_containing(addr).is_some()
    }

    fn read_bytes(&self, addr: Address, len: usize) -> Result<Vec<u8>, MemoryError> {
        let block = self.block_containing(addr).ok_or(MemoryError::Unmapped(addr))?;
        let off = (addr - block.range.start) as usize;
        if off + len > block.data.len() {
            return Err(MemoryError::Truncated(addr, len));
        }
        Ok(block.data[off..off + len].to_vec())
    }

    fn relocation_at(&self, addr: Address) -> Option<String> {
        self.relocations.get(&addr).cloned()
    }

    fn data_ranges(&self) -> Vec<MemoryRange> {
        self.blocks
            .iter()
            .filter(|b| b.kind == BlockKind::Data)
            .map(|b| b.range)
            .collect()
    }

    fn define_string(&self, addr: Address) -> Option<String> {
        {
            let data = self.data.read();
            match data.get(&addr) {
                Some(ImageDatum::TerminatedString(s)) => return Some(s.clone()),
                Some(ImageDatum::Opaque) => return None,
                None => {}
            }
        }
        let block = self.block_containing(addr)?;
        let off = (addr - block.range.start) as usize;
        let tail = &block.data[off..];
        let end = tail.iter().position(|&b| b == 0)?;
        let value = String::from_utf8_lossy(&tail[..end]).into_owned();
        let mut data = self.data.write();
        // First writer wins; a racing definition of the same string is a no-op.
        match data.entry(addr).or_insert_with(|| ImageDatum::TerminatedString(value.clone())) {
            ImageDatum::TerminatedString(s) => Some(s.clone()),
            ImageDatum::Opaque => None,
        }
    }

    fn function_at(&self, addr: Address) -> Option<ImageFunction> {
        self.functions
            .get(&addr)
            .map(|name| ImageFunction { entry: addr, name: name.clone() })
    }

    fn symbol_address(&self, name: &str) -> Option<Address> {
        self.by_name.get(name).copied()
    }

    fn symbols_matching(&self, prefix: &str) -> Vec<ImageSymbol> {
        let mut matches: Vec<ImageSymbol> = self
            .symbols
            .iter()
            .filter(|s| s.name.starts_with(prefix))
            .cloned()
            .collect();
        matches.sort_by_key(|s| s.address);
        matches
    }

    fn next_symbol_after(&self, addr: Address) -> Option<Address> {
        self.symbols
            .iter()
            .map(|s| s.address)
            .filter(|&a| a > addr)
            .min()
    }

    fn block_end(&self, addr: Address) -> Option<Address> {
        self.block_containing(addr).map(|b| b.range.end)
    }

    fn is_gnu(&self) -> bool {
        self.gnu
    }
}
