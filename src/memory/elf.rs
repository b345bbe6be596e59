// Tue Feb 10 2026 - Alex

use crate::memory::{Address, BlockKind, MemoryError, SparseImage};
use goblin::elf::section_header::{SHF_ALLOC, SHF_EXECINSTR, SHT_NOBITS, SHT_PROGBITS};
use goblin::elf::sym::STT_FUNC;
use goblin::elf::Elf;
use log::{debug, warn};

/// Loads an ELF image into a [`SparseImage`].
///
/// Allocatable sections become blocks (executable ones as code, the rest as
/// data-bearing ranges), symbol tables populate the symbol and function
/// indices, and relocation sections populate the relocation table consumed
/// by pointer resolution.
pub fn load_elf(bytes: &[u8]) -> Result<SparseImage, MemoryError> {
    let elf = Elf::parse(bytes)
        .map_err(|e| MemoryError::BinaryParseError(format!("not an ELF image: {}", e)))?;

    let mut image = SparseImage::new(if elf.is_64 { 8 } else { 4 });
    image.set_big_endian(!elf.little_endian);

    let mut comment = String::new();
    for sh in &elf.section_headers {
        let name = elf.shdr_strtab.get_at(sh.sh_name).unwrap_or("");
        if name == ".comment" {
            let start = sh.sh_offset as usize;
            match start.checked_add(sh.sh_size as usize) {
                Some(end) if end <= bytes.len() => {
                    comment = String::from_utf8_lossy(&bytes[start..end]).into_owned();
                }
                _ => {}
            }
            continue;
        }
        if sh.sh_flags & SHF_ALLOC as u64 == 0 || sh.sh_addr == 0 {
            continue;
        }
        let kind = if sh.sh_flags & SHF_EXECINSTR as u64 != 0 {
            BlockKind::Code
        } else {
            BlockKind::Data
        };
        let data = match sh.sh_type {
            SHT_PROGBITS => {
                let start = sh.sh_offset as usize;
                // Offsets and sizes are attacker-controlled; the sum itself
                // can wrap on a malformed header.
                let end = match start.checked_add(sh.sh_size as usize) {
                    Some(end) if end <= bytes.len() => end,
                    _ => {
                        warn!("section {} exceeds file size, skipping", name);
                        continue;
                    }
                };
                bytes[start..end].to_vec()
            }
            SHT_NOBITS => vec![0u8; sh.sh_size as usize],
            _ => continue,
        };
        debug!("block {} at 0x{:x} ({} bytes)", name, sh.sh_addr, data.len());
        image.add_block(Address::new(sh.sh_addr), data, kind);
    }

    let mut saw_cxxabi = false;
    let tables = [(&elf.syms, &elf.strtab), (&elf.dynsyms, &elf.dynstrtab)];
    for (syms, strtab) in tables {
        for sym in syms.iter() {
            let name = match strtab.get_at(sym.st_name) {
                Some(n) if !n.is_empty() => n,
                _ => continue,
            };
            if sym.st_value == 0 {
                continue;
            }
            let addr = Address::new(sym.st_value);
            image.add_symbol(name, addr);
            if sym.st_type() == STT_FUNC {
                image.add_function(addr, name);
            }
            if name.starts_with("__cxa_") || name.starts_with("_ZTVN10__cxxabiv") {
                saw_cxxabi = true;
            }
        }
    }

    for (_, relocs) in &elf.shdr_relocs {
        for reloc in relocs.iter() {
            let name = elf
                .dynsyms
                .get(reloc.r_sym)
                .and_then(|s| elf.dynstrtab.get_at(s.st_name))
                .or_else(|| elf.syms.get(reloc.r_sym).and_then(|s| elf.strtab.get_at(s.st_name)));
            if let Some(name) = name {
                if !name.is_empty() {
                    image.add_relocation(Address::new(reloc.r_offset), name);
                }
            }
        }
    }
    for reloc in elf.dynrelas.iter().chain(elf.dynrels.iter()).chain(elf.pltrelocs.iter()) {
        if let Some(name) = elf.dynsyms.get(reloc.r_sym).and_then(|s| elf.dynstrtab.get_at(s.st_name)) {
            if !name.is_empty() {
                image.add_relocation(Address::new(reloc.r_offset), name);
            }
        }
    }

    image.set_gnu(saw_cxxabi || comment.contains("GCC") || comment.contains("GNU"));
    Ok(image)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryImage;

    fn section_header(ty: u32, flags: u64, addr: u64, offset: u64, size: u64) -> Vec<u8> {
        let mut sh = Vec::with_capacity(64);
        sh.extend_from_slice(&0u32.to_le_bytes()); // sh_name
        sh.extend_from_slice(&ty.to_le_bytes());
        sh.extend_from_slice(&flags.to_le_bytes());
        sh.extend_from_slice(&addr.to_le_bytes());
        sh.extend_from_slice(&offset.to_le_bytes());
        sh.extend_from_slice(&size.to_le_bytes());
        sh.extend_from_slice(&[0u8; 24]); // link, info, align, entsize
        sh
    }

    // Minimal 64-bit little-endian ELF: null section, one in-bounds
    // PROGBITS section, and one whose offset plus size wraps around.
    fn image_with_wrapping_section() -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&[0x7f, b'E', b'L', b'F', 2, 1, 1, 0]);
        bytes.extend_from_slice(&[0u8; 8]);
        bytes.extend_from_slice(&2u16.to_le_bytes()); // e_type EXEC
        bytes.extend_from_slice(&0x3eu16.to_le_bytes()); // e_machine x86-64
        bytes.extend_from_slice(&1u32.to_le_bytes()); // e_version
        bytes.extend_from_slice(&0u64.to_le_bytes()); // e_entry
        bytes.extend_from_slice(&0u64.to_le_bytes()); // e_phoff
        bytes.extend_from_slice(&64u64.to_le_bytes()); // e_shoff
        bytes.extend_from_slice(&0u32.to_le_bytes()); // e_flags
        bytes.extend_from_slice(&64u16.to_le_bytes()); // e_ehsize
        bytes.extend_from_slice(&0u16.to_le_bytes()); // e_phentsize
        bytes.extend_from_slice(&0u16.to_le_bytes()); // e_phnum
        bytes.extend_from_slice(&64u16.to_le_bytes()); // e_shentsize
        bytes.extend_from_slice(&3u16.to_le_bytes()); // e_shnum
        bytes.extend_from_slice(&0u16.to_le_bytes()); // e_shstrndx
        debug_assert_eq!(bytes.len(), 64);

        bytes.extend_from_slice(&section_header(0, 0, 0, 0, 0));
        let alloc = SHF_ALLOC as u64;
        bytes.extend_from_slice(&section_header(SHT_PROGBITS, alloc, 0x2000, 256, 8));
        bytes.extend_from_slice(&section_header(SHT_PROGBITS, alloc, 0x1000, u64::MAX, 16));
        debug_assert_eq!(bytes.len(), 256);
        bytes.extend_from_slice(&[0xaa; 8]);
        bytes
    }

    #[test]
    fn a_wrapping_section_offset_is_skipped_not_loaded() {
        let bytes = image_with_wrapping_section();
        let image = load_elf(&bytes).expect("the image itself parses");
        assert!(image.contains(Address::new(0x2000)));
        assert!(!image.contains(Address::new(0x1000)));
    }
}
