// Thu Feb 12 2026 - Alex
//
// Shared image fixtures for the RTTI tests. Addresses are flat 64-bit
// little-endian with the cxxabi identity vtables pinned at 0x1000.

use crate::config::Config;
use crate::memory::{Address, BlockKind, SparseImage};
use crate::rtti::{
    RttiContext, CLASS_TYPE_INFO_VTABLE, PURE_VIRTUAL_MARKER, SI_CLASS_TYPE_INFO_VTABLE,
    VMI_CLASS_TYPE_INFO_VTABLE,
};
use std::sync::Arc;

pub const PS: u64 = 8;

/// Address points of the identity vtables, two slots past their symbols.
pub const CLASS_AP: u64 = 0x1010;
pub const SI_AP: u64 = 0x1040;
pub const VMI_AP: u64 = 0x1070;

pub const PURE_VIRTUAL_ADDR: u64 = 0x10f00;

/// Empty GNU image with data at 0x1000-0x4400 and code at 0x10000.
pub fn base_image() -> SparseImage {
    let mut image = SparseImage::new(8);
    image.set_gnu(true);
    image.add_block(Address::new(0x1000), vec![0u8; 0x100], BlockKind::Data);
    image.add_block(Address::new(0x2000), vec![0u8; 0x200], BlockKind::Data);
    image.add_block(Address::new(0x3000), vec![0u8; 0x400], BlockKind::Data);
    image.add_block(Address::new(0x4000), vec![0u8; 0x400], BlockKind::Data);
    image.add_block(Address::new(0x10000), vec![0u8; 0x1000], BlockKind::Code);
    image.add_symbol(CLASS_TYPE_INFO_VTABLE, Address::new(0x1000));
    image.add_symbol(SI_CLASS_TYPE_INFO_VTABLE, Address::new(0x1030));
    image.add_symbol(VMI_CLASS_TYPE_INFO_VTABLE, Address::new(0x1060));
    image.add_symbol(PURE_VIRTUAL_MARKER, Address::new(PURE_VIRTUAL_ADDR));
    image.add_function(Address::new(PURE_VIRTUAL_ADDR), PURE_VIRTUAL_MARKER);
    image
}

pub fn ctx(image: SparseImage) -> RttiContext {
    RttiContext::new(Arc::new(image), Config::default()).unwrap()
}

pub fn put_typename(image: &mut SparseImage, addr: u64, name: &str) {
    let mut bytes = name.as_bytes().to_vec();
    bytes.push(0);
    image.patch(Address::new(addr), &bytes);
}

/// `__class_type_info` with no bases.
pub fn put_class(image: &mut SparseImage, ti: u64, name_addr: u64) {
    image.put_ptr(Address::new(ti), CLASS_AP);
    image.put_ptr(Address::new(ti + PS), name_addr);
}

/// `__si_class_type_info` with one non-virtual public base at offset zero.
pub fn put_si_class(image: &mut SparseImage, ti: u64, name_addr: u64, base_ti: u64) {
    image.put_ptr(Address::new(ti), SI_AP);
    image.put_ptr(Address::new(ti + PS), name_addr);
    image.put_ptr(Address::new(ti + 2 * PS), base_ti);
}

/// `__vmi_class_type_info` with raw `(base type_info, offset_flags)` pairs.
pub fn put_vmi_class(
    image: &mut SparseImage,
    ti: u64,
    name_addr: u64,
    flags: u32,
    bases: &[(u64, i64)],
) {
    image.put_ptr(Address::new(ti), VMI_AP);
    image.put_ptr(Address::new(ti + PS), name_addr);
    image.patch(Address::new(ti + 2 * PS), &flags.to_le_bytes());
    image.patch(Address::new(ti + 2 * PS + 4), &(bases.len() as u32).to_le_bytes());
    for (index, (base_ti, offset_flags)) in bases.iter().enumerate() {
        let at = ti + 2 * PS + 8 + index as u64 * 2 * PS;
        image.put_ptr(Address::new(at), *base_ti);
        image.patch(Address::new(at + PS), &offset_flags.to_le_bytes());
    }
}

/// Packs a base descriptor's `offset_flags` word.
pub fn offset_flags(offset: i64, is_virtual: bool, is_public: bool) -> i64 {
    let mut flags = 0i64;
    if is_virtual {
        flags |= 0x1;
    }
    if is_public {
        flags |= 0x2;
    }
    (offset << 8) | flags
}
