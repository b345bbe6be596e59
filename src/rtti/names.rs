// Thu Feb 12 2026 - Alex

use crate::memory::{Address, MemoryImage, MemoryRange};
use crate::rtti::type_info::ClassTypeInfo;
use crate::rtti::{CancelToken, RttiContext, RttiError};
use log::{debug, trace};
use std::sync::Arc;

/// Reads the typename of the `type_info` at `address`.
///
/// The name pointer sits one pointer-width past the structure start; the
/// string is materialized on demand and the result is `""` whenever the
/// pointer or the string cannot be resolved. A single leading `*` (an
/// anonymous-namespace marker that breaks demangling) is stripped.
pub fn type_name(image: &dyn MemoryImage, address: Address) -> String {
    let name_slot = address + image.pointer_size() as u64;
    let name_address = match image.read_pointer(name_slot) {
        Ok(addr) if !addr.is_null() => addr,
        _ => return String::new(),
    };
    match image.define_string(name_address) {
        Some(name) => match name.strip_prefix('*') {
            Some(stripped) => stripped.to_string(),
            None => name,
        },
        None => String::new(),
    }
}

/// All addresses in the data-bearing ranges holding `name` as an exact
/// NUL-terminated byte sequence, optionally restricted to `search`.
pub fn find_string_occurrences(
    image: &dyn MemoryImage,
    search: Option<MemoryRange>,
    name: &str,
    cancel: &CancelToken,
) -> Result<Vec<Address>, RttiError> {
    let mut pattern = name.as_bytes().to_vec();
    pattern.push(0);
    let mut occurrences = Vec::new();
    for range in image.data_ranges() {
        cancel.check()?;
        let range = match search {
            Some(search) => match range.intersection(&search) {
                Some(clipped) => clipped,
                None => continue,
            },
            None => range,
        };
        let bytes = match image.read_bytes(range.start, range.len() as usize) {
            Ok(bytes) => bytes,
            Err(_) => continue,
        };
        if bytes.len() < pattern.len() {
            continue;
        }
        for (offset, window) in bytes.windows(pattern.len()).enumerate() {
            if window == pattern.as_slice() {
                occurrences.push(range.start + offset as u64);
            }
        }
    }
    Ok(occurrences)
}

/// All pointer-aligned locations holding a direct reference to `target`,
/// either as an absolute pointer value or through a relocation.
pub fn find_direct_references(
    image: &dyn MemoryImage,
    target: Address,
    alignment: usize,
    cancel: &CancelToken,
) -> Result<Vec<Address>, RttiError> {
    let pointer_size = image.pointer_size();
    let mut pattern = target.as_u64().to_le_bytes()[..pointer_size].to_vec();
    if image.is_big_endian() {
        pattern.reverse();
    }
    let mut references = Vec::new();
    for range in image.data_ranges() {
        cancel.check()?;
        let bytes = match image.read_bytes(range.start, range.len() as usize) {
            Ok(bytes) => bytes,
            Err(_) => continue,
        };
        let mut offset = 0usize;
        let mut since_check = 0u32;
        while offset + pointer_size <= bytes.len() {
            since_check += 1;
            if since_check == 4096 {
                cancel.check()?;
                since_check = 0;
            }
            let slot = range.start + offset as u64;
            if bytes[offset..offset + pointer_size] == pattern[..] {
                references.push(slot);
            } else if let Some(symbol) = image.relocation_at(slot) {
                if image.symbol_address(&symbol) == Some(target) {
                    references.push(slot);
                }
            }
            offset += alignment;
        }
    }
    Ok(references)
}

impl RttiContext {
    /// Locates the `type_info` with the given typename by searching for the
    /// unique string occurrence and walking references back to candidate
    /// structures. Zero or multiple string occurrences both fail closed.
    pub fn find_type_info(
        &self,
        search: Option<MemoryRange>,
        name: &str,
        cancel: &CancelToken,
    ) -> Result<Option<Arc<ClassTypeInfo>>, RttiError> {
        let image = self.image();
        let occurrences = find_string_occurrences(image, search, name, cancel)?;
        if occurrences.len() != 1 {
            debug!("typename {:?}: {} occurrences, not resolving", name, occurrences.len());
            return Ok(None);
        }
        cancel.check()?;
        let references =
            find_direct_references(image, occurrences[0], self.pointer_alignment(), cancel)?;
        for reference in references {
            cancel.check()?;
            if reference.as_u64() < self.pointer_size() {
                continue;
            }
            // The name pointer is always one pointer-width past the start.
            let candidate = reference - self.pointer_size();
            let Some(type_info) = self.identify(candidate) else {
                trace!("reference at {} is not inside a type_info", reference);
                continue;
            };
            if type_info.type_name(image) == name {
                return Ok(Some(type_info));
            }
        }
        Ok(None)
    }
}
