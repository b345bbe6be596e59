// Thu Feb 12 2026 - Alex

use crate::memory::{Address, ImageFunction, MemoryImage, MemoryRange};
use crate::rtti::names::find_direct_references;
use crate::rtti::type_info::ClassTypeInfo;
use crate::rtti::{RttiContext, VTABLE_SYMBOL_PREFIX};
use crate::symbol::is_destructor_name;
use log::{debug, trace, warn};
use std::collections::HashSet;

/// One decoded vtable slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VtableEntry {
    /// Signed byte offset from this sub-table's `this` to the complete
    /// object. Zero for the primary table, negative for secondary tables.
    OffsetToTop(i64),
    /// Pointer to the owning class's `type_info`.
    RttiPointer(Address),
    /// A virtual function slot. Pure slots keep the marker address but
    /// resolve to no function.
    FunctionSlot { address: Option<Address>, is_pure: bool },
}

/// One ABI sub-table: header pair followed by function slots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubTable {
    pub start: Address,
    /// Start of the function slots, two pointer-widths past `start`. This
    /// is the value stored into objects' vtable-pointer fields.
    pub address_point: Address,
    pub entries: Vec<VtableEntry>,
}

impl SubTable {
    pub fn function_slots(&self) -> impl Iterator<Item = &VtableEntry> {
        self.entries.iter().filter(|e| matches!(e, VtableEntry::FunctionSlot { .. }))
    }
}

/// A parsed vtable region: one or more contiguous sub-tables, every one
/// anchored to the owning class through its RTTI pointer.
///
/// Sub-table boundaries are heuristic (see the parser); callers should
/// treat trailing entries as advisory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vtable {
    address: Address,
    owner: Address,
    end: Address,
    sub_tables: Vec<SubTable>,
}

impl Vtable {
    pub fn address(&self) -> Address {
        self.address
    }

    /// `type_info` address of the owning class.
    pub fn owner(&self) -> Address {
        self.owner
    }

    pub fn region(&self) -> MemoryRange {
        MemoryRange::new(self.address, self.end)
    }

    pub fn sub_tables(&self) -> &[SubTable] {
        &self.sub_tables
    }

    /// Function-table start addresses, in sub-table order.
    pub fn table_addresses(&self) -> Vec<Address> {
        self.sub_tables.iter().map(|t| t.address_point).collect()
    }

    /// Resolved function references per sub-table; `None` is preserved for
    /// pure and unresolved slots.
    pub fn function_tables(&self, image: &dyn MemoryImage) -> Vec<Vec<Option<ImageFunction>>> {
        self.sub_tables
            .iter()
            .map(|table| {
                table
                    .function_slots()
                    .map(|entry| match entry {
                        VtableEntry::FunctionSlot { address: Some(addr), is_pure: false } => {
                            image.function_at(*addr)
                        }
                        _ => None,
                    })
                    .collect()
            })
            .collect()
    }

    pub fn contains_address(&self, addr: Address) -> bool {
        addr.is_within_range(self.address, self.end)
    }

    pub fn contains_function(&self, addr: Address) -> bool {
        self.sub_tables.iter().flat_map(|t| t.function_slots()).any(|entry| {
            matches!(entry, VtableEntry::FunctionSlot { address: Some(a), .. } if *a == addr)
        })
    }

    pub fn has_pure_slot(&self) -> bool {
        self.sub_tables
            .iter()
            .flat_map(|t| t.function_slots())
            .any(|entry| matches!(entry, VtableEntry::FunctionSlot { is_pure: true, .. }))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HeaderMatch {
    /// RTTI pointer resolves to the owner (identity or matching unique name
    /// for COMDAT-shared vtables).
    Owner,
    /// Resolves to a class reachable in the owner's base graph: an adjacent
    /// construction table grouped with this vtable.
    Reachable,
    /// Some other class: the next vtable in the block.
    Foreign,
}

impl RttiContext {
    /// Decodes the vtable region at `address` owned by `owner`.
    ///
    /// Returns `None` when the first header does not anchor to `owner`; a
    /// later mismatching header only terminates parsing at that point.
    pub fn parse_vtable(&self, address: Address, owner: &ClassTypeInfo) -> Option<Vtable> {
        let image = self.image();
        let pointer_size = self.pointer_size();
        let block_end = image.block_end(address)?;
        let limit = match image.next_symbol_after(address) {
            Some(symbol) if symbol < block_end => symbol,
            _ => block_end,
        };
        let allow_secondary = self.needs_secondary_tables(owner);

        let mut sub_tables: Vec<SubTable> = Vec::new();
        let mut cursor = address;
        let mut done = false;
        while !done {
            let Some((offset_to_top, rtti, matched)) = self.classify_header(owner, cursor, limit)
            else {
                break;
            };
            if sub_tables.is_empty() {
                if matched != HeaderMatch::Owner {
                    trace!("header at {} does not anchor to {}", cursor, owner.address());
                    return None;
                }
            } else if matched == HeaderMatch::Foreign || !allow_secondary {
                break;
            }
            let start = cursor;
            let mut entries =
                vec![VtableEntry::OffsetToTop(offset_to_top), VtableEntry::RttiPointer(rtti)];
            cursor = cursor + 2 * pointer_size;
            let address_point = cursor;
            let mut slot_count = 0usize;
            while cursor + pointer_size <= limit && slot_count < self.config().max_table_slots {
                if self.classify_header(owner, cursor, limit).is_some() {
                    break;
                }
                let value = match image.read_pointer(cursor) {
                    Ok(value) => value,
                    Err(_) => {
                        done = true;
                        break;
                    }
                };
                if value.is_null() {
                    // Deleting-destructor pairs may leave one null slot; an
                    // unpaired null ends the region.
                    if !last_slot_is_destructor(image, entries.last()) {
                        done = true;
                        break;
                    }
                    entries.push(VtableEntry::FunctionSlot { address: None, is_pure: false });
                } else if !image.contains(value) {
                    done = true;
                    break;
                } else {
                    entries.push(VtableEntry::FunctionSlot {
                        address: Some(value),
                        is_pure: self.pure_virtual_marker() == Some(value),
                    });
                }
                cursor = cursor + pointer_size;
                slot_count += 1;
            }
            sub_tables.push(SubTable { start, address_point, entries });
        }

        let vtable = Vtable { address, owner: owner.address(), end: cursor, sub_tables };
        if vtable.sub_tables.is_empty()
            || vtable.sub_tables[0].function_slots().next().is_none()
        {
            return None;
        }
        if allow_secondary && vtable.sub_tables.len() == 1 {
            warn!(
                "{} has secondary dispatch bases but only the primary table was found",
                owner.address()
            );
        }
        debug!(
            "vtable for {} at {}: {} sub-tables, region {}",
            owner.address(),
            address,
            vtable.sub_tables.len(),
            vtable.region()
        );
        Some(vtable)
    }

    /// Locates and parses `owner`'s vtable: through its `_ZTV` symbol when
    /// one exists, otherwise by scanning for references to the `type_info`
    /// and validating each as an RTTI slot preceded by an offset-to-top.
    pub(crate) fn find_vtable(&self, owner: &ClassTypeInfo) -> Option<Vtable> {
        let image = self.image();
        let mangled = owner.type_name(image).to_string();
        if !mangled.is_empty() {
            let symbol = format!("{}{}", VTABLE_SYMBOL_PREFIX, mangled);
            if let Some(addr) = image.symbol_address(&symbol) {
                if let Some(vtable) = self.parse_vtable(addr, owner) {
                    return Some(vtable);
                }
            }
        }
        let references = find_direct_references(
            image,
            owner.address(),
            self.pointer_alignment(),
            self.cancel_token(),
        )
        .ok()?;
        for reference in references {
            if reference.as_u64() < self.pointer_size() {
                continue;
            }
            let candidate = reference - self.pointer_size();
            if let Some(vtable) = self.parse_vtable(candidate, owner) {
                return Some(vtable);
            }
        }
        None
    }

    /// Reinterprets the pair at `at` as an offset-to-top plus RTTI pointer.
    /// Inherently ambiguous when a function pointer coincides with a small
    /// offset value; bounded by `Config::max_offset_to_top` only.
    fn classify_header(
        &self,
        owner: &ClassTypeInfo,
        at: Address,
        limit: Address,
    ) -> Option<(i64, Address, HeaderMatch)> {
        let image = self.image();
        let pointer_size = self.pointer_size();
        if at + 2 * pointer_size > limit {
            return None;
        }
        let offset_to_top = image.read_int_ptr(at).ok()?;
        if offset_to_top.unsigned_abs() > self.config().max_offset_to_top as u64 {
            return None;
        }
        let rtti = image.read_pointer(at + pointer_size).ok()?;
        let type_info = self.identify(rtti)?;
        let matched = if type_info.address() == owner.address() {
            HeaderMatch::Owner
        } else {
            let owner_name = owner.unique_type_name(image);
            if !owner_name.is_empty() && type_info.unique_type_name(image) == owner_name {
                HeaderMatch::Owner
            } else if self.reachable_from(owner, type_info.address()) {
                HeaderMatch::Reachable
            } else {
                HeaderMatch::Foreign
            }
        };
        Some((offset_to_top, rtti, matched))
    }

    fn needs_secondary_tables(&self, owner: &ClassTypeInfo) -> bool {
        match owner.parents(self) {
            Ok(parents) => {
                parents.len() > 1
                    || owner.virtual_parents(self).map(|v| !v.is_empty()).unwrap_or(false)
            }
            Err(_) => false,
        }
    }

    fn reachable_from(&self, owner: &ClassTypeInfo, target: Address) -> bool {
        let mut visited = HashSet::new();
        let mut stack = vec![owner.address()];
        visited.insert(owner.address());
        while let Some(addr) = stack.pop() {
            let Some(class) = self.identify(addr) else { continue };
            let Ok(parents) = class.parents(self) else { continue };
            for edge in parents {
                let parent = edge.class.address();
                if parent == target {
                    return true;
                }
                if visited.insert(parent) {
                    stack.push(parent);
                }
            }
        }
        false
    }
}

fn last_slot_is_destructor(image: &dyn MemoryImage, last: Option<&VtableEntry>) -> bool {
    match last {
        Some(VtableEntry::FunctionSlot { address: Some(addr), is_pure: false }) => image
            .function_at(*addr)
            .map(|f| is_destructor_name(&f.name))
            .unwrap_or(false),
        _ => false,
    }
}
