// Thu Feb 12 2026 - Alex

use crate::memory::Address;
use crate::rtti::type_info::ClassTypeInfo;
use crate::rtti::vtable::Vtable;
use crate::rtti::{RttiContext, VTT_SYMBOL_PREFIX};
use log::{debug, trace};

/// A virtual table table: the array of vtable-pointer values a constructor
/// of a virtually-inheriting class installs while building subobjects.
///
/// Entry count is advisory. The array carries no length, so parsing stops
/// at the first value that lands outside the relevant vtable regions, and
/// trailing entries may be missed when an unrelated pointer happens to land
/// inside one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vtt {
    address: Address,
    entries: Vec<Address>,
}

impl Vtt {
    pub fn address(&self) -> Address {
        self.address
    }

    /// Targets in construction order; each points into a function-table
    /// region of the owner's vtable or a virtual base's vtable.
    pub fn entries(&self) -> &[Address] {
        &self.entries
    }

    /// A VTT is usable for store correlation only when its first entry is
    /// the owner's primary address point.
    pub fn is_valid(&self, vtable: &Vtable) -> bool {
        match (self.entries.first(), vtable.table_addresses().first()) {
            (Some(first), Some(primary)) => first == primary,
            _ => false,
        }
    }
}

impl RttiContext {
    /// Decodes the VTT at `address` for `owner`, whose vtable has already
    /// been parsed. Classes without virtual bases have no VTT.
    pub fn parse_vtt(&self, address: Address, owner: &ClassTypeInfo, vtable: &Vtable) -> Option<Vtt> {
        let has_virtual_edge = match owner.parents(self) {
            Ok(parents) => parents.iter().any(|e| e.is_virtual),
            Err(_) => false,
        } || owner.virtual_parents(self).map(|v| !v.is_empty()).unwrap_or(false);
        if !has_virtual_edge {
            return None;
        }
        let image = self.image();
        let pointer_size = self.pointer_size();
        let block_end = image.block_end(address)?;
        let limit = match image.next_symbol_after(address) {
            Some(symbol) if symbol < block_end => symbol,
            _ => block_end,
        };

        let virtual_vtables: Vec<Vtable> = owner
            .virtual_parents(self)
            .map(|parents| {
                parents.iter().filter_map(|p| p.vtable(self).cloned()).collect()
            })
            .unwrap_or_default();

        let mut entries = Vec::new();
        let mut cursor = address;
        while cursor + pointer_size <= limit && entries.len() < self.config().max_vtt_entries {
            let value = match image.read_pointer(cursor) {
                Ok(value) => value,
                Err(_) => break,
            };
            let in_owner = points_into_table(vtable, value);
            let in_virtual = virtual_vtables.iter().any(|vt| points_into_table(vt, value));
            if !in_owner && !in_virtual {
                trace!("VTT entry at {} targets {}: outside known vtables, stopping", cursor, value);
                break;
            }
            entries.push(value);
            cursor = cursor + pointer_size;
        }
        if entries.is_empty() {
            return None;
        }
        debug!("VTT for {} at {}: {} entries", owner.address(), address, entries.len());
        Some(Vtt { address, entries })
    }

    /// Locates `owner`'s VTT through its `_ZTT` symbol, falling back to
    /// probing directly after the vtable region: the compiler emits the two
    /// adjacently.
    pub fn find_vtt(&self, owner: &ClassTypeInfo, vtable: &Vtable) -> Option<Vtt> {
        if !self.config().parse_vtts {
            return None;
        }
        let image = self.image();
        let mangled = owner.type_name(image).to_string();
        if !mangled.is_empty() {
            let symbol = format!("{}{}", VTT_SYMBOL_PREFIX, mangled);
            if let Some(addr) = image.symbol_address(&symbol) {
                if let Some(vtt) = self.parse_vtt(addr, owner, vtable) {
                    return Some(vtt);
                }
            }
        }
        self.parse_vtt(vtable.region().end, owner, vtable)
    }
}

/// Whether `value` falls inside one of `vtable`'s function-table regions,
/// i.e. at or past a sub-table's address point and before its end.
fn points_into_table(vtable: &Vtable, value: Address) -> bool {
    let end = vtable.region().end;
    vtable.sub_tables().iter().enumerate().any(|(index, table)| {
        let table_end = vtable
            .sub_tables()
            .get(index + 1)
            .map(|next| next.start)
            .unwrap_or(end);
        value.is_within_range(table.address_point, table_end)
    })
}
