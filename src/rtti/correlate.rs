// Thu Feb 12 2026 - Alex

use crate::memory::{Address, ImageFunction};
use crate::rtti::type_info::ClassTypeInfo;
use crate::rtti::vtable::Vtable;
use crate::rtti::vtt::Vtt;
use crate::rtti::RttiContext;
use crate::symbol::is_destructor_name;
use log::{debug, trace};
use serde::Serialize;
use std::collections::HashMap;

/// One observed write of a vtable-region address into an object, as reported
/// by an instruction-level detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VtableStore {
    /// Address of the storing instruction.
    pub site: Address,
    /// The value being stored: an address point or a VTT entry target.
    pub value: Address,
    /// Whether `value` was observed to come through a VTT entry rather than
    /// as an immediate address point.
    pub at_entry: bool,
}

/// Supplies vtable-store observations for a function body. Instruction
/// decoding lives behind this seam so the correlation logic stays
/// architecture-independent.
pub trait VtableStoreDetector {
    fn vtable_stores(&self, function: &ImageFunction) -> Vec<VtableStore>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FunctionRole {
    Constructor,
    Destructor,
}

/// A function tied to the class whose vtable pointer it installs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    pub function: ImageFunction,
    pub store_site: Address,
    /// `type_info` address of the class the store initializes.
    pub class: Address,
    pub role: FunctionRole,
    /// Index into the VTT for stores routed through one; `None` for direct
    /// address-point stores.
    pub vtt_index: Option<usize>,
}

impl RttiContext {
    /// Correlates candidate functions with `owner` by the vtable-pointer
    /// values they store.
    ///
    /// With a valid VTT the construction order is recoverable: each store of
    /// a VTT entry target maps to that entry's index, and the entry's target
    /// region names the subobject being initialized (index zero is always the
    /// complete object). Without one, only stores of the primary address
    /// point are attributed, and only to `owner`.
    pub fn correlate(
        &self,
        owner: &ClassTypeInfo,
        vtable: &Vtable,
        vtt: Option<&Vtt>,
        candidates: &[ImageFunction],
        detector: &dyn VtableStoreDetector,
    ) -> Vec<Assignment> {
        let entry_classes = match vtt {
            Some(vtt) if vtt.is_valid(vtable) => Some(self.vtt_entry_classes(owner, vtable, vtt)),
            Some(_) => {
                debug!("VTT for {} fails the primary-entry check, ignoring it", owner.address());
                None
            }
            None => None,
        };
        let primary = vtable.table_addresses().first().copied();

        let mut assignments: Vec<Assignment> = Vec::new();
        for function in candidates {
            let role = function_role(function);
            // One report per (function, vtt index); when a constructor both
            // loads through the VTT and re-stores the raw address point,
            // prefer the VTT-routed observation.
            let mut best: HashMap<Option<usize>, (Assignment, bool)> = HashMap::new();
            for store in detector.vtable_stores(function) {
                let resolved = match (&entry_classes, vtt) {
                    (Some(classes), Some(vtt)) => vtt
                        .entries()
                        .iter()
                        .position(|entry| *entry == store.value)
                        .map(|index| (classes[index], Some(index))),
                    _ => None,
                };
                let (class, vtt_index) = match resolved {
                    Some(found) => found,
                    None => {
                        if primary != Some(store.value) {
                            trace!(
                                "store at {} of {} matches no entry for {}",
                                store.site,
                                store.value,
                                owner.address()
                            );
                            continue;
                        }
                        (owner.address(), None)
                    }
                };
                let assignment = Assignment {
                    function: function.clone(),
                    store_site: store.site,
                    class,
                    role,
                    vtt_index,
                };
                match best.get(&vtt_index) {
                    Some((_, true)) => {}
                    Some(_) if !store.at_entry => {}
                    _ => {
                        best.insert(vtt_index, (assignment, store.at_entry));
                    }
                }
            }
            assignments.extend(best.into_values().map(|(assignment, _)| assignment));
        }
        // Construction order: VTT-routed stores by entry index, then direct
        // stores, then by function entry for stability.
        assignments.sort_by_key(|a| {
            (a.vtt_index.map_or(usize::MAX, |i| i), a.function.entry, a.store_site)
        });
        assignments
    }

    /// Maps each VTT entry to the `type_info` address of the subobject it
    /// initializes: the owner for entries into its own vtable, otherwise the
    /// virtual base whose vtable region contains the target.
    fn vtt_entry_classes(
        &self,
        owner: &ClassTypeInfo,
        vtable: &Vtable,
        vtt: &Vtt,
    ) -> Vec<Address> {
        let virtual_parents: Vec<_> = owner
            .virtual_parents(self)
            .map(|parents| parents.to_vec())
            .unwrap_or_default();
        vtt.entries()
            .iter()
            .enumerate()
            .map(|(index, entry)| {
                if index == 0 || vtable.contains_address(*entry) {
                    return owner.address();
                }
                virtual_parents
                    .iter()
                    .find(|parent| {
                        parent
                            .vtable(self)
                            .map(|vt| vt.contains_address(*entry))
                            .unwrap_or(false)
                    })
                    .map(|parent| parent.address())
                    .unwrap_or_else(|| owner.address())
            })
            .collect()
    }
}

fn function_role(function: &ImageFunction) -> FunctionRole {
    if is_destructor_name(&function.name) {
        FunctionRole::Destructor
    } else {
        FunctionRole::Constructor
    }
}
