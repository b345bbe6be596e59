// Wed Feb 11 2026 - Alex
//
// GNU/Itanium ABI RTTI recovery: type_info identification, base-class
// graphs, vtable and VTT decoding, and constructor correlation.

mod bases;
mod cancel;
mod context;
mod correlate;
mod error;
mod names;
mod type_info;
mod vtable;
mod vtt;

#[cfg(test)]
pub(crate) mod testutil;

pub use bases::{vmi_flags, BaseFlags, VmiFlags, OFFSET_SHIFT};
pub use cancel::CancelToken;
pub use context::{
    RttiContext, CLASS_TYPE_INFO_VTABLE, PURE_VIRTUAL_MARKER, SI_CLASS_TYPE_INFO_VTABLE,
    TYPE_INFO_SYMBOL_PREFIX, VMI_CLASS_TYPE_INFO_VTABLE, VTABLE_SYMBOL_PREFIX, VTT_SYMBOL_PREFIX,
};
pub use correlate::{Assignment, FunctionRole, VtableStore, VtableStoreDetector};
pub use error::RttiError;
pub use names::{find_direct_references, find_string_occurrences, type_name};
pub use type_info::{ClassTypeInfo, ParentEdge, TypeInfoKind};
pub use vtable::{SubTable, Vtable, VtableEntry};
pub use vtt::Vtt;
