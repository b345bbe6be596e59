// Wed Feb 11 2026 - Alex
//
// Recovery of C++ class hierarchies from GNU/Itanium ABI binaries: finds
// type_info structures, walks their base descriptors, decodes vtables and
// VTTs, and ties constructors to the classes they initialize. Everything
// works against the MemoryImage trait, so the core never cares whether the
// bytes came from an ELF file or a test fixture.

pub mod config;
pub mod memory;
pub mod output;
pub mod rtti;
pub mod symbol;

pub use config::Config;
pub use memory::{load_elf, Address, MemoryError, MemoryImage, MemoryRange, SparseImage};
pub use rtti::{CancelToken, ClassTypeInfo, RttiContext, RttiError, TypeInfoKind, Vtable, Vtt};
