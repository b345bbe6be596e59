// Wed Feb 11 2026 - Alex

pub mod demangle;

pub use demangle::{
    demangle_type_name, is_destructor_name, try_demangle_function, type_name_components,
};
