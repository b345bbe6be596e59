// Thu Feb 12 2026 - Alex

mod json;

pub use json::{
    summarize_class, vtable_database, write_json, ClassSummary, ParentSummary, SlotSummary,
    SubTableSummary, VtableSummary,
};
