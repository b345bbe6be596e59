// Wed Feb 11 2026 - Alex

use serde::{Deserialize, Serialize};

/// Tuning knobs for the RTTI recovery core.
///
/// The defaults match the heuristics the parsers were tuned against; they
/// are exposed mostly so hosts can tighten bounds for unusual images.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Hard cap on function slots parsed per vtable sub-table.
    pub max_table_slots: usize,
    /// Plausibility bound for an offset-to-top header value, in bytes.
    pub max_offset_to_top: i64,
    /// Hard cap on VTT entries.
    pub max_vtt_entries: usize,
    /// Alignment used when scanning for pointer-sized references.
    /// `None` means the image's pointer width.
    pub pointer_alignment: Option<usize>,
    /// Whether to look for and parse VTTs for classes with virtual bases.
    pub parse_vtts: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_table_slots: 512,
            max_offset_to_top: 1 << 20,
            max_vtt_entries: 256,
            pointer_alignment: None,
            parse_vtts: true,
        }
    }
}
