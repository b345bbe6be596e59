// Thu Feb 12 2026 - Alex

use crate::memory::MemoryImage;
use crate::rtti::{ClassTypeInfo, RttiContext, TypeInfoKind, Vtable, VtableEntry};
use indexmap::IndexMap;
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Arc;

#[derive(Debug, Clone, Serialize)]
pub struct ParentSummary {
    pub name: String,
    pub address: u64,
    pub offset: i64,
    pub is_virtual: bool,
    pub is_public: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SlotSummary {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function: Option<String>,
    pub is_pure: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubTableSummary {
    pub address_point: u64,
    pub offset_to_top: i64,
    pub slots: Vec<SlotSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct VtableSummary {
    pub address: u64,
    pub end: u64,
    pub sub_tables: Vec<SubTableSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClassSummary {
    pub name: String,
    pub mangled: String,
    pub address: u64,
    pub kind: &'static str,
    pub is_abstract: bool,
    pub parents: Vec<ParentSummary>,
    pub virtual_parents: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vtable: Option<VtableSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vtt: Option<Vec<u64>>,
}

fn kind_label(kind: TypeInfoKind) -> &'static str {
    match kind {
        TypeInfoKind::Base => "class",
        TypeInfoKind::SingleInheritance => "si_class",
        TypeInfoKind::MultipleOrVirtualInheritance => "vmi_class",
    }
}

/// Flattens one recovered class into its serializable summary. Base-graph
/// failures degrade to empty lists rather than dropping the class.
pub fn summarize_class(ctx: &RttiContext, class: &Arc<ClassTypeInfo>) -> ClassSummary {
    let image = ctx.image();
    let parents = class
        .parents(ctx)
        .map(|edges| {
            edges
                .iter()
                .map(|edge| ParentSummary {
                    name: edge.class.name(image),
                    address: edge.class.address().as_u64(),
                    offset: edge.offset,
                    is_virtual: edge.is_virtual,
                    is_public: edge.is_public,
                })
                .collect()
        })
        .unwrap_or_default();
    let virtual_parents = class
        .virtual_parents(ctx)
        .map(|parents| parents.iter().map(|p| p.name(image)).collect())
        .unwrap_or_default();
    let vtable = class.vtable(ctx).map(|vt| summarize_vtable(image, vt));
    let vtt = class
        .vtable(ctx)
        .and_then(|vt| ctx.find_vtt(class, vt))
        .map(|vtt| vtt.entries().iter().map(|e| e.as_u64()).collect());
    ClassSummary {
        name: class.name(image),
        mangled: class.type_name(image).to_string(),
        address: class.address().as_u64(),
        kind: kind_label(class.kind()),
        is_abstract: class.is_abstract(ctx),
        parents,
        virtual_parents,
        vtable,
        vtt,
    }
}

fn summarize_vtable(image: &dyn MemoryImage, vtable: &Vtable) -> VtableSummary {
    let sub_tables = vtable
        .sub_tables()
        .iter()
        .map(|table| {
            let offset_to_top = table
                .entries
                .iter()
                .find_map(|entry| match entry {
                    VtableEntry::OffsetToTop(offset) => Some(*offset),
                    _ => None,
                })
                .unwrap_or(0);
            let slots = table
                .function_slots()
                .map(|entry| match entry {
                    VtableEntry::FunctionSlot { address, is_pure } => {
                        let address = *address;
                        SlotSummary {
                            address: address.map(|a| a.as_u64()),
                            function: address
                                .filter(|_| !*is_pure)
                                .and_then(|a| image.function_at(a))
                                .map(|f| f.name),
                            is_pure: *is_pure,
                        }
                    }
                    _ => SlotSummary { address: None, function: None, is_pure: false },
                })
                .collect();
            SubTableSummary {
                address_point: table.address_point.as_u64(),
                offset_to_top,
                slots,
            }
        })
        .collect();
    VtableSummary {
        address: vtable.address().as_u64(),
        end: vtable.region().end.as_u64(),
        sub_tables,
    }
}

/// Builds the vtable database: unique type name mapped to one list of
/// demangled function names per sub-table, empty strings standing in for
/// pure and null slots. Classes without a recovered vtable are skipped.
pub fn vtable_database(
    ctx: &RttiContext,
    classes: &[Arc<ClassTypeInfo>],
) -> IndexMap<String, Vec<Vec<String>>> {
    let image = ctx.image();
    let mut database = IndexMap::new();
    for class in classes {
        let Some(vtable) = class.vtable(ctx) else { continue };
        let tables = vtable
            .function_tables(image)
            .into_iter()
            .map(|table| {
                table
                    .into_iter()
                    .map(|function| function.map(|f| f.name).unwrap_or_default())
                    .collect()
            })
            .collect();
        database.insert(class.unique_type_name(image), tables);
    }
    database
}

pub fn write_json<P: AsRef<Path>, T: Serialize>(path: P, value: &T) -> std::io::Result<()> {
    let file = File::create(path.as_ref())?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, value)?;
    writer.write_all(b"\n")?;
    writer.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::Address;
    use crate::rtti::testutil::{base_image, ctx, put_class, put_si_class, put_typename};

    #[test]
    fn summaries_flatten_names_parents_and_vtables() {
        let mut image = base_image();
        put_typename(&mut image, 0x2000, "1A");
        put_typename(&mut image, 0x2010, "1B");
        put_class(&mut image, 0x3000, 0x2000);
        put_si_class(&mut image, 0x3040, 0x2010, 0x3000);
        image.put_ptr(Address::new(0x4000), 0);
        image.put_ptr(Address::new(0x4008), 0x3040);
        image.put_ptr(Address::new(0x4010), 0x10100);
        image.add_function(Address::new(0x10100), "_ZN1B3fooEv");
        image.add_symbol("_ZTV1B", Address::new(0x4000));
        let ctx = ctx(image);

        let b = ctx.identify(Address::new(0x3040)).unwrap();
        let summary = summarize_class(&ctx, &b);
        assert_eq!(summary.name, "B");
        assert_eq!(summary.mangled, "1B");
        assert_eq!(summary.kind, "si_class");
        assert_eq!(summary.parents.len(), 1);
        assert_eq!(summary.parents[0].name, "A");
        assert!(!summary.is_abstract);
        let vtable = summary.vtable.expect("vtable should be summarized");
        assert_eq!(vtable.sub_tables.len(), 1);
        assert_eq!(
            vtable.sub_tables[0].slots[0].function.as_deref(),
            Some("_ZN1B3fooEv")
        );
        assert!(summary.vtt.is_none());
    }

    #[test]
    fn vtable_database_uses_unique_names_and_blanks_unresolved_slots() {
        let mut image = base_image();
        put_typename(&mut image, 0x2000, "N3foo3BarE");
        put_class(&mut image, 0x3000, 0x2000);
        image.add_symbol("_ZTI3Bar", Address::new(0x3000));
        image.put_ptr(Address::new(0x4000), 0);
        image.put_ptr(Address::new(0x4008), 0x3000);
        image.put_ptr(Address::new(0x4010), 0x10100);
        image.put_ptr(Address::new(0x4018), crate::rtti::testutil::PURE_VIRTUAL_ADDR);
        image.add_function(Address::new(0x10100), "_ZN3foo3Bar3runEv");
        image.add_symbol("_ZTVN3foo3BarE", Address::new(0x4000));
        let ctx = ctx(image);

        let classes = ctx.enumerate_class_type_infos();
        let database = vtable_database(&ctx, &classes);
        let tables = database.get("foo::Bar").expect("keyed by unique name");
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0], vec!["_ZN3foo3Bar3runEv".to_string(), String::new()]);

        // The database serializes as a JSON object keyed by typename.
        let rendered = serde_json::to_value(&database).unwrap();
        assert!(rendered.get("foo::Bar").is_some());
        assert_eq!(rendered["foo::Bar"][0][0], "_ZN3foo3Bar3runEv");
    }
}
