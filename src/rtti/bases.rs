// Thu Feb 12 2026 - Alex

use crate::memory::Address;
use crate::rtti::type_info::{ClassTypeInfo, ParentEdge, TypeInfoKind};
use crate::rtti::{RttiContext, RttiError};
use bitflags::bitflags;
use log::{debug, warn};
use std::collections::HashSet;
use std::sync::Arc;

bitflags! {
    /// Header flags word of a `__vmi_class_type_info`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct VmiFlags: u32 {
        /// A repeated non-virtual base somewhere in the hierarchy.
        const NON_DIAMOND_REPEAT = 0x1;
        /// A virtual base is shared along multiple paths.
        const DIAMOND_SHAPED = 0x2;
    }
}

bitflags! {
    /// Low bits of a base descriptor's packed offset/flags field.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct BaseFlags: u8 {
        const VIRTUAL = 0x1;
        const PUBLIC = 0x2;
    }
}

/// The remaining bits carry the signed byte offset of the base sub-object.
pub const OFFSET_SHIFT: u32 = 8;

/// Descriptor counts past this are treated as corrupt rather than parsed.
const MAX_BASE_COUNT: u32 = 2048;

/// The `__vmi_class_type_info` flags word, when the class has that shape.
pub fn vmi_flags(ctx: &RttiContext, class: &ClassTypeInfo) -> Option<VmiFlags> {
    if class.kind() != TypeInfoKind::MultipleOrVirtualInheritance {
        return None;
    }
    let header = class.address() + 2 * ctx.pointer_size();
    let raw = ctx.image().read_u32(header).ok()?;
    Some(VmiFlags::from_bits_truncate(raw))
}

/// Parses the base-descriptor array following the `type_info` header into
/// ordered parent edges. Descriptor order is construction order and is
/// preserved exactly.
pub fn parse_parents(
    ctx: &RttiContext,
    class: &ClassTypeInfo,
) -> Result<Vec<ParentEdge>, RttiError> {
    let pointer_size = ctx.pointer_size();
    match class.kind() {
        TypeInfoKind::Base => Ok(Vec::new()),
        TypeInfoKind::SingleInheritance => {
            // Exactly one non-virtual public base at offset zero.
            let base_slot = class.address() + 2 * pointer_size;
            let parent = resolve_base(ctx, class, base_slot)?;
            Ok(vec![ParentEdge { class: parent, offset: 0, is_virtual: false, is_public: true }])
        }
        TypeInfoKind::MultipleOrVirtualInheritance => {
            let image = ctx.image();
            let header = class.address() + 2 * pointer_size;
            let flags = VmiFlags::from_bits_truncate(
                image.read_u32(header).map_err(RttiError::Memory)?,
            );
            let count = image.read_u32(header + 4).map_err(RttiError::Memory)?;
            if count == 0 || count > MAX_BASE_COUNT {
                return Err(RttiError::Malformed(
                    header + 4,
                    format!("implausible base count {}", count),
                ));
            }
            debug!("{}: {} base descriptors, flags {:?}", class.address(), count, flags);
            let descriptor_size = 2 * pointer_size;
            let mut parents = Vec::with_capacity(count as usize);
            for index in 0..count as u64 {
                let descriptor = header + 8 + index * descriptor_size;
                let parent = resolve_base(ctx, class, descriptor)?;
                let offset_flags =
                    image.read_int_ptr(descriptor + pointer_size).map_err(RttiError::Memory)?;
                let flags = BaseFlags::from_bits_truncate(offset_flags as u8);
                parents.push(ParentEdge {
                    class: parent,
                    // Arithmetic shift keeps negative virtual-base offsets.
                    offset: offset_flags >> OFFSET_SHIFT,
                    is_virtual: flags.contains(BaseFlags::VIRTUAL),
                    is_public: flags.contains(BaseFlags::PUBLIC),
                });
            }
            Ok(parents)
        }
    }
}

fn resolve_base(
    ctx: &RttiContext,
    class: &ClassTypeInfo,
    slot: Address,
) -> Result<Arc<ClassTypeInfo>, RttiError> {
    let target = ctx.image().read_pointer(slot).map_err(RttiError::Memory)?;
    ctx.identify(target).ok_or_else(|| {
        // A bad base corrupts the offsets of its siblings; the whole graph
        // for this class is rejected.
        warn!("base descriptor of {} references non-type_info {}", class.address(), target);
        RttiError::Malformed(slot, format!("{} is not a type_info", target))
    })
}

/// Transitive virtual-base set: every target of a virtual edge anywhere in
/// the parent graph, deduplicated by address, first-encountered order.
/// Revisits (malformed cycles included) terminate instead of looping.
pub fn collect_virtual_parents(
    ctx: &RttiContext,
    class: &ClassTypeInfo,
) -> Result<Vec<Arc<ClassTypeInfo>>, RttiError> {
    let mut visited = HashSet::new();
    let mut emitted = HashSet::new();
    let mut result = Vec::new();
    visited.insert(class.address());
    walk(ctx, class, &mut visited, &mut emitted, &mut result)?;
    Ok(result)
}

fn walk(
    ctx: &RttiContext,
    class: &ClassTypeInfo,
    visited: &mut HashSet<Address>,
    emitted: &mut HashSet<Address>,
    result: &mut Vec<Arc<ClassTypeInfo>>,
) -> Result<(), RttiError> {
    for edge in class.parents(ctx)? {
        if edge.is_virtual && emitted.insert(edge.class.address()) {
            result.push(edge.class.clone());
        }
        if visited.insert(edge.class.address()) {
            walk(ctx, &edge.class, visited, emitted, result)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rtti::testutil::{
        base_image, ctx, offset_flags, put_class, put_si_class, put_typename, put_vmi_class,
    };

    #[test]
    fn si_class_has_one_trivial_edge() {
        let mut image = base_image();
        put_typename(&mut image, 0x2000, "1A");
        put_typename(&mut image, 0x2010, "1B");
        put_class(&mut image, 0x3000, 0x2000);
        put_si_class(&mut image, 0x3040, 0x2010, 0x3000);
        let ctx = ctx(image);

        let b = ctx.identify(Address::new(0x3040)).unwrap();
        let parents = b.parents(&ctx).unwrap();
        assert_eq!(parents.len(), 1);
        let edge = &parents[0];
        assert_eq!(edge.class.address(), Address::new(0x3000));
        assert_eq!(edge.offset, 0);
        assert!(!edge.is_virtual);
        assert!(edge.is_public);
        assert!(b.has_parent(&ctx).unwrap());
    }

    #[test]
    fn vmi_descriptors_keep_order_offsets_and_flags() {
        let mut image = base_image();
        put_typename(&mut image, 0x2000, "1A");
        put_typename(&mut image, 0x2010, "1B");
        put_typename(&mut image, 0x2020, "1C");
        put_class(&mut image, 0x3000, 0x2000);
        put_class(&mut image, 0x3040, 0x2010);
        put_vmi_class(
            &mut image,
            0x3080,
            0x2020,
            0,
            &[
                (0x3000, offset_flags(0, false, true)),
                (0x3040, offset_flags(16, true, true)),
            ],
        );
        let ctx = ctx(image);

        let c = ctx.identify(Address::new(0x3080)).unwrap();
        let parents = c.parents(&ctx).unwrap();
        assert_eq!(parents.len(), 2);
        assert_eq!(parents[0].class.address(), Address::new(0x3000));
        assert_eq!(parents[0].offset, 0);
        assert!(!parents[0].is_virtual);
        assert_eq!(parents[1].class.address(), Address::new(0x3040));
        assert_eq!(parents[1].offset, 16);
        assert!(parents[1].is_virtual);
        assert!(parents[1].is_public);
    }

    #[test]
    fn negative_virtual_base_offsets_survive_the_shift() {
        let mut image = base_image();
        put_typename(&mut image, 0x2000, "1A");
        put_typename(&mut image, 0x2010, "1B");
        put_class(&mut image, 0x3000, 0x2000);
        put_vmi_class(&mut image, 0x3040, 0x2010, 0, &[(0x3000, offset_flags(-24, true, false))]);
        let ctx = ctx(image);

        let b = ctx.identify(Address::new(0x3040)).unwrap();
        let parents = b.parents(&ctx).unwrap();
        assert_eq!(parents[0].offset, -24);
        assert!(parents[0].is_virtual);
        assert!(!parents[0].is_public);
    }

    #[test]
    fn diamond_collapses_to_one_virtual_parent() {
        let mut image = base_image();
        put_typename(&mut image, 0x2000, "1A");
        put_typename(&mut image, 0x2010, "1B");
        put_typename(&mut image, 0x2020, "1C");
        put_typename(&mut image, 0x2030, "1D");
        put_class(&mut image, 0x3000, 0x2000);
        put_vmi_class(&mut image, 0x3040, 0x2010, 0, &[(0x3000, offset_flags(0, true, true))]);
        put_vmi_class(&mut image, 0x3080, 0x2020, 0, &[(0x3000, offset_flags(0, true, true))]);
        put_vmi_class(
            &mut image,
            0x30c0,
            0x2030,
            VmiFlags::DIAMOND_SHAPED.bits(),
            &[
                (0x3040, offset_flags(0, false, true)),
                (0x3080, offset_flags(16, false, true)),
            ],
        );
        let ctx = ctx(image);

        let d = ctx.identify(Address::new(0x30c0)).unwrap();
        assert_eq!(vmi_flags(&ctx, &d), Some(VmiFlags::DIAMOND_SHAPED));
        let virtual_parents = d.virtual_parents(&ctx).unwrap();
        assert_eq!(virtual_parents.len(), 1);
        assert_eq!(virtual_parents[0].address(), Address::new(0x3000));
    }

    #[test]
    fn implausible_base_count_is_malformed() {
        let mut image = base_image();
        put_typename(&mut image, 0x2000, "1A");
        image.put_ptr(Address::new(0x3000), crate::rtti::testutil::VMI_AP);
        image.put_ptr(Address::new(0x3008), 0x2000);
        image.patch(Address::new(0x3010), &0u32.to_le_bytes());
        image.patch(Address::new(0x3014), &100_000u32.to_le_bytes());
        let ctx = ctx(image);

        let a = ctx.identify(Address::new(0x3000)).unwrap();
        assert!(matches!(a.parents(&ctx), Err(RttiError::Malformed(_, _))));
    }

    #[test]
    fn bad_base_pointer_rejects_the_graph() {
        let mut image = base_image();
        put_typename(&mut image, 0x2000, "1A");
        put_typename(&mut image, 0x2010, "1B");
        // Descriptor points at a typename string, not a type_info.
        put_vmi_class(&mut image, 0x3000, 0x2000, 0, &[(0x2010, offset_flags(0, false, true))]);
        let ctx = ctx(image);

        let a = ctx.identify(Address::new(0x3000)).unwrap();
        assert!(matches!(a.parents(&ctx), Err(RttiError::Malformed(_, _))));
    }
}
