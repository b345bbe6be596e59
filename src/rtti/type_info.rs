// Wed Feb 11 2026 - Alex

use crate::memory::{Address, MemoryImage};
use crate::rtti::bases;
use crate::rtti::names;
use crate::rtti::vtable::Vtable;
use crate::rtti::{RttiContext, RttiError};
use crate::symbol::type_name_components;
use once_cell::sync::OnceCell;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// Inheritance shape of a `type_info` structure, determined solely by which
/// identity vtable its first field points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeInfoKind {
    Base,
    SingleInheritance,
    MultipleOrVirtualInheritance,
}

/// One parent edge in the base-class graph, in descriptor order.
#[derive(Debug, Clone)]
pub struct ParentEdge {
    pub class: Arc<ClassTypeInfo>,
    /// Byte offset of the base sub-object within the derived object.
    pub offset: i64,
    pub is_virtual: bool,
    pub is_public: bool,
}

/// A recovered class: identity is the defining `type_info` address.
///
/// Instances are canonical per address within a session (the context caches
/// them) and immutable after construction; the mangled name, base graph,
/// virtual-base set and vtable are memoized write-once, first writer wins.
pub struct ClassTypeInfo {
    address: Address,
    kind: TypeInfoKind,
    mangled: OnceCell<String>,
    parents: OnceCell<Vec<ParentEdge>>,
    virtual_parents: OnceCell<Vec<Arc<ClassTypeInfo>>>,
    vtable: OnceCell<Option<Vtable>>,
}

impl ClassTypeInfo {
    pub(crate) fn new(address: Address, kind: TypeInfoKind) -> Self {
        Self {
            address,
            kind,
            mangled: OnceCell::new(),
            parents: OnceCell::new(),
            virtual_parents: OnceCell::new(),
            vtable: OnceCell::new(),
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn kind(&self) -> TypeInfoKind {
        self.kind
    }

    /// The mangled typename, read lazily from the string the second field
    /// points at. Empty when the string cannot be materialized.
    pub fn type_name(&self, image: &dyn MemoryImage) -> &str {
        self.mangled.get_or_init(|| names::type_name(image, self.address))
    }

    /// The class's own (unqualified) name.
    pub fn name(&self, image: &dyn MemoryImage) -> String {
        match type_name_components(self.type_name(image)) {
            Some(components) => components.last().cloned().unwrap_or_default(),
            None => self.type_name(image).to_string(),
        }
    }

    /// Canonical architecture-independent name: the namespace path joined
    /// with the class name by `::`. Identical for the same fully-qualified
    /// class across different binaries, so it is usable as a content key.
    pub fn unique_type_name(&self, image: &dyn MemoryImage) -> String {
        match type_name_components(self.type_name(image)) {
            Some(components) => components.join("::"),
            None => self.type_name(image).to_string(),
        }
    }

    /// Direct bases in descriptor order. Empty for `TypeInfoKind::Base`.
    pub fn parents(&self, ctx: &RttiContext) -> Result<&[ParentEdge], RttiError> {
        self.parents
            .get_or_try_init(|| bases::parse_parents(ctx, self))
            .map(|v| v.as_slice())
    }

    pub fn has_parent(&self, ctx: &RttiContext) -> Result<bool, RttiError> {
        Ok(!self.parents(ctx)?.is_empty())
    }

    /// All virtually-inherited bases, transitively, deduplicated by address
    /// with descriptor order preserved.
    pub fn virtual_parents(
        &self,
        ctx: &RttiContext,
    ) -> Result<&[Arc<ClassTypeInfo>], RttiError> {
        self.virtual_parents
            .get_or_try_init(|| bases::collect_virtual_parents(ctx, self))
            .map(|v| v.as_slice())
    }

    /// The class's vtable, located and parsed on first access.
    /// `None` is the no-vtable sentinel.
    pub fn vtable(&self, ctx: &RttiContext) -> Option<&Vtable> {
        self.vtable.get_or_init(|| ctx.find_vtable(self)).as_ref()
    }

    /// True when any slot of the class's own complete vtable is pure
    /// virtual. Without a vtable, abstractness falls back to the direct
    /// parents: an abstract base whose pure slots were never overridden.
    pub fn is_abstract(&self, ctx: &RttiContext) -> bool {
        self.abstract_inner(ctx, &mut HashSet::new())
    }

    fn abstract_inner(&self, ctx: &RttiContext, visited: &mut HashSet<Address>) -> bool {
        if !visited.insert(self.address) {
            return false;
        }
        if let Some(vtable) = self.vtable(ctx) {
            return vtable.has_pure_slot();
        }
        match self.parents(ctx) {
            Ok(parents) => parents.iter().any(|p| p.class.abstract_inner(ctx, visited)),
            Err(_) => false,
        }
    }
}

impl PartialEq for ClassTypeInfo {
    fn eq(&self, other: &Self) -> bool {
        self.address == other.address && self.kind == other.kind
    }
}

impl Eq for ClassTypeInfo {}

impl std::hash::Hash for ClassTypeInfo {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.address.hash(state);
    }
}

impl fmt::Debug for ClassTypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassTypeInfo")
            .field("address", &self.address)
            .field("kind", &self.kind)
            .field("mangled", &self.mangled.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rtti::testutil::{base_image, ctx, put_class, put_si_class, put_typename};

    #[test]
    fn names_demangle_through_the_component_parser() {
        let mut image = base_image();
        put_typename(&mut image, 0x2000, "N3foo3BarE");
        put_class(&mut image, 0x3000, 0x2000);
        let ctx = ctx(image);

        let class = ctx.identify(Address::new(0x3000)).unwrap();
        assert_eq!(class.type_name(ctx.image()), "N3foo3BarE");
        assert_eq!(class.name(ctx.image()), "Bar");
        assert_eq!(class.unique_type_name(ctx.image()), "foo::Bar");
    }

    #[test]
    fn unique_names_are_stable_across_images() {
        let mut first = base_image();
        put_typename(&mut first, 0x2000, "N3foo3BarE");
        put_class(&mut first, 0x3000, 0x2000);
        let first = ctx(first);

        // Same class linked at different addresses in another image.
        let mut second = base_image();
        put_typename(&mut second, 0x2080, "N3foo3BarE");
        put_class(&mut second, 0x3200, 0x2080);
        let second = ctx(second);

        let a = first.identify(Address::new(0x3000)).unwrap();
        let b = second.identify(Address::new(0x3200)).unwrap();
        assert_ne!(a.address(), b.address());
        assert_eq!(a.unique_type_name(first.image()), b.unique_type_name(second.image()));
    }

    #[test]
    fn unparseable_mangling_falls_back_to_the_raw_name() {
        let mut image = base_image();
        put_typename(&mut image, 0x2000, "??bogus");
        put_class(&mut image, 0x3000, 0x2000);
        let ctx = ctx(image);

        let class = ctx.identify(Address::new(0x3000)).unwrap();
        assert_eq!(class.unique_type_name(ctx.image()), "??bogus");
    }

    #[test]
    fn leading_star_is_stripped_from_typenames() {
        let mut image = base_image();
        put_typename(&mut image, 0x2000, "*1A");
        put_class(&mut image, 0x3000, 0x2000);
        let ctx = ctx(image);

        let class = ctx.identify(Address::new(0x3000)).unwrap();
        assert_eq!(class.type_name(ctx.image()), "1A");
    }

    #[test]
    fn value_equality_is_by_address_and_kind() {
        let mut image = base_image();
        put_typename(&mut image, 0x2000, "1A");
        put_typename(&mut image, 0x2010, "1B");
        put_class(&mut image, 0x3000, 0x2000);
        put_si_class(&mut image, 0x3040, 0x2010, 0x3000);
        let ctx = ctx(image);

        let a = ctx.identify(Address::new(0x3000)).unwrap();
        let b = ctx.identify(Address::new(0x3040)).unwrap();
        assert_eq!(*a, *ctx.identify(Address::new(0x3000)).unwrap());
        assert_ne!(*a, *b);
    }
}
