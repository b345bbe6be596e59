// Wed Feb 11 2026 - Alex

use crate::config::Config;
use crate::memory::{Address, MemoryImage};
use crate::rtti::type_info::{ClassTypeInfo, TypeInfoKind};
use crate::rtti::{CancelToken, RttiError};
use log::debug;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Identity vtables of the `type_info` family, one per inheritance shape.
pub const CLASS_TYPE_INFO_VTABLE: &str = "_ZTVN10__cxxabiv117__class_type_infoE";
pub const SI_CLASS_TYPE_INFO_VTABLE: &str = "_ZTVN10__cxxabiv120__si_class_type_infoE";
pub const VMI_CLASS_TYPE_INFO_VTABLE: &str = "_ZTVN10__cxxabiv121__vmi_class_type_infoE";

/// Runtime-support function installed in pure virtual slots.
pub const PURE_VIRTUAL_MARKER: &str = "__cxa_pure_virtual";

pub const TYPE_INFO_SYMBOL_PREFIX: &str = "_ZTI";
pub const VTABLE_SYMBOL_PREFIX: &str = "_ZTV";
pub const VTT_SYMBOL_PREFIX: &str = "_ZTT";

const KNOWN_VTABLES: [(&str, TypeInfoKind); 3] = [
    (CLASS_TYPE_INFO_VTABLE, TypeInfoKind::Base),
    (SI_CLASS_TYPE_INFO_VTABLE, TypeInfoKind::SingleInheritance),
    (VMI_CLASS_TYPE_INFO_VTABLE, TypeInfoKind::MultipleOrVirtualInheritance),
];

/// Per-session analysis state.
///
/// Resolves the well-known vtable addresses and the pure-virtual marker once
/// at construction, and holds the canonical per-Address [`ClassTypeInfo`]
/// cache so repeated identification of the same address yields the same
/// instance. The context is reentrant across images: nothing here is global.
pub struct RttiContext {
    image: Arc<dyn MemoryImage>,
    config: Config,
    kind_by_vtable: HashMap<Address, TypeInfoKind>,
    kind_by_symbol: HashMap<String, TypeInfoKind>,
    pure_virtual: Option<Address>,
    cancel: CancelToken,
    cache: RwLock<HashMap<Address, Option<Arc<ClassTypeInfo>>>>,
}

impl RttiContext {
    pub fn new(image: Arc<dyn MemoryImage>, config: Config) -> Result<Self, RttiError> {
        if !image.is_gnu() {
            return Err(RttiError::Unsupported("not a GNU-family toolchain image".into()));
        }
        let pointer_size = image.pointer_size() as u64;
        let mut kind_by_vtable = HashMap::new();
        let mut kind_by_symbol = HashMap::new();
        for (symbol, kind) in KNOWN_VTABLES {
            kind_by_symbol.insert(symbol.to_string(), kind);
            if let Some(addr) = image.symbol_address(symbol) {
                // A type_info's identity pointer targets the vtable's address
                // point, two slots past the symbol. Accept both forms.
                kind_by_vtable.insert(addr, kind);
                kind_by_vtable.insert(addr + 2 * pointer_size, kind);
                debug!("{} resolved to {}", symbol, addr);
            }
        }
        let pure_virtual = image.symbol_address(PURE_VIRTUAL_MARKER);
        Ok(Self {
            image,
            config,
            kind_by_vtable,
            kind_by_symbol,
            pure_virtual,
            cancel: CancelToken::new(),
            cache: RwLock::new(HashMap::new()),
        })
    }

    pub fn image(&self) -> &dyn MemoryImage {
        self.image.as_ref()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn pointer_size(&self) -> u64 {
        self.image.pointer_size() as u64
    }

    pub fn pointer_alignment(&self) -> usize {
        self.config.pointer_alignment.unwrap_or_else(|| self.image.pointer_size())
    }

    /// Address of `__cxa_pure_virtual`, if the image exposes it.
    pub fn pure_virtual_marker(&self) -> Option<Address> {
        self.pure_virtual
    }

    /// The session token checked by every scan this context starts,
    /// including ones triggered lazily through memoized accessors. Cancel
    /// it to wind down analysis from another thread.
    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Classifies `address` as a `type_info` structure.
    ///
    /// Total over addresses: out-of-range or mismatching input yields `None`.
    /// Results are cached per address, so identification is idempotent and
    /// every caller observes the same canonical instance.
    pub fn identify(&self, address: Address) -> Option<Arc<ClassTypeInfo>> {
        if let Some(cached) = self.cache.read().get(&address) {
            return cached.clone();
        }
        let resolved = self.identify_uncached(address);
        let mut cache = self.cache.write();
        // First writer wins; racing identifications are value-equal anyway.
        cache.entry(address).or_insert(resolved).clone()
    }

    fn identify_uncached(&self, address: Address) -> Option<Arc<ClassTypeInfo>> {
        let kind = match self.image.relocation_at(address) {
            Some(symbol) => self.kind_by_symbol.get(symbol.as_str()).copied(),
            None => {
                let vtable = self.image.read_pointer(address).ok()?;
                self.kind_by_vtable.get(&vtable).copied()
            }
        }?;
        debug!("type_info at {} identified as {:?}", address, kind);
        Some(Arc::new(ClassTypeInfo::new(address, kind)))
    }

    /// All `type_info` structures reachable from `_ZTI*` symbols, in symbol
    /// address order. A symbol present in both symbol tables yields one entry.
    pub fn enumerate_class_type_infos(&self) -> Vec<Arc<ClassTypeInfo>> {
        let mut seen = HashSet::new();
        self.image
            .symbols_matching(TYPE_INFO_SYMBOL_PREFIX)
            .into_iter()
            .filter(|symbol| seen.insert(symbol.address))
            .filter_map(|symbol| self.identify(symbol.address))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rtti::testutil::{base_image, ctx, put_class, put_typename};

    #[test]
    fn identify_is_idempotent_and_canonical() {
        let mut image = base_image();
        put_typename(&mut image, 0x2000, "1A");
        put_class(&mut image, 0x3000, 0x2000);
        let ctx = ctx(image);

        let first = ctx.identify(Address::new(0x3000)).unwrap();
        let second = ctx.identify(Address::new(0x3000)).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.kind(), TypeInfoKind::Base);
        assert_eq!(first.address(), Address::new(0x3000));
    }

    #[test]
    fn concurrent_identification_shares_one_instance() {
        let mut image = base_image();
        put_typename(&mut image, 0x2000, "1A");
        put_class(&mut image, 0x3000, 0x2000);
        let ctx = ctx(image);

        let resolved = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..4)
                .map(|_| scope.spawn(|| ctx.identify(Address::new(0x3000)).unwrap()))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect::<Vec<_>>()
        });
        for pair in resolved.windows(2) {
            assert!(Arc::ptr_eq(&pair[0], &pair[1]));
        }
    }

    #[test]
    fn identify_rejects_unrelated_addresses() {
        let mut image = base_image();
        put_typename(&mut image, 0x2000, "1A");
        put_class(&mut image, 0x3000, 0x2000);
        let ctx = ctx(image);

        // Mapped but pointing nowhere known.
        assert!(ctx.identify(Address::new(0x3100)).is_none());
        // Unmapped.
        assert!(ctx.identify(Address::new(0x9000)).is_none());
        // Repeat query stays None.
        assert!(ctx.identify(Address::new(0x3100)).is_none());
    }

    #[test]
    fn identify_through_relocation() {
        let mut image = base_image();
        put_typename(&mut image, 0x2000, "1B");
        put_typename(&mut image, 0x2010, "1A");
        put_class(&mut image, 0x3000, 0x2010);
        // Slot left zero; only the relocation names the identity vtable.
        image.add_relocation(Address::new(0x3040), SI_CLASS_TYPE_INFO_VTABLE);
        image.put_ptr(Address::new(0x3048), 0x2000);
        image.put_ptr(Address::new(0x3050), 0x3000);
        let ctx = ctx(image);

        let class = ctx.identify(Address::new(0x3040)).unwrap();
        assert_eq!(class.kind(), TypeInfoKind::SingleInheritance);
    }

    #[test]
    fn enumerate_deduplicates_symbol_tables() {
        let mut image = base_image();
        put_typename(&mut image, 0x2000, "1A");
        put_class(&mut image, 0x3000, 0x2000);
        // Same address in symtab and dynsym.
        image.add_symbol("_ZTI1A", Address::new(0x3000));
        image.add_symbol("_ZTI1A", Address::new(0x3000));
        let ctx = ctx(image);

        let classes = ctx.enumerate_class_type_infos();
        assert_eq!(classes.len(), 1);
        assert_eq!(classes[0].address(), Address::new(0x3000));
    }

    #[test]
    fn rejects_non_gnu_images() {
        let mut image = base_image();
        image.set_gnu(false);
        let result = RttiContext::new(Arc::new(image), crate::config::Config::default());
        assert!(matches!(result, Err(RttiError::Unsupported(_))));
    }
}
