//! Capability cache.
//!
//! Proc-address tables and extension sets are expensive to build and depend
//! only on a context's [`ContextIdentity`]. The first context with a given
//! identity populates them; every later one reuses the same entry. All three
//! caches are keyed by the identity string and guarded by one lock, so a
//! populating thread never exposes a half-built entry.

mod extensions;
pub mod names;
mod proc_table;

pub use extensions::ExtensionSet;
pub use proc_table::ProcAddressTable;

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::binding::GlBinding;
use crate::identity::ContextIdentity;
use crate::lookup::DynamicLookup;
use crate::platform::{DriverQuery, PlatformKind};
use crate::surface::NativeHandle;

/// Cached capabilities of one context identity.
#[derive(Debug)]
pub struct CapabilityEntry {
    identity: ContextIdentity,
    binding: GlBinding,
    platform: PlatformKind,
    gl_table: ProcAddressTable,
    platform_table: ProcAddressTable,
    extensions: ExtensionSet,
}

impl CapabilityEntry {
    pub fn identity(&self) -> &ContextIdentity {
        &self.identity
    }

    pub fn binding(&self) -> GlBinding {
        self.binding
    }

    pub fn gl_table(&self) -> &ProcAddressTable {
        &self.gl_table
    }

    pub fn platform_table(&self) -> &ProcAddressTable {
        &self.platform_table
    }

    pub fn extensions(&self) -> &ExtensionSet {
        &self.extensions
    }

    /// Whether the entry point is in the GL or the platform table.
    pub fn has_function(&self, name: &str) -> bool {
        self.gl_table.contains(name) || self.platform_table.contains(name)
    }

    /// Whether the extension is reported, after platform name aliasing.
    pub fn has_extension(&self, name: &str) -> bool {
        self.extensions
            .contains(self.platform.map_extension_name(name))
    }
}

/// Inputs needed to populate an entry.
pub struct CapabilitySources<'a> {
    pub context: NativeHandle,
    pub lookup: &'a dyn DynamicLookup,
    pub driver: &'a dyn DriverQuery,
}

/// Process-wide capability cache.
#[derive(Debug, Default)]
pub struct CapabilityCache {
    entries: Mutex<HashMap<String, Arc<CapabilityEntry>>>,
}

impl CapabilityCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The entry for `identity`, populating it on first use.
    ///
    /// The binding follows the identity's granted version, so every context
    /// sharing an identity shares the binding too.
    pub fn resolve(
        &self,
        identity: &ContextIdentity,
        sources: CapabilitySources<'_>,
    ) -> Arc<CapabilityEntry> {
        let key = identity.fqn();
        let mut entries = self.entries.lock();

        if let Some(entry) = entries.get(&key) {
            log::debug!("Reusing capabilities for {key}");
            return Arc::clone(entry);
        }

        let binding = GlBinding::for_version(identity.version(), identity.profile);
        let entry = Arc::new(Self::populate(identity, binding, sources));
        log::info!(
            "Cached capabilities for {key}: {}/{} GL functions, {} platform functions, {} extensions",
            entry.gl_table.resolved_count(),
            entry.gl_table.len(),
            entry.platform_table.resolved_count(),
            entry.extensions.len()
        );
        entries.insert(key, Arc::clone(&entry));
        entry
    }

    fn populate(
        identity: &ContextIdentity,
        binding: GlBinding,
        sources: CapabilitySources<'_>,
    ) -> CapabilityEntry {
        let platform = sources.driver.kind();
        let gl_table = ProcAddressTable::resolve(binding.entry_points(), platform, sources.lookup);
        let platform_table = ProcAddressTable::resolve(
            platform.entry_points().iter().copied(),
            platform,
            sources.lookup,
        );
        let extensions = ExtensionSet::new(
            sources
                .driver
                .extensions_string(sources.context)
                .unwrap_or_default(),
            sources
                .driver
                .platform_extensions_string(sources.context)
                .unwrap_or_default(),
            identity.version(),
        );

        CapabilityEntry {
            identity: identity.clone(),
            binding,
            platform,
            gl_table,
            platform_table,
            extensions,
        }
    }

    pub fn get(&self, identity: &ContextIdentity) -> Option<Arc<CapabilityEntry>> {
        self.entries.lock().get(&identity.fqn()).cloned()
    }

    pub fn contains(&self, identity: &ContextIdentity) -> bool {
        self.entries.lock().contains_key(&identity.fqn())
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

/// Function availability: the cached GL table, then the cached platform
/// table, then an uncached lookup over every decorated variant of the name.
pub fn is_function_available(
    entry: Option<&CapabilityEntry>,
    platform: PlatformKind,
    lookup: &dyn DynamicLookup,
    name: &str,
) -> bool {
    if entry.is_some_and(|entry| entry.has_function(name)) {
        return true;
    }
    names::permutations(platform.map_function_name(name))
        .any(|candidate| lookup.resolve(&candidate) != 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::DeviceId;
    use crate::surface::GlProfile;
    use crate::version::{GlVersion, NegotiatedVersion, ProfileFlags};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingLookup {
        calls: AtomicUsize,
    }

    impl DynamicLookup for CountingLookup {
        fn resolve(&self, name: &str) -> usize {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if name.starts_with("glBegin") {
                0
            } else {
                0x1000 + name.len()
            }
        }
    }

    struct FixedDriver;

    impl DriverQuery for FixedDriver {
        fn kind(&self) -> PlatformKind {
            PlatformKind::Glx
        }

        fn version_string(&self, _context: NativeHandle) -> Option<String> {
            Some("3.3.0".to_string())
        }

        fn extensions_string(&self, _context: NativeHandle) -> Option<String> {
            Some("GL_ARB_debug_output".to_string())
        }

        fn platform_extensions_string(&self, _context: NativeHandle) -> Option<String> {
            Some("GLX_SGIX_pbuffer".to_string())
        }
    }

    fn identity() -> ContextIdentity {
        let version = NegotiatedVersion::from_arb(
            GlVersion::new(3, 3),
            ProfileFlags::CORE | ProfileFlags::ANY,
        );
        ContextIdentity::new(&DeviceId::new("x11", ":0"), &version)
    }

    fn sources<'a>(lookup: &'a CountingLookup, driver: &'a FixedDriver) -> CapabilitySources<'a> {
        CapabilitySources {
            context: NativeHandle(1),
            lookup,
            driver,
        }
    }

    #[test]
    fn test_entry_populated_once() {
        let cache = CapabilityCache::new();
        let lookup = CountingLookup::default();

        let first = cache.resolve(&identity(), sources(&lookup, &FixedDriver));
        let calls = lookup.calls.load(Ordering::SeqCst);
        assert!(calls > 0);

        let second = cache.resolve(&identity(), sources(&lookup, &FixedDriver));
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(lookup.calls.load(Ordering::SeqCst), calls);
        assert_eq!(cache.len(), 1);
    }

    /// The table is built from the granted version, not from what a drawable
    /// asked for.
    #[test]
    fn test_binding_follows_identity() {
        let cache = CapabilityCache::new();
        let lookup = CountingLookup::default();
        let core = identity();
        let compat = ContextIdentity::new(
            &DeviceId::new("x11", ":0"),
            &NegotiatedVersion::from_arb(
                GlVersion::new(4, 6),
                ProfileFlags::COMPAT | ProfileFlags::ANY,
            ),
        );
        assert!(!cache.contains(&core));

        cache.resolve(&core, sources(&lookup, &FixedDriver));
        cache.resolve(&compat, sources(&lookup, &FixedDriver));
        assert_eq!(cache.len(), 2);

        let core = cache.get(&core).unwrap();
        assert_eq!(core.binding().profile(), GlProfile::Gl3);
        assert!(core.gl_table().contains("glGenVertexArrays"));
        assert!(!core.gl_table().contains("glDispatchCompute"));

        let compat = cache.get(&compat).unwrap();
        assert_eq!(compat.binding().profile(), GlProfile::Gl4bc);
        assert!(compat.gl_table().contains("glDispatchCompute"));
    }

    #[test]
    fn test_function_and_extension_queries() {
        let cache = CapabilityCache::new();
        let lookup = CountingLookup::default();
        let entry = cache.resolve(&identity(), sources(&lookup, &FixedDriver));

        assert!(entry.has_function("glGenVertexArrays"));
        assert!(entry.has_function("glXSwapIntervalSGI"));
        // falls through to the permuted lookup
        assert!(is_function_available(Some(&*entry), PlatformKind::Glx, &lookup, "glSomethingEXT"));
        assert!(!is_function_available(Some(&*entry), PlatformKind::Glx, &lookup, "glBegin"));

        assert!(entry.has_extension("GL_ARB_debug_output"));
        assert!(entry.has_extension("GL_ARB_pbuffer"));
        assert!(entry.has_extension("GL_VERSION_3_3"));
        assert!(!entry.has_extension("GL_VERSION_4_0"));
    }
}
