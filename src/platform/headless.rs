//! Headless software platform.
//!
//! A driver with no native window system behind it: contexts are plain
//! handles, drawables are in-memory surfaces. What the driver accepts is
//! configured per device, and every native call is counted so callers can
//! observe how often negotiation and lookup actually reach the driver.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use super::{ArbRequest, DriverQuery, PlatformContext, PlatformKind};
use crate::binding;
use crate::error::{ContextError, ContextResult};
use crate::identity::DeviceId;
use crate::lookup::DynamicLookup;
use crate::surface::{ChosenCapabilities, Drawable, GlProfile, NativeHandle, SurfaceLockStatus};
use crate::version::{GlVersion, ProfileFlags};

/// What a headless device supports.
#[derive(Debug, Clone)]
pub struct HeadlessConfig {
    /// Whether the version-negotiating creation path exists at all.
    pub arb: bool,
    /// Highest core version with the "any" option, `None` if unsupported.
    pub core_max: Option<GlVersion>,
    /// Highest core version when forward-compatible only.
    pub forward_max: Option<GlVersion>,
    /// Highest compatibility version.
    pub compat_max: Option<GlVersion>,
    /// Version string reported by contexts from the legacy path.
    pub legacy_version: String,
    pub extensions: String,
    pub platform_extensions: String,
}

impl Default for HeadlessConfig {
    fn default() -> Self {
        Self {
            arb: true,
            core_max: Some(GlVersion::new(4, 6)),
            forward_max: Some(GlVersion::new(4, 6)),
            compat_max: Some(GlVersion::new(4, 6)),
            legacy_version: "3.0 Headless 1.0".to_string(),
            extensions: "GL_ARB_debug_output GL_ARB_vertex_array_object GL_EXT_texture_filter_anisotropic"
                .to_string(),
            platform_extensions: "HL_ARB_create_context HL_EXT_swap_control".to_string(),
        }
    }
}

impl HeadlessConfig {
    pub fn with_arb(mut self, arb: bool) -> Self {
        self.arb = arb;
        self
    }

    pub fn with_core_max(mut self, max: Option<GlVersion>) -> Self {
        self.core_max = max;
        self
    }

    pub fn with_forward_max(mut self, max: Option<GlVersion>) -> Self {
        self.forward_max = max;
        self
    }

    pub fn with_compat_max(mut self, max: Option<GlVersion>) -> Self {
        self.compat_max = max;
        self
    }

    pub fn with_legacy_version(mut self, version: impl Into<String>) -> Self {
        self.legacy_version = version.into();
        self
    }

    fn accepts(&self, flags: ProfileFlags, version: GlVersion) -> bool {
        if !self.arb {
            return false;
        }
        let max = if flags.contains(ProfileFlags::CORE) {
            if flags.contains(ProfileFlags::FORWARD) {
                self.forward_max
            } else {
                self.core_max
            }
        } else {
            self.compat_max
        };
        max.is_some_and(|max| version <= max)
    }
}

#[derive(Debug, Clone)]
struct LiveContext {
    version_string: String,
}

#[derive(Debug, Default)]
struct Counters {
    arb_attempts: AtomicUsize,
    legacy_creates: AtomicUsize,
    make_currents: AtomicUsize,
    releases: AtomicUsize,
    destroys: AtomicUsize,
}

/// One headless display connection.
#[derive(Debug)]
pub struct HeadlessDevice {
    id: DeviceId,
    config: HeadlessConfig,
    next_handle: AtomicU64,
    live: Mutex<HashMap<NativeHandle, LiveContext>>,
    attempts: Mutex<Vec<(GlVersion, ProfileFlags)>>,
    counters: Counters,
}

impl HeadlessDevice {
    pub fn new(connection: impl Into<String>, config: HeadlessConfig) -> Arc<Self> {
        Arc::new(Self {
            id: DeviceId::new("headless", connection),
            config,
            next_handle: AtomicU64::new(0x100),
            live: Mutex::new(HashMap::new()),
            attempts: Mutex::new(Vec::new()),
            counters: Counters::default(),
        })
    }

    pub fn id(&self) -> &DeviceId {
        &self.id
    }

    pub fn config(&self) -> &HeadlessConfig {
        &self.config
    }

    /// A platform binding driving this device.
    pub fn platform(self: &Arc<Self>) -> HeadlessPlatform {
        HeadlessPlatform {
            device: Arc::clone(self),
        }
    }

    /// A realized, visible surface on this device.
    pub fn surface(self: &Arc<Self>, profile: Option<GlProfile>) -> Arc<HeadlessSurface> {
        Arc::new(HeadlessSurface {
            device: Arc::clone(self),
            capabilities: Mutex::new(profile.map(ChosenCapabilities::new)),
            handle: AtomicU64::new(self.allocate_handle().0),
            realized: AtomicBool::new(true),
            visible: AtomicBool::new(true),
            locked: AtomicBool::new(false),
            pending_change: AtomicBool::new(false),
            lock_calls: AtomicUsize::new(0),
        })
    }

    fn allocate_handle(&self) -> NativeHandle {
        NativeHandle(self.next_handle.fetch_add(1, Ordering::SeqCst))
    }

    fn register(&self, version_string: String) -> NativeHandle {
        let handle = self.allocate_handle();
        self.live
            .lock()
            .insert(handle, LiveContext { version_string });
        handle
    }

    fn check_share(&self, share: NativeHandle) -> ContextResult<()> {
        if share.is_null() || self.live.lock().contains_key(&share) {
            Ok(())
        } else {
            Err(ContextError::Platform(format!(
                "share context {share} is not live"
            )))
        }
    }

    /// Calls to the version-negotiating creation primitive.
    pub fn arb_attempts(&self) -> usize {
        self.counters.arb_attempts.load(Ordering::SeqCst)
    }

    /// Every negotiating creation attempt, in call order.
    pub fn attempt_log(&self) -> Vec<(GlVersion, ProfileFlags)> {
        self.attempts.lock().clone()
    }

    pub fn legacy_creates(&self) -> usize {
        self.counters.legacy_creates.load(Ordering::SeqCst)
    }

    pub fn make_current_calls(&self) -> usize {
        self.counters.make_currents.load(Ordering::SeqCst)
    }

    pub fn release_calls(&self) -> usize {
        self.counters.releases.load(Ordering::SeqCst)
    }

    pub fn destroy_calls(&self) -> usize {
        self.counters.destroys.load(Ordering::SeqCst)
    }

    /// Contexts created and not yet destroyed, probes included.
    pub fn live_contexts(&self) -> usize {
        self.live.lock().len()
    }
}

/// [`PlatformContext`] and [`DriverQuery`] over a [`HeadlessDevice`].
#[derive(Debug, Clone)]
pub struct HeadlessPlatform {
    device: Arc<HeadlessDevice>,
}

impl HeadlessPlatform {
    pub fn device(&self) -> &Arc<HeadlessDevice> {
        &self.device
    }
}

impl PlatformContext for HeadlessPlatform {
    fn create(
        &mut self,
        drawable: &dyn Drawable,
        share: NativeHandle,
    ) -> ContextResult<NativeHandle> {
        log::trace!("HeadlessPlatform::create({}, share {share})", drawable.handle());
        self.device
            .counters
            .legacy_creates
            .fetch_add(1, Ordering::SeqCst);
        self.device.check_share(share)?;
        Ok(self.device.register(self.device.config.legacy_version.clone()))
    }

    fn make_current(
        &mut self,
        drawable: &dyn Drawable,
        context: NativeHandle,
        newly_created: bool,
    ) -> ContextResult<()> {
        log::trace!(
            "HeadlessPlatform::make_current({context}, drawable {}, new {newly_created})",
            drawable.handle()
        );
        self.device
            .counters
            .make_currents
            .fetch_add(1, Ordering::SeqCst);
        if !self.device.live.lock().contains_key(&context) {
            return Err(ContextError::Platform(format!("unknown context {context}")));
        }
        Ok(())
    }

    fn release(&mut self, context: NativeHandle) -> ContextResult<()> {
        log::trace!("HeadlessPlatform::release({context})");
        self.device.counters.releases.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn destroy(&mut self, context: NativeHandle) -> ContextResult<()> {
        log::trace!("HeadlessPlatform::destroy({context})");
        self.device.counters.destroys.fetch_add(1, Ordering::SeqCst);
        match self.device.live.lock().remove(&context) {
            Some(_) => Ok(()),
            None => Err(ContextError::Platform(format!("unknown context {context}"))),
        }
    }

    fn create_context_arb(
        &mut self,
        _drawable: &dyn Drawable,
        request: &ArbRequest,
    ) -> ContextResult<NativeHandle> {
        log::trace!(
            "HeadlessPlatform::create_context_arb({}, {:?})",
            request.version,
            request.flags
        );
        self.device
            .counters
            .arb_attempts
            .fetch_add(1, Ordering::SeqCst);
        self.device
            .attempts
            .lock()
            .push((request.version, request.flags));
        self.device.check_share(request.share)?;

        if !self.device.config.accepts(request.flags, request.version) {
            return Ok(NativeHandle::NULL);
        }
        let profile = if request.flags.contains(ProfileFlags::CORE) {
            "Core Profile"
        } else {
            "Compatibility Profile"
        };
        Ok(self
            .device
            .register(format!("{}.0 ({profile}) Headless 1.0", request.version)))
    }
}

impl DriverQuery for HeadlessPlatform {
    fn kind(&self) -> PlatformKind {
        PlatformKind::Headless
    }

    fn version_string(&self, context: NativeHandle) -> Option<String> {
        self.device
            .live
            .lock()
            .get(&context)
            .map(|live| live.version_string.clone())
    }

    fn extensions_string(&self, context: NativeHandle) -> Option<String> {
        self.device
            .live
            .lock()
            .contains_key(&context)
            .then(|| self.device.config.extensions.clone())
    }

    fn platform_extensions_string(&self, context: NativeHandle) -> Option<String> {
        self.device
            .live
            .lock()
            .contains_key(&context)
            .then(|| self.device.config.platform_extensions.clone())
    }
}

/// In-memory drawable.
#[derive(Debug)]
pub struct HeadlessSurface {
    device: Arc<HeadlessDevice>,
    capabilities: Mutex<Option<ChosenCapabilities>>,
    handle: AtomicU64,
    realized: AtomicBool,
    visible: AtomicBool,
    locked: AtomicBool,
    pending_change: AtomicBool,
    lock_calls: AtomicUsize,
}

impl HeadlessSurface {
    pub fn set_realized(&self, realized: bool) {
        self.realized.store(realized, Ordering::SeqCst);
    }

    pub fn is_realized(&self) -> bool {
        self.realized.load(Ordering::SeqCst)
    }

    pub fn set_visible(&self, visible: bool) {
        self.visible.store(visible, Ordering::SeqCst);
    }

    pub fn is_visible(&self) -> bool {
        self.visible.load(Ordering::SeqCst)
    }

    pub fn set_capabilities(&self, capabilities: Option<ChosenCapabilities>) {
        *self.capabilities.lock() = capabilities;
    }

    /// Make the next lock report [`SurfaceLockStatus::Changed`].
    pub fn signal_handle_change(&self) {
        self.pending_change.store(true, Ordering::SeqCst);
    }

    /// Drop the native handle, as a window system does when the surface dies
    /// under a realized window.
    pub fn invalidate_handle(&self) {
        self.handle.store(0, Ordering::SeqCst);
    }

    /// Successful surface locks so far.
    pub fn lock_calls(&self) -> usize {
        self.lock_calls.load(Ordering::SeqCst)
    }

    /// Hide and unrealize the surface.
    ///
    /// Fails while the surface is still locked by a context.
    pub fn close(&self) -> ContextResult<()> {
        if self.is_surface_locked() {
            return Err(ContextError::SurfaceUnavailable(format!(
                "surface {} is still locked",
                self.handle()
            )));
        }
        self.set_visible(false);
        self.set_realized(false);
        Ok(())
    }
}

impl Drawable for HeadlessSurface {
    fn lock_surface(&self) -> SurfaceLockStatus {
        if !self.is_realized() {
            return SurfaceLockStatus::NotReady;
        }
        self.locked.store(true, Ordering::SeqCst);
        self.lock_calls.fetch_add(1, Ordering::SeqCst);
        if self.pending_change.swap(false, Ordering::SeqCst) {
            SurfaceLockStatus::Changed
        } else {
            SurfaceLockStatus::Ok
        }
    }

    fn unlock_surface(&self) {
        self.locked.store(false, Ordering::SeqCst);
    }

    fn is_surface_locked(&self) -> bool {
        self.locked.load(Ordering::SeqCst)
    }

    fn handle(&self) -> NativeHandle {
        NativeHandle(self.handle.load(Ordering::SeqCst))
    }

    fn update_handle(&self) {
        let handle = self.device.allocate_handle();
        log::trace!("HeadlessSurface::update_handle -> {handle}");
        self.handle.store(handle.0, Ordering::SeqCst);
    }

    fn chosen_capabilities(&self) -> Option<ChosenCapabilities> {
        *self.capabilities.lock()
    }

    fn device(&self) -> DeviceId {
        self.device.id.clone()
    }
}

/// Symbol table standing in for the platform's dynamic loader.
#[derive(Debug)]
pub struct HeadlessLookup {
    symbols: HashMap<String, usize>,
    calls: AtomicUsize,
}

impl HeadlessLookup {
    /// Every GL entry point and every headless platform entry point.
    pub fn new() -> Self {
        let names: HashSet<&str> = binding::all_entry_points()
            .chain(PlatformKind::Headless.entry_points().iter().copied())
            .collect();
        let mut lookup = Self {
            symbols: HashMap::new(),
            calls: AtomicUsize::new(0),
        };
        for name in names {
            lookup.insert(name);
        }
        lookup
    }

    pub fn with_symbol(mut self, name: &str) -> Self {
        self.insert(name);
        self
    }

    pub fn without_symbol(mut self, name: &str) -> Self {
        self.symbols.remove(name);
        self
    }

    fn insert(&mut self, name: &str) {
        let address = 0x1000 + 0x10 * self.symbols.len();
        self.symbols.entry(name.to_string()).or_insert(address);
    }

    /// Calls to [`DynamicLookup::resolve`] so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Default for HeadlessLookup {
    fn default() -> Self {
        Self::new()
    }
}

impl DynamicLookup for HeadlessLookup {
    fn resolve(&self, name: &str) -> usize {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.symbols.get(name).copied().unwrap_or(0)
    }
}
