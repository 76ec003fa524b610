//! Render context state machine.
//!
//! ```text
//! Uncreated --make_current--> Current <--release/make_current--> NotCurrent
//!     \                          |                                  |
//!      +---------------------- destroy ----------------------------+--> Destroyed
//! ```
//!
//! The first successful [`RenderContext::make_current`] maps the device's
//! versions (once per device), creates the native context and resolves its
//! capability cache entry. The context lock and the drawable's surface lock
//! stay held from a successful make-current until [`RenderContext::release`].

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::binding::GlBinding;
use crate::capability::{self, CapabilityEntry, CapabilitySources};
use crate::current;
use crate::error::{ContextError, ContextResult};
use crate::factory::{ContextConfig, ContextServices};
use crate::identity::{ContextId, ContextIdentity, DeviceId};
use crate::lock::{ContextLock, LockPolicy};
use crate::lookup::DynamicLookup;
use crate::negotiator::VersionNegotiator;
use crate::platform::{ArbRequest, PlatformBinding, PlatformKind};
use crate::surface::{Drawable, GlProfile, NativeHandle, SurfaceLockStatus};
use crate::version::{parse_version_string, GlVersion, NegotiatedVersion};

/// Lifecycle state of a [`RenderContext`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextState {
    /// No native context yet.
    Uncreated,
    /// Current on some thread.
    Current,
    /// Created, current nowhere.
    NotCurrent,
    /// Destroyed for good.
    Destroyed,
}

/// Outcome of [`RenderContext::make_current`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MakeCurrentResult {
    /// The native context was created by this call and is current.
    CurrentNew,
    /// An existing native context is current.
    CurrentReused,
    /// The drawable is not ready. Nothing is locked; retry later.
    NotCurrent,
}

impl MakeCurrentResult {
    pub fn is_current(&self) -> bool {
        !matches!(self, Self::NotCurrent)
    }
}

struct ContextInner {
    platform: Box<dyn PlatformBinding>,
    handle: NativeHandle,
    state: ContextState,
    version: Option<NegotiatedVersion>,
    binding: Option<GlBinding>,
    capabilities: Option<Arc<CapabilityEntry>>,
}

impl ContextInner {
    fn reset(&mut self) {
        self.version = None;
        self.binding = None;
        self.capabilities = None;
    }
}

/// Unlocks the drawable's surface on drop unless kept.
struct SurfaceLock<'a> {
    drawable: &'a dyn Drawable,
    armed: bool,
}

impl<'a> SurfaceLock<'a> {
    fn new(drawable: &'a dyn Drawable) -> Self {
        Self {
            drawable,
            armed: true,
        }
    }

    fn keep(mut self) {
        self.armed = false;
    }
}

impl Drop for SurfaceLock<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.drawable.unlock_surface();
        }
    }
}

/// A GL rendering context bound to one drawable.
///
/// Created through [`ContextFactory::create_context`](crate::ContextFactory::create_context).
/// At most one thread has a context current at any time; a thread has at
/// most one context current.
///
/// # Thread Safety
///
/// `RenderContext` is `Send + Sync`. Making it current on a second thread
/// blocks until the first releases it, or fails with
/// [`ContextError::LockContention`] under [`LockPolicy::FailFast`].
pub struct RenderContext {
    id: ContextId,
    lock: ContextLock,
    drawable: Arc<dyn Drawable>,
    lookup: Arc<dyn DynamicLookup>,
    platform_kind: PlatformKind,
    services: ContextServices,
    config: ContextConfig,
    inner: Mutex<ContextInner>,
}

impl RenderContext {
    pub(crate) fn new(
        drawable: Arc<dyn Drawable>,
        platform: Box<dyn PlatformBinding>,
        lookup: Arc<dyn DynamicLookup>,
        services: ContextServices,
        config: ContextConfig,
        share_with: Option<ContextId>,
    ) -> Self {
        let id = ContextId::next();
        if let Some(peer) = share_with {
            services.sharing.register_sharing(id, peer);
        }

        Self {
            id,
            lock: ContextLock::new(config.lock_policy),
            drawable,
            lookup,
            platform_kind: platform.kind(),
            services,
            config,
            inner: Mutex::new(ContextInner {
                platform,
                handle: NativeHandle::NULL,
                state: ContextState::Uncreated,
                version: None,
                binding: None,
                capabilities: None,
            }),
        }
    }

    /// The context current on the calling thread.
    pub fn current() -> Option<Arc<RenderContext>> {
        current::get()
    }

    /// Make this context current on the calling thread.
    ///
    /// Another context current on this thread is released first, before any
    /// of the checks below, so a failed call still leaves the thread with no
    /// current context. The first successful call creates the native context.
    ///
    /// # Errors
    ///
    /// - [`ContextError::Destroyed`] after [`destroy`](Self::destroy).
    /// - [`ContextError::MissingCapabilities`] if the drawable has no chosen
    ///   capabilities and the context is not created yet.
    /// - [`ContextError::InvalidDrawable`] if the drawable handle is null
    ///   once its surface is locked.
    /// - [`ContextError::ProfileMismatch`] if the binding of the granted
    ///   version cannot serve the drawable's profile.
    /// - [`ContextError::LockContention`] under the fail-fast policy.
    pub fn make_current(self: &Arc<Self>) -> ContextResult<MakeCurrentResult> {
        if let Some(current) = current::get() {
            if Arc::ptr_eq(&current, self) {
                log::debug!("{} already current", self.id);
                return Ok(MakeCurrentResult::CurrentReused);
            }
            current.release()?;
        }

        match self.state() {
            ContextState::Destroyed => return Err(ContextError::Destroyed),
            ContextState::Uncreated if self.drawable.chosen_capabilities().is_none() => {
                return Err(ContextError::MissingCapabilities);
            }
            _ => {}
        }

        let guard = self.lock.guard()?;
        let result = self.make_current_locking()?;
        if result.is_current() {
            guard.keep();
            current::set(self);
        }
        Ok(result)
    }

    fn make_current_locking(&self) -> ContextResult<MakeCurrentResult> {
        let mut inner = self.inner.lock();
        if inner.state == ContextState::Destroyed {
            return Err(ContextError::Destroyed);
        }

        let status = self.drawable.lock_surface();
        if status == SurfaceLockStatus::NotReady {
            log::debug!("{}: drawable not ready", self.id);
            return Ok(MakeCurrentResult::NotCurrent);
        }
        let surface = SurfaceLock::new(&*self.drawable);
        if status == SurfaceLockStatus::Changed {
            self.drawable.update_handle();
        }
        if self.drawable.handle().is_null() {
            return Err(ContextError::InvalidDrawable);
        }

        let created = inner.state == ContextState::Uncreated;
        if created {
            if !self.create(&mut inner)? {
                return Ok(MakeCurrentResult::NotCurrent);
            }
            self.services.sharing.context_created(self.id, inner.handle);
        }

        let handle = inner.handle;
        inner
            .platform
            .make_current(&*self.drawable, handle, created)?;

        if let Err(err) = self.verify_profile(&inner) {
            if let Err(release_err) = inner.platform.release(handle) {
                log::warn!("{}: release after profile mismatch failed: {release_err}", self.id);
            }
            return Err(err);
        }

        inner.state = ContextState::Current;
        surface.keep();
        Ok(if created {
            MakeCurrentResult::CurrentNew
        } else {
            MakeCurrentResult::CurrentReused
        })
    }

    /// Create the native context. `Ok(false)` if the platform declined.
    fn create(&self, inner: &mut ContextInner) -> ContextResult<bool> {
        let caps = self
            .drawable
            .chosen_capabilities()
            .ok_or(ContextError::MissingCapabilities)?;
        let device = self.drawable.device();
        let request = caps.profile.request();

        VersionNegotiator::new(&self.config.negotiation, self.config.direct).map_versions(
            &self.services.versions,
            inner.platform.as_context(),
            &*self.drawable,
        )?;

        let share = self.services.sharing.share_handle(self.id);
        let mut arb_created = None;
        match self.services.versions.best_available(&device, request) {
            Some((granted, negotiated)) => {
                if granted != request {
                    log::warn!("{}: {request} unavailable, degrading to {granted}", self.id);
                }
                Self::check_serves(&negotiated, caps.profile)?;
                let arb = ArbRequest {
                    share,
                    direct: self.config.direct,
                    flags: negotiated.profile,
                    version: negotiated.version(),
                };
                let handle = inner.platform.create_context_arb(&*self.drawable, &arb)?;
                if handle.is_null() {
                    log::warn!("{}: creation as {negotiated} failed", self.id);
                } else {
                    arb_created = Some((handle, negotiated));
                }
            }
            None => log::debug!("{}: no negotiated version for {request}", self.id),
        }

        let (handle, version) = match arb_created {
            Some(created) => created,
            None => {
                let handle = inner.platform.create(&*self.drawable, share)?;
                if handle.is_null() {
                    log::warn!("{}: legacy creation failed", self.id);
                    return Ok(false);
                }
                let reported = match inner.platform.version_string(handle) {
                    Some(raw) => parse_version_string(&raw),
                    None => {
                        log::warn!("{}: driver reported no version, assuming 1.0", self.id);
                        GlVersion::new(1, 0)
                    }
                };
                let version = NegotiatedVersion::from_legacy(reported);
                if let Err(err) = Self::check_serves(&version, caps.profile) {
                    if let Err(destroy_err) = inner.platform.destroy(handle) {
                        log::error!("{}: destroy after failed setup: {destroy_err}", self.id);
                    }
                    return Err(err);
                }
                (handle, version)
            }
        };

        inner.handle = handle;
        inner.state = ContextState::NotCurrent;
        self.set_function_availability(inner, &device, version);

        log::info!("{}: created {handle} as {version} on {device}", self.id);
        Ok(true)
    }

    fn set_function_availability(
        &self,
        inner: &mut ContextInner,
        device: &DeviceId,
        version: NegotiatedVersion,
    ) {
        let identity = ContextIdentity::new(device, &version);
        let entry = self.services.capabilities.resolve(
            &identity,
            CapabilitySources {
                context: inner.handle,
                lookup: &*self.lookup,
                driver: inner.platform.as_driver(),
            },
        );

        inner.version = Some(version);
        inner.binding = Some(entry.binding());
        inner.capabilities = Some(entry);
    }

    fn check_serves(version: &NegotiatedVersion, profile: GlProfile) -> ContextResult<()> {
        let binding = GlBinding::for_version(version.version(), version.profile);
        if !binding.serves(profile) {
            return Err(ContextError::ProfileMismatch {
                drawable: profile.name(),
                binding: binding.name(),
            });
        }
        Ok(())
    }

    fn verify_profile(&self, inner: &ContextInner) -> ContextResult<()> {
        let Some(binding) = inner.binding else {
            return Ok(());
        };
        let caps = self
            .drawable
            .chosen_capabilities()
            .ok_or(ContextError::MissingCapabilities)?;
        if !binding.serves(caps.profile) {
            return Err(ContextError::ProfileMismatch {
                drawable: caps.profile.name(),
                binding: binding.name(),
            });
        }
        Ok(())
    }

    /// Release this context from the calling thread.
    ///
    /// # Errors
    ///
    /// [`ContextError::NotHeld`] if the calling thread does not hold the
    /// context. Platform release failures are reported after the surface and
    /// the context lock have been released.
    pub fn release(&self) -> ContextResult<()> {
        if !self.lock.is_held() {
            return Err(ContextError::NotHeld);
        }
        current::clear(self);

        let result = {
            let mut inner = self.inner.lock();
            let handle = inner.handle;
            let result = if handle.is_null() {
                Ok(())
            } else {
                inner.platform.release(handle)
            };
            if inner.state == ContextState::Current {
                inner.state = ContextState::NotCurrent;
            }
            result
        };

        if self.drawable.is_surface_locked() {
            self.drawable.unlock_surface();
        }
        self.lock.unlock()?;
        result
    }

    /// Destroy the native context. Calling it again is a no-op.
    ///
    /// # Errors
    ///
    /// [`ContextError::SurfaceUnavailable`] if the drawable cannot be locked
    /// for destruction; the context stays created in that case.
    pub fn destroy(&self) -> ContextResult<()> {
        if self.lock.is_held() {
            self.release()?;
        }

        let _guard = self.lock.guard()?;
        let mut inner = self.inner.lock();
        if inner.state == ContextState::Destroyed {
            return Ok(());
        }

        if !inner.handle.is_null() {
            if self.drawable.lock_surface() == SurfaceLockStatus::NotReady {
                return Err(ContextError::SurfaceUnavailable(format!(
                    "cannot lock drawable {} to destroy {}",
                    self.drawable.handle(),
                    self.id
                )));
            }
            let _surface = SurfaceLock::new(&*self.drawable);

            let handle = inner.handle;
            inner.platform.destroy(handle)?;
            inner.handle = NativeHandle::NULL;
            log::info!("{}: destroyed {handle}", self.id);
        }

        self.services.sharing.context_destroyed(self.id);
        inner.reset();
        inner.state = ContextState::Destroyed;
        Ok(())
    }

    /// Whether `name` resolves: cached GL table, cached platform table, then
    /// an uncached permuted lookup.
    pub fn is_function_available(&self, name: &str) -> bool {
        let entry = self.inner.lock().capabilities.clone();
        capability::is_function_available(entry.as_deref(), self.platform_kind, &*self.lookup, name)
    }

    pub fn is_extension_available(&self, name: &str) -> bool {
        self.inner
            .lock()
            .capabilities
            .as_ref()
            .is_some_and(|entry| entry.has_extension(name))
    }

    pub fn negotiated_version(&self) -> Option<NegotiatedVersion> {
        self.inner.lock().version
    }

    pub fn id(&self) -> ContextId {
        self.id
    }

    pub fn state(&self) -> ContextState {
        self.inner.lock().state
    }

    pub fn handle(&self) -> NativeHandle {
        self.inner.lock().handle
    }

    pub fn binding(&self) -> Option<GlBinding> {
        self.inner.lock().binding
    }

    /// Capability cache key of the created context.
    pub fn identity(&self) -> Option<String> {
        self.inner
            .lock()
            .capabilities
            .as_ref()
            .map(|entry| entry.identity().fqn())
    }

    pub fn drawable(&self) -> &Arc<dyn Drawable> {
        &self.drawable
    }

    pub fn platform_kind(&self) -> PlatformKind {
        self.platform_kind
    }

    /// Whether the calling thread holds this context.
    pub fn is_held(&self) -> bool {
        self.lock.is_held()
    }

    pub fn has_waiters(&self) -> bool {
        self.lock.has_waiters()
    }

    pub fn lock_policy(&self) -> LockPolicy {
        self.lock.policy()
    }

    /// Whether contention blocks instead of failing.
    pub fn is_synchronized(&self) -> bool {
        self.lock.policy() == LockPolicy::Blocking
    }

    pub fn is_extension_cache_initialized(&self) -> bool {
        self.inner.lock().capabilities.is_some()
    }

    pub fn gl_extensions_string(&self) -> Option<String> {
        self.inner
            .lock()
            .capabilities
            .as_ref()
            .map(|entry| entry.extensions().gl_extensions().to_string())
    }

    pub fn platform_extensions_string(&self) -> Option<String> {
        self.inner
            .lock()
            .capabilities
            .as_ref()
            .map(|entry| entry.extensions().platform_extensions().to_string())
    }
}

impl fmt::Debug for RenderContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderContext")
            .field("id", &self.id)
            .field("platform", &self.platform_kind)
            .field("lock_policy", &self.lock.policy())
            .finish_non_exhaustive()
    }
}

impl Drop for RenderContext {
    fn drop(&mut self) {
        let inner = self.inner.get_mut();
        if !inner.handle.is_null() {
            log::warn!("{} dropped without destroy, leaking {}", self.id, inner.handle);
        }
        if inner.state != ContextState::Destroyed {
            self.services.sharing.context_destroyed(self.id);
        }
    }
}

#[cfg(all(test, feature = "headless"))]
mod tests {
    use super::*;
    use crate::factory::ContextFactory;
    use crate::platform::headless::{HeadlessConfig, HeadlessDevice, HeadlessLookup};
    use crate::version::{ProfileFlags, VersionRequest};

    fn context(device: &Arc<HeadlessDevice>, profile: GlProfile) -> Arc<RenderContext> {
        ContextFactory::new(ContextConfig::default()).create_context(
            device.surface(Some(profile)),
            Box::new(device.platform()),
            Arc::new(HeadlessLookup::new()),
            None,
        )
    }

    #[test]
    fn test_lifecycle() {
        let device = HeadlessDevice::new("ctx-lifecycle", HeadlessConfig::default());
        let ctx = context(&device, GlProfile::Gl3);
        assert_eq!(ctx.state(), ContextState::Uncreated);
        assert_eq!(ctx.platform_kind(), PlatformKind::Headless);

        assert_eq!(ctx.make_current().unwrap(), MakeCurrentResult::CurrentNew);
        assert_eq!(ctx.state(), ContextState::Current);
        assert!(ctx.drawable().is_surface_locked());
        assert!(ctx.is_held());

        ctx.release().unwrap();
        assert_eq!(ctx.state(), ContextState::NotCurrent);
        assert!(!ctx.drawable().is_surface_locked());
        assert!(RenderContext::current().is_none());

        assert_eq!(ctx.make_current().unwrap(), MakeCurrentResult::CurrentReused);
        ctx.destroy().unwrap();
        assert_eq!(ctx.state(), ContextState::Destroyed);
        assert!(ctx.handle().is_null());
        assert!(ctx.negotiated_version().is_none());
        assert!(ctx.identity().is_none());
        assert!(!ctx.is_held());
    }

    #[test]
    fn test_release_without_lock() {
        let device = HeadlessDevice::new("ctx-release", HeadlessConfig::default());
        let ctx = context(&device, GlProfile::Gl2);
        assert_eq!(ctx.release(), Err(ContextError::NotHeld));
    }

    #[test]
    fn test_missing_capabilities_fails_before_lock() {
        let device = HeadlessDevice::new("ctx-caps", HeadlessConfig::default());
        let ctx = ContextFactory::new(ContextConfig::default()).create_context(
            device.surface(None),
            Box::new(device.platform()),
            Arc::new(HeadlessLookup::new()),
            None,
        );

        assert_eq!(ctx.make_current(), Err(ContextError::MissingCapabilities));
        assert!(!ctx.is_held());
        assert_eq!(device.arb_attempts(), 0);
    }

    #[test]
    fn test_invalid_drawable_unlocks_everything() {
        let device = HeadlessDevice::new("ctx-invalid", HeadlessConfig::default());
        let surface = device.surface(Some(GlProfile::Gl3));
        surface.invalidate_handle();
        let ctx = ContextFactory::new(ContextConfig::default()).create_context(
            surface.clone(),
            Box::new(device.platform()),
            Arc::new(HeadlessLookup::new()),
            None,
        );

        assert_eq!(ctx.make_current(), Err(ContextError::InvalidDrawable));
        assert!(!surface.is_surface_locked());
        assert!(!ctx.is_held());
        assert_eq!(ctx.state(), ContextState::Uncreated);
    }

    #[test]
    fn test_legacy_profiles_share_identity() {
        // legacy-only driver: GL3bc and GL2 drawables both end up as 3.0 compat
        let device = HeadlessDevice::new(
            "ctx-legacy-share",
            HeadlessConfig::default().with_arb(false),
        );
        let factory = ContextFactory::new(ContextConfig::default());
        let lookup = Arc::new(HeadlessLookup::new());

        let first = factory.create_context(
            device.surface(Some(GlProfile::Gl3bc)),
            Box::new(device.platform()),
            lookup.clone(),
            None,
        );
        assert_eq!(first.make_current().unwrap(), MakeCurrentResult::CurrentNew);
        assert!(!first.negotiated_version().unwrap().is_arb_created);
        first.release().unwrap();

        let second = factory.create_context(
            device.surface(Some(GlProfile::Gl2)),
            Box::new(device.platform()),
            lookup,
            None,
        );
        assert_eq!(second.make_current().unwrap(), MakeCurrentResult::CurrentNew);
        second.release().unwrap();

        assert_eq!(first.identity(), second.identity());
        assert_eq!(first.binding(), Some(GlBinding::for_profile(GlProfile::Gl2)));
        assert_eq!(second.binding(), first.binding());
        assert_eq!(factory.services().capabilities.len(), 1);

        first.destroy().unwrap();
        second.destroy().unwrap();
        assert_eq!(device.live_contexts(), 0);
    }

    /// A granted version whose binding cannot serve the drawable is refused
    /// before any native context is created.
    #[test]
    fn test_profile_mismatch_before_creation() {
        let device = HeadlessDevice::new("ctx-mismatch", HeadlessConfig::default());
        let factory = ContextFactory::new(ContextConfig::default());
        let core = NegotiatedVersion::from_arb(
            GlVersion::new(3, 3),
            ProfileFlags::CORE | ProfileFlags::ANY,
        );
        factory
            .services()
            .versions
            .map_versions_once(device.id(), |view| view.map(VersionRequest::GL3_COMPAT, core))
            .unwrap();

        let surface = device.surface(Some(GlProfile::Gl3bc));
        let ctx = factory.create_context(
            surface.clone(),
            Box::new(device.platform()),
            Arc::new(HeadlessLookup::new()),
            None,
        );
        assert_eq!(
            ctx.make_current(),
            Err(ContextError::ProfileMismatch {
                drawable: "GL3bc",
                binding: "GL3",
            })
        );
        assert_eq!(ctx.state(), ContextState::Uncreated);
        assert!(!surface.is_surface_locked());
        assert!(!ctx.is_held());
        assert_eq!(device.arb_attempts(), 0);
        assert_eq!(device.live_contexts(), 0);
        assert!(factory.services().capabilities.is_empty());
    }
}
