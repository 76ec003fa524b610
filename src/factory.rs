//! Context factory and configuration.
//!
//! The [`ContextFactory`] owns the process-wide services every context uses
//! (the version registry, the capability cache and the sharing-group
//! registry) and hands them to each context it creates.

use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::RwLock;

use crate::capability::CapabilityCache;
use crate::context::RenderContext;
use crate::error::ContextResult;
use crate::lock::LockPolicy;
use crate::lookup::DynamicLookup;
use crate::negotiator::NegotiationPolicy;
use crate::platform::PlatformBinding;
use crate::registry::VersionRegistry;
use crate::share::{ShareGroups, SharingGroupRegistry};
use crate::surface::Drawable;

/// Configuration applied to every context a factory creates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextConfig {
    /// Contention policy of each context's lock.
    pub lock_policy: LockPolicy,
    /// Request direct rendering from the native creation primitive.
    pub direct: bool,
    /// Version ranges tried during negotiation.
    pub negotiation: NegotiationPolicy,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            lock_policy: LockPolicy::Blocking,
            direct: true,
            negotiation: NegotiationPolicy::default(),
        }
    }
}

impl ContextConfig {
    pub fn with_lock_policy(mut self, policy: LockPolicy) -> Self {
        self.lock_policy = policy;
        self
    }

    pub fn with_direct(mut self, direct: bool) -> Self {
        self.direct = direct;
        self
    }

    pub fn with_negotiation(mut self, negotiation: NegotiationPolicy) -> Self {
        self.negotiation = negotiation;
        self
    }
}

/// Services shared by all contexts of a process.
#[derive(Clone)]
pub struct ContextServices {
    pub versions: Arc<VersionRegistry>,
    pub capabilities: Arc<CapabilityCache>,
    pub sharing: Arc<dyn SharingGroupRegistry>,
}

impl ContextServices {
    pub fn new(sharing: Arc<dyn SharingGroupRegistry>) -> Self {
        Self {
            versions: Arc::new(VersionRegistry::new()),
            capabilities: Arc::new(CapabilityCache::new()),
            sharing,
        }
    }
}

impl Default for ContextServices {
    fn default() -> Self {
        Self::new(Arc::new(ShareGroups::new()))
    }
}

impl fmt::Debug for ContextServices {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextServices")
            .field("versions", &self.versions)
            .field("capabilities", &self.capabilities)
            .finish_non_exhaustive()
    }
}

/// Creates [`RenderContext`]s wired to one set of [`ContextServices`].
///
/// # Example
///
/// ```ignore
/// let factory = ContextFactory::new(ContextConfig::default());
/// let context = factory.create_context(surface, Box::new(platform), lookup, None);
/// context.make_current()?;
/// ```
#[derive(Debug)]
pub struct ContextFactory {
    config: ContextConfig,
    services: ContextServices,
    /// Contexts created by this factory.
    contexts: RwLock<Vec<Weak<RenderContext>>>,
}

impl ContextFactory {
    pub fn new(config: ContextConfig) -> Self {
        Self::with_services(config, ContextServices::default())
    }

    pub fn with_services(config: ContextConfig, services: ContextServices) -> Self {
        Self {
            config,
            services,
            contexts: RwLock::new(Vec::new()),
        }
    }

    pub fn config(&self) -> &ContextConfig {
        &self.config
    }

    pub fn services(&self) -> &ContextServices {
        &self.services
    }

    /// Create an uncreated context for `drawable`.
    ///
    /// The native context is created by the first
    /// [`make_current`](RenderContext::make_current). With `share_with`, the
    /// new context joins that context's sharing group.
    pub fn create_context(
        &self,
        drawable: Arc<dyn Drawable>,
        platform: Box<dyn PlatformBinding>,
        lookup: Arc<dyn DynamicLookup>,
        share_with: Option<&RenderContext>,
    ) -> Arc<RenderContext> {
        let context = Arc::new(RenderContext::new(
            drawable,
            platform,
            lookup,
            self.services.clone(),
            self.config.clone(),
            share_with.map(RenderContext::id),
        ));
        log::debug!("Created {} ({:?})", context.id(), self.config.lock_policy);

        let mut contexts = self.contexts.write();
        contexts.retain(|weak| weak.strong_count() > 0);
        contexts.push(Arc::downgrade(&context));
        context
    }

    /// Live contexts in creation order.
    pub fn contexts(&self) -> Vec<Arc<RenderContext>> {
        self.contexts
            .read()
            .iter()
            .filter_map(Weak::upgrade)
            .collect()
    }

    /// Destroy every live context, newest first.
    ///
    /// # Errors
    ///
    /// Stops at the first context that fails to destroy.
    pub fn destroy_all(&self) -> ContextResult<()> {
        for context in self.contexts().iter().rev() {
            context.destroy()?;
        }
        Ok(())
    }
}
