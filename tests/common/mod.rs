//! Common utilities for context integration tests.
//!
//! Every test builds its own [`TestContext`]: a headless device, a factory
//! with fresh process-wide services, and handles on the sharing registry and
//! symbol table so call counts can be checked.

#![allow(dead_code)]

use std::sync::Arc;

use gl_context::platform::headless::{
    HeadlessConfig, HeadlessDevice, HeadlessLookup, HeadlessSurface,
};
use gl_context::{
    ContextConfig, ContextFactory, ContextServices, GlProfile, GlVersion, RenderContext,
    ShareGroups,
};

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

// ============================================================================
// Driver Setups
// ============================================================================

/// Headless driver setups used by parameterized tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Driver {
    /// Everything up to 4.6, core and compatibility.
    Modern,
    /// Core profile only through the forward-compatible option.
    ForwardOnlyCore,
    /// No core profile at all.
    CompatOnly,
    /// No version-negotiating creation path.
    LegacyOnly,
}

impl Driver {
    pub fn config(self) -> HeadlessConfig {
        let base = HeadlessConfig::default();
        match self {
            Driver::Modern => base,
            Driver::ForwardOnlyCore => base
                .with_core_max(None)
                .with_forward_max(Some(GlVersion::new(4, 1))),
            Driver::CompatOnly => base
                .with_core_max(None)
                .with_forward_max(None)
                .with_compat_max(Some(GlVersion::new(3, 3))),
            Driver::LegacyOnly => base.with_arb(false),
        }
    }
}

// ============================================================================
// Test Context
// ============================================================================

pub struct TestContext {
    pub device: Arc<HeadlessDevice>,
    pub factory: ContextFactory,
    pub shares: Arc<ShareGroups>,
    pub lookup: Arc<HeadlessLookup>,
}

impl TestContext {
    pub fn new(config: HeadlessConfig) -> Self {
        Self::with_context_config(config, ContextConfig::default())
    }

    pub fn with_context_config(config: HeadlessConfig, context_config: ContextConfig) -> Self {
        Self::with_lookup(config, context_config, HeadlessLookup::new())
    }

    pub fn with_lookup(
        config: HeadlessConfig,
        context_config: ContextConfig,
        lookup: HeadlessLookup,
    ) -> Self {
        init_logging();
        let shares = Arc::new(ShareGroups::new());
        let services = ContextServices::new(shares.clone());
        Self {
            device: HeadlessDevice::new(":0", config),
            factory: ContextFactory::with_services(context_config, services),
            shares,
            lookup: Arc::new(lookup),
        }
    }

    pub fn surface(&self, profile: GlProfile) -> Arc<HeadlessSurface> {
        self.device.surface(Some(profile))
    }

    /// A fresh surface and an uncreated context on it.
    pub fn context(&self, profile: GlProfile) -> (Arc<RenderContext>, Arc<HeadlessSurface>) {
        let surface = self.surface(profile);
        (self.context_on(surface.clone(), None), surface)
    }

    pub fn context_on(
        &self,
        surface: Arc<HeadlessSurface>,
        share_with: Option<&RenderContext>,
    ) -> Arc<RenderContext> {
        self.factory.create_context(
            surface,
            Box::new(self.device.platform()),
            self.lookup.clone(),
            share_with,
        )
    }
}
