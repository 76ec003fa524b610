//! # gl-context
//!
//! Lifecycle, version negotiation and capability discovery for native GL
//! rendering contexts.
//!
//! ## Overview
//!
//! This crate provides:
//! - [`RenderContext`] - the per-context state machine (make current, release, destroy)
//! - [`VersionRegistry`] - negotiated versions, probed once per device
//! - [`CapabilityCache`] - proc-address tables and extension sets shared by
//!   capability-equivalent contexts
//! - [`ContextLock`] - re-entrant ownership lock with a blocking or fail-fast policy
//! - [`platform`] - the native platform seam, plus a headless driver for testing
//!
//! ## Example
//!
//! ```ignore
//! use gl_context::{ContextConfig, ContextFactory, GlProfile};
//! use gl_context::platform::headless::{HeadlessConfig, HeadlessDevice, HeadlessLookup};
//!
//! let device = HeadlessDevice::new("0", HeadlessConfig::default());
//! let factory = ContextFactory::new(ContextConfig::default());
//! let context = factory.create_context(
//!     device.surface(Some(GlProfile::Gl3)),
//!     Box::new(device.platform()),
//!     Arc::new(HeadlessLookup::new()),
//!     None,
//! );
//! context.make_current()?;
//! println!("{:?}", context.negotiated_version());
//! context.release()?;
//! ```

pub mod binding;
pub mod capability;
pub mod context;
mod current;
pub mod error;
pub mod factory;
pub mod identity;
pub mod lock;
pub mod lookup;
pub mod negotiator;
pub mod platform;
pub mod registry;
pub mod share;
pub mod surface;
pub mod version;

// Re-export main types for convenience
pub use binding::{GlApi, GlBinding};
pub use capability::{CapabilityCache, CapabilityEntry, ExtensionSet, ProcAddressTable};
pub use context::{ContextState, MakeCurrentResult, RenderContext};
pub use error::{ContextError, ContextResult};
pub use factory::{ContextConfig, ContextFactory, ContextServices};
pub use identity::{ContextId, ContextIdentity, DeviceId};
pub use lock::{ContextLock, LockPolicy};
pub use lookup::DynamicLookup;
pub use negotiator::{NegotiationPolicy, VersionNegotiator, VersionRange};
pub use platform::{ArbRequest, DriverQuery, PlatformBinding, PlatformContext, PlatformKind};
pub use registry::VersionRegistry;
pub use share::{ShareGroups, SharingGroupRegistry};
pub use surface::{ChosenCapabilities, Drawable, GlProfile, NativeHandle, SurfaceLockStatus};
pub use version::{
    parse_version_string, GlVersion, NegotiatedVersion, ProfileFlags, RequestedProfile,
    VersionRequest,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Log the library version. Call once after the logger is set up.
pub fn init() {
    log::info!("gl-context v{} initialized", VERSION);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_default_config() {
        let config = ContextConfig::default();
        assert_eq!(config.lock_policy, LockPolicy::Blocking);
        assert!(config.direct);
        assert_eq!(
            config.negotiation.range_for(3).min,
            GlVersion::new(3, 1)
        );
    }
}
