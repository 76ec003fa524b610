//! Device and context identities used as cache keys.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::version::{GlVersion, NegotiatedVersion, ProfileFlags};

/// Identity of the native device (display connection) a drawable lives on.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeviceId {
    /// Display type, e.g. `"x11"`, `"windows"`, `"headless"`.
    pub kind: String,
    /// Connection string, e.g. `":0.0"`.
    pub connection: String,
}

impl DeviceId {
    pub fn new(kind: impl Into<String>, connection: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            connection: connection.into(),
        }
    }

    /// Stable string identifying this device across the process.
    pub fn unique_id(&self) -> String {
        format!("{}_{}", self.kind, self.connection)
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.kind, self.connection)
    }
}

/// Composite identity (device + version + profile) of a created context.
///
/// Two contexts with equal identities are capability-equivalent and share the
/// cached proc-address tables and extension sets.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContextIdentity {
    pub device: DeviceId,
    pub major: u8,
    pub minor: u8,
    pub profile: ProfileFlags,
}

impl ContextIdentity {
    pub fn new(device: &DeviceId, version: &NegotiatedVersion) -> Self {
        Self {
            device: device.clone(),
            major: version.major,
            minor: version.minor,
            profile: version.profile,
        }
    }

    pub fn version(&self) -> GlVersion {
        GlVersion::new(self.major, self.minor)
    }

    /// Fully-qualified name, the string key of the capability cache.
    pub fn fqn(&self) -> String {
        format!(
            "{}-{}.{}-{:#06x}",
            self.device.unique_id(),
            self.major,
            self.minor,
            self.profile.bits()
        )
    }
}

impl fmt::Display for ContextIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.fqn())
    }
}

/// Process-unique id of a [`RenderContext`](crate::RenderContext).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ContextId(u64);

impl ContextId {
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ctx#{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fqn_is_stable() {
        let device = DeviceId::new("x11", ":0.0");
        let version = NegotiatedVersion::from_arb(
            GlVersion::new(3, 3),
            ProfileFlags::CORE | ProfileFlags::ANY,
        );

        let a = ContextIdentity::new(&device, &version);
        let b = ContextIdentity::new(&device, &version);
        assert_eq!(a, b);
        assert_eq!(a.fqn(), b.fqn());
        assert_eq!(a.fqn(), "x11_:0.0-3.3-0x0025");
    }

    #[test]
    fn test_fqn_distinguishes_profile() {
        let device = DeviceId::new("x11", ":0.0");
        let core = NegotiatedVersion::from_arb(GlVersion::new(3, 3), ProfileFlags::CORE);
        let compat = NegotiatedVersion::from_arb(GlVersion::new(3, 3), ProfileFlags::COMPAT);

        assert_ne!(
            ContextIdentity::new(&device, &core).fqn(),
            ContextIdentity::new(&device, &compat).fqn()
        );
    }

    #[test]
    fn test_context_ids_increase() {
        let first = ContextId::next();
        let second = ContextId::next();
        assert!(second.raw() > first.raw());
        assert_eq!(first.to_string(), format!("ctx#{}", first.raw()));
    }
}
