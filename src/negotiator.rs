//! Version negotiation by descending trial creation.
//!
//! For each request the negotiator walks the policy's version range from the
//! top down, asking the platform to create a context at each step. The first
//! version the driver accepts wins; that probe context is destroyed at once
//! and only the negotiated version is kept.
//!
//! Core requests that fail across the whole range are retried
//! forward-compatible-only, then as compatibility profile.

use crate::error::ContextResult;
use crate::platform::{ArbRequest, PlatformContext};
use crate::registry::VersionRegistry;
use crate::surface::{Drawable, NativeHandle};
use crate::version::{GlVersion, NegotiatedVersion, ProfileFlags, VersionRequest};

/// Inclusive, descending version range tried for one requested major.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionRange {
    pub max: GlVersion,
    pub min: GlVersion,
}

impl VersionRange {
    pub const fn new(max: GlVersion, min: GlVersion) -> Self {
        Self { max, min }
    }

    /// Valid versions from `max` down to `min`.
    pub fn candidates(&self) -> impl Iterator<Item = GlVersion> {
        let min = self.min;
        std::iter::successors(Some(self.max).filter(GlVersion::is_valid), |v| v.decrement())
            .take_while(move |v| *v >= min)
    }
}

/// Per-major version ranges.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NegotiationPolicy {
    pub gl4: VersionRange,
    pub gl3: VersionRange,
    /// Range of the legacy (major 2) request.
    pub gl2: VersionRange,
}

impl Default for NegotiationPolicy {
    fn default() -> Self {
        Self {
            gl4: VersionRange::new(GlVersion::new(4, 6), GlVersion::new(4, 0)),
            gl3: VersionRange::new(GlVersion::new(3, 3), GlVersion::new(3, 1)),
            gl2: VersionRange::new(GlVersion::new(3, 0), GlVersion::new(1, 1)),
        }
    }
}

impl NegotiationPolicy {
    pub fn range_for(&self, major: u8) -> VersionRange {
        match major {
            4 => self.gl4,
            3 => self.gl3,
            _ => self.gl2,
        }
    }

    pub fn with_range(mut self, major: u8, range: VersionRange) -> Self {
        match major {
            4 => self.gl4 = range,
            3 => self.gl3 = range,
            _ => self.gl2 = range,
        }
        self
    }
}

pub struct VersionNegotiator<'a> {
    policy: &'a NegotiationPolicy,
    direct: bool,
}

impl<'a> VersionNegotiator<'a> {
    pub fn new(policy: &'a NegotiationPolicy, direct: bool) -> Self {
        Self { policy, direct }
    }

    /// Probe every canonical request for the drawable's device, unless the
    /// device is already mapped.
    ///
    /// Returns `Ok(true)` if this call ran the probing pass.
    pub fn map_versions(
        &self,
        registry: &VersionRegistry,
        platform: &mut dyn PlatformContext,
        drawable: &dyn Drawable,
    ) -> ContextResult<bool> {
        let device = drawable.device();
        registry.map_versions_once(&device, |versions| {
            for request in VersionRequest::CANONICAL {
                if let Some(negotiated) = self.negotiate(platform, drawable, request)? {
                    versions.map(request, negotiated)?;
                }
            }
            Ok(())
        })
    }

    /// Negotiate a single request. `None` means the driver accepted nothing
    /// in range.
    pub fn negotiate(
        &self,
        platform: &mut dyn PlatformContext,
        drawable: &dyn Drawable,
        request: VersionRequest,
    ) -> ContextResult<Option<NegotiatedVersion>> {
        let range = self.policy.range_for(request.major);
        let mut flags = ProfileFlags::ARB_CREATED | request.profile.flag() | ProfileFlags::ANY;
        let mut found = self.descend(platform, drawable, flags, range)?;

        if found.is_none() && !request.profile.is_compat() {
            flags = ProfileFlags::ARB_CREATED | ProfileFlags::CORE | ProfileFlags::FORWARD;
            found = self.descend(platform, drawable, flags, range)?;

            if found.is_none() {
                log::warn!("{request}: no core profile available, forcing compatibility profile");
                flags = ProfileFlags::ARB_CREATED | ProfileFlags::COMPAT | ProfileFlags::ANY;
                found = self.descend(platform, drawable, flags, range)?;
            }
        }

        let Some((version, probe)) = found else {
            log::info!("{request}: not available");
            return Ok(None);
        };
        platform.destroy(probe)?;

        let negotiated = NegotiatedVersion::from_arb(version, flags);
        log::info!("{request}: negotiated {negotiated}");
        Ok(Some(negotiated))
    }

    fn descend(
        &self,
        platform: &mut dyn PlatformContext,
        drawable: &dyn Drawable,
        flags: ProfileFlags,
        range: VersionRange,
    ) -> ContextResult<Option<(GlVersion, NativeHandle)>> {
        for version in range.candidates() {
            let request = ArbRequest {
                share: NativeHandle::NULL,
                direct: self.direct,
                flags,
                version,
            };
            let handle = platform.create_context_arb(drawable, &request)?;
            log::debug!(
                "Trial {version} {:#04x}: {}",
                flags.bits(),
                if handle.is_null() { "failed" } else { "ok" }
            );
            if !handle.is_null() {
                return Ok(Some((version, handle)));
            }
        }
        Ok(None)
    }
}

#[cfg(all(test, feature = "headless"))]
mod tests {
    use super::*;
    use crate::platform::headless::{HeadlessConfig, HeadlessDevice};
    use crate::surface::GlProfile;

    #[test]
    fn test_range_candidates() {
        let policy = NegotiationPolicy::default();
        let gl3: Vec<_> = policy.range_for(3).candidates().collect();
        assert_eq!(
            gl3,
            vec![GlVersion::new(3, 3), GlVersion::new(3, 2), GlVersion::new(3, 1)]
        );

        let gl2: Vec<_> = policy.range_for(2).candidates().collect();
        assert_eq!(gl2.first(), Some(&GlVersion::new(3, 0)));
        assert_eq!(gl2.last(), Some(&GlVersion::new(1, 1)));
        assert!(gl2.contains(&GlVersion::new(2, 1)));
        assert!(!gl2.contains(&GlVersion::new(1, 0)));
    }

    #[test]
    fn test_stops_at_first_success() {
        let device = HeadlessDevice::new(
            "0",
            HeadlessConfig::default().with_core_max(Some(GlVersion::new(4, 3))),
        );
        let surface = device.surface(Some(GlProfile::Gl4));
        let mut platform = device.platform();
        let policy = NegotiationPolicy::default();

        let negotiated = VersionNegotiator::new(&policy, true)
            .negotiate(&mut platform, &*surface, VersionRequest::GL4_CORE)
            .unwrap()
            .unwrap();

        assert_eq!(negotiated.version(), GlVersion::new(4, 3));
        assert!(negotiated.is_core());
        assert!(negotiated.is_arb_created);
        // 4.6, 4.5, 4.4 fail, 4.3 succeeds
        assert_eq!(device.arb_attempts(), 4);
        // the probe is gone
        assert_eq!(device.live_contexts(), 0);
    }

    #[test]
    fn test_compat_request_has_no_fallback() {
        let device = HeadlessDevice::new("0", HeadlessConfig::default().with_compat_max(None));
        let surface = device.surface(Some(GlProfile::Gl3bc));
        let mut platform = device.platform();
        let policy = NegotiationPolicy::default();

        let negotiated = VersionNegotiator::new(&policy, true)
            .negotiate(&mut platform, &*surface, VersionRequest::GL3_COMPAT)
            .unwrap();
        assert!(negotiated.is_none());
        assert_eq!(device.arb_attempts(), 3);
    }

    #[test]
    fn test_custom_floor() {
        let device = HeadlessDevice::new(
            "0",
            HeadlessConfig::default().with_core_max(Some(GlVersion::new(3, 0))),
        );
        let surface = device.surface(Some(GlProfile::Gl3));
        let mut platform = device.platform();
        let policy = NegotiationPolicy::default().with_range(
            3,
            VersionRange::new(GlVersion::new(3, 3), GlVersion::new(3, 0)),
        );

        let negotiated = VersionNegotiator::new(&policy, true)
            .negotiate(&mut platform, &*surface, VersionRequest::GL3_CORE)
            .unwrap()
            .unwrap();
        assert_eq!(negotiated.version(), GlVersion::new(3, 0));
    }
}
