//! GL versions, profile flags and driver version strings.
//!
//! The desktop GL version table is fixed: 1.0-1.5, 2.0-2.1, 3.0-3.3 and
//! 4.0-4.6. Negotiation walks this table downwards, so [`GlVersion::decrement`]
//! crosses major boundaries (3.0 steps to 2.1, not to 3.-1).

use std::fmt;

use bitflags::bitflags;

bitflags! {
    /// Context profile and option bits.
    ///
    /// The same bit set describes both what was requested from the native
    /// creation primitive and what a negotiated context ended up with.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ProfileFlags: u32 {
        /// Created through the version-negotiating (ARB) creation path.
        const ARB_CREATED = 1 << 0;
        /// Compatibility profile.
        const COMPAT = 1 << 1;
        /// Core profile.
        const CORE = 1 << 2;
        /// Embedded profile.
        const ES = 1 << 3;
        /// Forward-compatible-only option.
        const FORWARD = 1 << 4;
        /// Any option (not restricted to forward compatible).
        const ANY = 1 << 5;
        /// Debug context option.
        const DEBUG = 1 << 6;
    }
}

impl Default for ProfileFlags {
    fn default() -> Self {
        Self::empty()
    }
}

impl ProfileFlags {
    /// Short human-readable profile name.
    pub fn profile_name(&self) -> &'static str {
        if self.contains(Self::ES) {
            "es"
        } else if self.contains(Self::CORE) {
            "core"
        } else if self.contains(Self::COMPAT) {
            "compat"
        } else {
            "unknown"
        }
    }
}

/// Profile half of a version request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestedProfile {
    /// Core profile, no deprecated functionality.
    Core,
    /// Compatibility profile, includes the fixed-function pipeline.
    Compat,
}

impl RequestedProfile {
    /// The profile bit this request maps to.
    pub fn flag(self) -> ProfileFlags {
        match self {
            Self::Core => ProfileFlags::CORE,
            Self::Compat => ProfileFlags::COMPAT,
        }
    }

    pub fn is_compat(self) -> bool {
        self == Self::Compat
    }
}

/// A (major, profile) request as issued by a drawable's chosen capabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VersionRequest {
    pub major: u8,
    pub profile: RequestedProfile,
}

impl VersionRequest {
    pub const GL4_CORE: Self = Self::new(4, RequestedProfile::Core);
    pub const GL4_COMPAT: Self = Self::new(4, RequestedProfile::Compat);
    pub const GL3_CORE: Self = Self::new(3, RequestedProfile::Core);
    pub const GL3_COMPAT: Self = Self::new(3, RequestedProfile::Compat);
    pub const GL2_COMPAT: Self = Self::new(2, RequestedProfile::Compat);

    /// The request combinations probed once per device, in probing order.
    pub const CANONICAL: [Self; 5] = [
        Self::GL4_CORE,
        Self::GL4_COMPAT,
        Self::GL3_CORE,
        Self::GL3_COMPAT,
        Self::GL2_COMPAT,
    ];

    pub const fn new(major: u8, profile: RequestedProfile) -> Self {
        Self { major, profile }
    }

    /// The next lower request a caller falls back to when this one is unavailable.
    ///
    /// Core requests keep their profile down to major 3; the legacy request
    /// is always compatibility.
    pub fn degrade(self) -> Option<Self> {
        match self.major {
            4 => Some(Self::new(3, self.profile)),
            3 => Some(Self::GL2_COMPAT),
            _ => None,
        }
    }
}

impl fmt::Display for VersionRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let profile = match self.profile {
            RequestedProfile::Core => "core",
            RequestedProfile::Compat => "compat",
        };
        write!(f, "GL{} {}", self.major, profile)
    }
}

/// A desktop GL (major, minor) version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GlVersion {
    pub major: u8,
    pub minor: u8,
}

impl GlVersion {
    pub const fn new(major: u8, minor: u8) -> Self {
        Self { major, minor }
    }

    /// Highest minor version defined for a major version.
    pub const fn max_minor(major: u8) -> Option<u8> {
        match major {
            1 => Some(5),
            2 => Some(1),
            3 => Some(3),
            4 => Some(6),
            _ => None,
        }
    }

    /// Highest valid version with the given major.
    pub fn max_for(major: u8) -> Option<Self> {
        Self::max_minor(major).map(|minor| Self::new(major, minor))
    }

    pub fn is_valid(&self) -> bool {
        matches!(Self::max_minor(self.major), Some(max) if self.minor <= max)
    }

    /// The previous valid version, crossing into the lower major when needed.
    ///
    /// Returns `None` below 1.0.
    pub fn decrement(self) -> Option<Self> {
        if self.minor > 0 {
            return Some(Self::new(self.major, self.minor - 1));
        }
        let major = self.major.checked_sub(1)?;
        Self::max_for(major)
    }

    /// Every valid version from 1.0 up to and including `self`.
    pub fn versions_up_to(self) -> impl Iterator<Item = GlVersion> {
        (1..=self.major).flat_map(move |major| {
            let top = if major == self.major {
                self.minor
            } else {
                Self::max_minor(major).unwrap_or(0)
            };
            (0..=top).map(move |minor| GlVersion::new(major, minor))
        })
    }
}

impl fmt::Display for GlVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Outcome of version negotiation for one request.
///
/// Immutable once recorded in the [`VersionRegistry`](crate::VersionRegistry).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NegotiatedVersion {
    pub major: u8,
    pub minor: u8,
    pub profile: ProfileFlags,
    pub is_arb_created: bool,
}

impl NegotiatedVersion {
    /// A version obtained through the ARB creation path.
    pub fn from_arb(version: GlVersion, profile: ProfileFlags) -> Self {
        Self {
            major: version.major,
            minor: version.minor,
            profile: profile | ProfileFlags::ARB_CREATED,
            is_arb_created: true,
        }
    }

    /// A version reported by a context created through the legacy path.
    ///
    /// Legacy contexts cannot be promoted to 3.1 or newer, so such reports
    /// are clamped to 3.0.
    pub fn from_legacy(reported: GlVersion) -> Self {
        let version = if reported >= GlVersion::new(3, 1) {
            GlVersion::new(3, 0)
        } else {
            reported
        };
        Self {
            major: version.major,
            minor: version.minor,
            profile: ProfileFlags::COMPAT | ProfileFlags::ANY,
            is_arb_created: false,
        }
    }

    pub fn version(&self) -> GlVersion {
        GlVersion::new(self.major, self.minor)
    }

    pub fn is_core(&self) -> bool {
        self.profile.contains(ProfileFlags::CORE)
    }

    pub fn is_compat(&self) -> bool {
        self.profile.contains(ProfileFlags::COMPAT)
    }

    pub fn is_forward_compatible(&self) -> bool {
        self.profile.contains(ProfileFlags::FORWARD)
    }
}

impl fmt::Display for NegotiatedVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{} ({}, {:#04x})",
            self.major,
            self.minor,
            self.profile.profile_name(),
            self.profile.bits()
        )
    }
}

/// Parse a driver-reported version string.
///
/// Accepts `GL_VERSION_X[_Y[_Z]]` and `X.Y[.Z] [vendor info]`. A vendor token
/// carrying a newer `A.B` upgrades the result when it is the same major with a
/// higher minor, or exactly one major higher. Anything unparseable degrades to
/// 1.0 instead of failing.
pub fn parse_version_string(raw: &str) -> GlVersion {
    match try_parse_version(raw.trim()) {
        Some(version) => version,
        None => {
            log::warn!("Unparseable GL version string {raw:?}, assuming 1.0");
            GlVersion::new(1, 0)
        }
    }
}

fn try_parse_version(s: &str) -> Option<GlVersion> {
    if let Some(rest) = s.strip_prefix("GL_VERSION_") {
        let mut parts = rest.split('_');
        let major = parts.next()?.parse().ok()?;
        let minor = match parts.next() {
            Some(part) => part.parse().ok()?,
            None => 0,
        };
        return Some(GlVersion::new(major, minor));
    }

    let mut tokens = s.split_whitespace();
    let mut version = leading_pair(tokens.next()?)?;

    if let Some(vendor) = tokens.next() {
        let start = vendor.find(|c: char| c.is_ascii_digit());
        if let Some(alt) = start.and_then(|i| leading_pair(&vendor[i..])) {
            if (alt.major == version.major && alt.minor > version.minor)
                || version.major.checked_add(1) == Some(alt.major)
            {
                version = alt;
            }
        }
    }
    Some(version)
}

/// Parse a leading `digits '.' digits` pair, ignoring anything after it.
fn leading_pair(token: &str) -> Option<GlVersion> {
    let (major, rest) = token.split_once('.')?;
    let minor_len = rest
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(rest.len());
    let major = major.parse().ok()?;
    let minor = rest[..minor_len].parse().ok()?;
    Some(GlVersion::new(major, minor))
}
