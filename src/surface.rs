//! Drawable collaborator contract.
//!
//! The windowing layer owns the native surface; a context only locks it for
//! the span of [make-current .. release] and reads its handle, device and
//! chosen capabilities.

use std::fmt;

use crate::identity::DeviceId;
use crate::version::{RequestedProfile, VersionRequest};

/// Opaque native handle. Zero means "none".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct NativeHandle(pub u64);

impl NativeHandle {
    pub const NULL: Self = Self(0);

    pub fn is_null(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for NativeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Result of locking a drawable's surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceLockStatus {
    /// Locked, handle unchanged.
    Ok,
    /// Locked, but the native handle changed and must be re-read.
    Changed,
    /// Not locked: the surface is not realized yet. Retry later.
    NotReady,
}

/// GL profile a drawable was configured for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GlProfile {
    /// GL 4 core.
    Gl4,
    /// GL 4 with backward compatibility.
    Gl4bc,
    /// GL 3 core.
    Gl3,
    /// GL 3 with backward compatibility.
    Gl3bc,
    /// Legacy GL 2 (compatibility).
    Gl2,
}

impl GlProfile {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Gl4 => "GL4",
            Self::Gl4bc => "GL4bc",
            Self::Gl3 => "GL3",
            Self::Gl3bc => "GL3bc",
            Self::Gl2 => "GL2",
        }
    }

    /// The version request issued for this profile.
    pub fn request(&self) -> VersionRequest {
        match self {
            Self::Gl4 => VersionRequest::new(4, RequestedProfile::Core),
            Self::Gl4bc => VersionRequest::new(4, RequestedProfile::Compat),
            Self::Gl3 => VersionRequest::new(3, RequestedProfile::Core),
            Self::Gl3bc => VersionRequest::new(3, RequestedProfile::Compat),
            Self::Gl2 => VersionRequest::new(2, RequestedProfile::Compat),
        }
    }
}

impl fmt::Display for GlProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Capabilities chosen for a drawable by the pixel-format selection layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChosenCapabilities {
    pub profile: GlProfile,
}

impl ChosenCapabilities {
    pub fn new(profile: GlProfile) -> Self {
        Self { profile }
    }
}

/// A lockable native drawable.
///
/// Implementations use interior mutability: the same drawable may be queried
/// from whichever thread currently owns the context rendering to it.
pub trait Drawable: Send + Sync {
    fn lock_surface(&self) -> SurfaceLockStatus;

    fn unlock_surface(&self);

    fn is_surface_locked(&self) -> bool;

    /// Native drawable handle; only meaningful while the surface is locked.
    fn handle(&self) -> NativeHandle;

    /// Re-read the native handle after [`SurfaceLockStatus::Changed`].
    fn update_handle(&self);

    fn chosen_capabilities(&self) -> Option<ChosenCapabilities>;

    /// Device the drawable lives on.
    fn device(&self) -> DeviceId;
}
