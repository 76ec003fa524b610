//! Context error types.

use thiserror::Error;

use crate::version::NegotiatedVersion;

/// Errors raised by context operations.
///
/// Transient conditions (a surface that is not ready yet) and negotiation
/// misses are not errors: they surface as [`MakeCurrentResult::NotCurrent`]
/// and as `None` from the version registry respectively.
///
/// [`MakeCurrentResult::NotCurrent`]: crate::MakeCurrentResult::NotCurrent
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ContextError {
    #[error("Context not current on current thread")]
    NotHeld,
    #[error("Context has been destroyed")]
    Destroyed,
    #[error("Drawable has no chosen capabilities")]
    MissingCapabilities,
    #[error("Drawable has invalid native handle")]
    InvalidDrawable,
    #[error("Surface not ready to lock: {0}")]
    SurfaceUnavailable(String),
    #[error("Profile mismatch: drawable requests {drawable}, binding provides {binding}")]
    ProfileMismatch {
        drawable: &'static str,
        binding: &'static str,
    },
    #[error("Context lock is held by another thread (fail-fast)")]
    LockContention,
    #[error("Context lock is not owned by the calling thread")]
    LockNotOwned,
    #[error("Version registry conflict for {key}: {existing} already mapped, rejected {rejected}")]
    RegistryConflict {
        key: String,
        existing: NegotiatedVersion,
        rejected: NegotiatedVersion,
    },
    #[error("Platform error: {0}")]
    Platform(String),
}

pub type ContextResult<T> = Result<T, ContextError>;
