//! Native platform abstraction.
//!
//! [`PlatformContext`] is the five-operation seam every windowing system
//! implements (legacy create, make current, release, destroy, and
//! version-negotiating ARB create). [`DriverQuery`] reads the strings a live
//! context reports. A [`PlatformBinding`] is both, which is what a
//! [`RenderContext`](crate::RenderContext) owns.

#[cfg(feature = "headless")]
pub mod headless;

use std::fmt;

use crate::error::ContextResult;
use crate::surface::{Drawable, NativeHandle};
use crate::version::{GlVersion, ProfileFlags};

/// Windowing system family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlatformKind {
    Glx,
    Wgl,
    Egl,
    Cgl,
    Headless,
}

impl PlatformKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Glx => "GLX",
            Self::Wgl => "WGL",
            Self::Egl => "EGL",
            Self::Cgl => "CGL",
            Self::Headless => "Headless",
        }
    }

    /// Platform entry points resolved into a context's platform table.
    pub fn entry_points(&self) -> &'static [&'static str] {
        match self {
            Self::Glx => &[
                "glXAllocateMemoryNV",
                "glXCreateContextAttribsARB",
                "glXFreeMemoryNV",
                "glXGetProcAddressARB",
                "glXSwapIntervalSGI",
            ],
            Self::Wgl => &[
                "wglAllocateMemoryNV",
                "wglChoosePixelFormatARB",
                "wglCreateContextAttribsARB",
                "wglFreeMemoryNV",
                "wglGetExtensionsStringARB",
                "wglSwapIntervalEXT",
            ],
            Self::Egl => &["eglCreateContext", "eglGetProcAddress", "eglSwapInterval"],
            Self::Cgl => &["CGLCreateContext", "CGLSetParameter"],
            Self::Headless => &["hlCreateContextAttribs", "hlSwapInterval"],
        }
    }

    /// Platform spelling of a portable extension name.
    pub fn map_extension_name<'a>(&self, name: &'a str) -> &'a str {
        match (self, name) {
            (Self::Glx, "GL_ARB_pbuffer") => "GLX_SGIX_pbuffer",
            (Self::Wgl, "GL_ARB_pbuffer") => "WGL_ARB_pbuffer",
            (Self::Wgl, "GL_ARB_pixel_format") => "WGL_ARB_pixel_format",
            _ => name,
        }
    }

    /// Platform spelling of a portable function name.
    pub fn map_function_name<'a>(&self, name: &'a str) -> &'a str {
        match (self, name) {
            (Self::Glx, "glAllocateMemoryNV") => "glXAllocateMemoryNV",
            (Self::Glx, "glFreeMemoryNV") => "glXFreeMemoryNV",
            (Self::Wgl, "glAllocateMemoryNV") => "wglAllocateMemoryNV",
            (Self::Wgl, "glFreeMemoryNV") => "wglFreeMemoryNV",
            _ => name,
        }
    }
}

impl fmt::Display for PlatformKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Arguments of a version-negotiating creation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArbRequest {
    /// Context to share objects with, or null.
    pub share: NativeHandle,
    pub direct: bool,
    pub flags: ProfileFlags,
    pub version: GlVersion,
}

/// Native context primitives of one windowing system.
///
/// Creation primitives return [`NativeHandle::NULL`] when the driver declines
/// the request; `Err` is reserved for the native layer itself failing.
pub trait PlatformContext: Send {
    /// Create a context without version negotiation.
    fn create(&mut self, drawable: &dyn Drawable, share: NativeHandle)
        -> ContextResult<NativeHandle>;

    /// Bind `context` to `drawable` on the calling thread.
    fn make_current(
        &mut self,
        drawable: &dyn Drawable,
        context: NativeHandle,
        newly_created: bool,
    ) -> ContextResult<()>;

    /// Unbind `context` from the calling thread.
    fn release(&mut self, context: NativeHandle) -> ContextResult<()>;

    fn destroy(&mut self, context: NativeHandle) -> ContextResult<()>;

    /// Create a context for an exact version and profile.
    fn create_context_arb(
        &mut self,
        drawable: &dyn Drawable,
        request: &ArbRequest,
    ) -> ContextResult<NativeHandle>;
}

/// Strings reported by a live context.
pub trait DriverQuery: Send {
    fn kind(&self) -> PlatformKind;

    fn version_string(&self, context: NativeHandle) -> Option<String>;

    fn extensions_string(&self, context: NativeHandle) -> Option<String>;

    fn platform_extensions_string(&self, context: NativeHandle) -> Option<String>;
}

/// A complete platform implementation.
pub trait PlatformBinding: PlatformContext + DriverQuery {
    fn as_context(&mut self) -> &mut dyn PlatformContext;

    fn as_driver(&self) -> &dyn DriverQuery;
}

impl<T: PlatformContext + DriverQuery> PlatformBinding for T {
    fn as_context(&mut self) -> &mut dyn PlatformContext {
        self
    }

    fn as_driver(&self) -> &dyn DriverQuery {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_aliasing() {
        assert_eq!(
            PlatformKind::Glx.map_extension_name("GL_ARB_pbuffer"),
            "GLX_SGIX_pbuffer"
        );
        assert_eq!(
            PlatformKind::Wgl.map_extension_name("GL_ARB_pixel_format"),
            "WGL_ARB_pixel_format"
        );
        assert_eq!(
            PlatformKind::Egl.map_extension_name("GL_ARB_pbuffer"),
            "GL_ARB_pbuffer"
        );
    }

    #[test]
    fn test_function_aliasing() {
        assert_eq!(
            PlatformKind::Wgl.map_function_name("glAllocateMemoryNV"),
            "wglAllocateMemoryNV"
        );
        assert_eq!(
            PlatformKind::Headless.map_function_name("glAllocateMemoryNV"),
            "glAllocateMemoryNV"
        );
    }
}
