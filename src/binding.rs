//! GL API bindings.
//!
//! A created context is bound to exactly one API implementation, chosen from
//! the version and profile the driver actually granted. Each binding knows
//! which entry points it needs resolved, which is what the capability cache
//! populates its proc address table from.

use std::fmt;

use crate::surface::GlProfile;
use crate::version::{GlVersion, ProfileFlags};

/// Entry points present since GL 1.x.
pub const GL1_ENTRY_POINTS: &[&str] = &[
    "glBindTexture",
    "glBlendFunc",
    "glClear",
    "glClearColor",
    "glDeleteTextures",
    "glDepthFunc",
    "glDisable",
    "glDrawArrays",
    "glDrawElements",
    "glEnable",
    "glFinish",
    "glFlush",
    "glGenTextures",
    "glGetError",
    "glGetIntegerv",
    "glGetString",
    "glPixelStorei",
    "glReadPixels",
    "glTexImage2D",
    "glTexParameteri",
    "glViewport",
];

/// Buffer objects and the programmable pipeline (GL 1.5 / 2.x).
pub const GL2_ENTRY_POINTS: &[&str] = &[
    "glAttachShader",
    "glBindBuffer",
    "glBufferData",
    "glCompileShader",
    "glCreateProgram",
    "glCreateShader",
    "glDeleteBuffers",
    "glEnableVertexAttribArray",
    "glGenBuffers",
    "glGetUniformLocation",
    "glLinkProgram",
    "glMapBuffer",
    "glShaderSource",
    "glUniform1i",
    "glUniformMatrix4fv",
    "glUseProgram",
    "glVertexAttribPointer",
];

pub const GL3_ENTRY_POINTS: &[&str] = &[
    "glBindFramebuffer",
    "glBindVertexArray",
    "glBlitFramebuffer",
    "glClientWaitSync",
    "glDeleteVertexArrays",
    "glDrawArraysInstanced",
    "glDrawElementsInstanced",
    "glFenceSync",
    "glFramebufferTexture2D",
    "glGenFramebuffers",
    "glGenVertexArrays",
    "glGetStringi",
    "glMapBufferRange",
];

pub const GL4_ENTRY_POINTS: &[&str] = &[
    "glBindImageTexture",
    "glDebugMessageCallback",
    "glDispatchCompute",
    "glDrawArraysIndirect",
    "glDrawElementsIndirect",
    "glMemoryBarrier",
    "glPatchParameteri",
    "glTexStorage2D",
];

/// Fixed-function entry points, only present in compatibility profiles.
pub const COMPAT_ENTRY_POINTS: &[&str] = &[
    "glBegin",
    "glCallList",
    "glColor4f",
    "glEnd",
    "glEndList",
    "glLoadIdentity",
    "glMatrixMode",
    "glNewList",
    "glOrtho",
    "glPopMatrix",
    "glPushMatrix",
    "glVertex3f",
];

/// Capability interface implemented by every binding.
pub trait GlApi {
    fn profile(&self) -> GlProfile;

    /// Entry point groups this binding resolves.
    fn entry_point_groups(&self) -> &'static [&'static [&'static str]];

    fn is_compat(&self) -> bool {
        matches!(
            self.profile(),
            GlProfile::Gl4bc | GlProfile::Gl3bc | GlProfile::Gl2
        )
    }

    fn entry_points(&self) -> Vec<&'static str> {
        self.entry_point_groups()
            .iter()
            .flat_map(|group| group.iter().copied())
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Gl4Core;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Gl4Compat;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Gl3Core;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Gl3Compat;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Gl2Legacy;

impl GlApi for Gl4Core {
    fn profile(&self) -> GlProfile {
        GlProfile::Gl4
    }

    fn entry_point_groups(&self) -> &'static [&'static [&'static str]] {
        &[
            GL1_ENTRY_POINTS,
            GL2_ENTRY_POINTS,
            GL3_ENTRY_POINTS,
            GL4_ENTRY_POINTS,
        ]
    }
}

impl GlApi for Gl4Compat {
    fn profile(&self) -> GlProfile {
        GlProfile::Gl4bc
    }

    fn entry_point_groups(&self) -> &'static [&'static [&'static str]] {
        &[
            GL1_ENTRY_POINTS,
            GL2_ENTRY_POINTS,
            GL3_ENTRY_POINTS,
            GL4_ENTRY_POINTS,
            COMPAT_ENTRY_POINTS,
        ]
    }
}

impl GlApi for Gl3Core {
    fn profile(&self) -> GlProfile {
        GlProfile::Gl3
    }

    fn entry_point_groups(&self) -> &'static [&'static [&'static str]] {
        &[GL1_ENTRY_POINTS, GL2_ENTRY_POINTS, GL3_ENTRY_POINTS]
    }
}

impl GlApi for Gl3Compat {
    fn profile(&self) -> GlProfile {
        GlProfile::Gl3bc
    }

    fn entry_point_groups(&self) -> &'static [&'static [&'static str]] {
        &[
            GL1_ENTRY_POINTS,
            GL2_ENTRY_POINTS,
            GL3_ENTRY_POINTS,
            COMPAT_ENTRY_POINTS,
        ]
    }
}

impl GlApi for Gl2Legacy {
    fn profile(&self) -> GlProfile {
        GlProfile::Gl2
    }

    fn entry_point_groups(&self) -> &'static [&'static [&'static str]] {
        &[GL1_ENTRY_POINTS, GL2_ENTRY_POINTS, COMPAT_ENTRY_POINTS]
    }
}

/// The binding a context was created with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GlBinding {
    Gl4(Gl4Core),
    Gl4bc(Gl4Compat),
    Gl3(Gl3Core),
    Gl3bc(Gl3Compat),
    Gl2(Gl2Legacy),
}

impl GlBinding {
    pub fn for_profile(profile: GlProfile) -> Self {
        match profile {
            GlProfile::Gl4 => Self::Gl4(Gl4Core),
            GlProfile::Gl4bc => Self::Gl4bc(Gl4Compat),
            GlProfile::Gl3 => Self::Gl3(Gl3Core),
            GlProfile::Gl3bc => Self::Gl3bc(Gl3Compat),
            GlProfile::Gl2 => Self::Gl2(Gl2Legacy),
        }
    }

    /// The binding implementing a granted version.
    ///
    /// 3.0 has no profiles and belongs with the legacy bindings.
    pub fn for_version(version: GlVersion, profile: ProfileFlags) -> Self {
        let core = profile.contains(ProfileFlags::CORE);
        match (version.major, core) {
            (4.., true) => Self::Gl4(Gl4Core),
            (4.., false) => Self::Gl4bc(Gl4Compat),
            (3, true) => Self::Gl3(Gl3Core),
            (3, false) if version.minor >= 1 => Self::Gl3bc(Gl3Compat),
            _ => Self::Gl2(Gl2Legacy),
        }
    }

    pub fn major(&self) -> u8 {
        match self {
            Self::Gl4(_) | Self::Gl4bc(_) => 4,
            Self::Gl3(_) | Self::Gl3bc(_) => 3,
            Self::Gl2(_) => 2,
        }
    }

    /// Whether a context with this binding may render to a drawable
    /// configured for `profile`.
    ///
    /// A drawable accepts any lower major, and a core drawable accepts a
    /// compatibility binding (forced compatibility). A compatibility drawable
    /// never accepts a core binding.
    pub fn serves(&self, profile: GlProfile) -> bool {
        let wanted = Self::for_profile(profile);
        self.major() <= wanted.major() && (self.api().is_compat() || !wanted.api().is_compat())
    }

    pub fn api(&self) -> &dyn GlApi {
        match self {
            Self::Gl4(api) => api,
            Self::Gl4bc(api) => api,
            Self::Gl3(api) => api,
            Self::Gl3bc(api) => api,
            Self::Gl2(api) => api,
        }
    }

    pub fn profile(&self) -> GlProfile {
        self.api().profile()
    }

    pub fn name(&self) -> &'static str {
        self.profile().name()
    }

    pub fn entry_points(&self) -> Vec<&'static str> {
        self.api().entry_points()
    }
}

impl fmt::Display for GlBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Every entry point any binding may resolve.
pub fn all_entry_points() -> impl Iterator<Item = &'static str> {
    [
        GL1_ENTRY_POINTS,
        GL2_ENTRY_POINTS,
        GL3_ENTRY_POINTS,
        GL4_ENTRY_POINTS,
        COMPAT_ENTRY_POINTS,
    ]
    .into_iter()
    .flat_map(|group| group.iter().copied())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_binding_follows_profile() {
        for profile in [
            GlProfile::Gl4,
            GlProfile::Gl4bc,
            GlProfile::Gl3,
            GlProfile::Gl3bc,
            GlProfile::Gl2,
        ] {
            assert_eq!(GlBinding::for_profile(profile).profile(), profile);
        }
    }

    #[test]
    fn test_core_bindings_have_no_fixed_function() {
        let core = GlBinding::for_profile(GlProfile::Gl4).entry_points();
        assert!(!core.contains(&"glBegin"));
        assert!(core.contains(&"glDispatchCompute"));

        let compat = GlBinding::for_profile(GlProfile::Gl3bc);
        assert!(compat.api().is_compat());
        assert!(compat.entry_points().contains(&"glBegin"));
        assert!(!compat.entry_points().contains(&"glDispatchCompute"));
    }

    #[rstest]
    #[case::gl4_core(4, 6, ProfileFlags::CORE, GlProfile::Gl4)]
    #[case::gl4_forward(4, 1, ProfileFlags::CORE | ProfileFlags::FORWARD, GlProfile::Gl4)]
    #[case::gl4_compat(4, 5, ProfileFlags::COMPAT, GlProfile::Gl4bc)]
    #[case::gl3_core(3, 3, ProfileFlags::CORE, GlProfile::Gl3)]
    #[case::gl3_compat(3, 1, ProfileFlags::COMPAT, GlProfile::Gl3bc)]
    #[case::gl30(3, 0, ProfileFlags::COMPAT, GlProfile::Gl2)]
    #[case::gl21(2, 1, ProfileFlags::COMPAT, GlProfile::Gl2)]
    fn test_binding_for_version(
        #[case] major: u8,
        #[case] minor: u8,
        #[case] flags: ProfileFlags,
        #[case] expected: GlProfile,
    ) {
        let binding = GlBinding::for_version(
            GlVersion::new(major, minor),
            flags | ProfileFlags::ARB_CREATED,
        );
        assert_eq!(binding.profile(), expected);
    }

    #[rstest]
    #[case::same(GlProfile::Gl4, GlProfile::Gl4, true)]
    #[case::degraded_major(GlProfile::Gl3, GlProfile::Gl4, true)]
    #[case::forced_compat(GlProfile::Gl3bc, GlProfile::Gl4, true)]
    #[case::legacy(GlProfile::Gl2, GlProfile::Gl3bc, true)]
    #[case::higher_major(GlProfile::Gl4, GlProfile::Gl3, false)]
    #[case::core_for_compat(GlProfile::Gl3, GlProfile::Gl4bc, false)]
    fn test_binding_serves(
        #[case] granted: GlProfile,
        #[case] drawable: GlProfile,
        #[case] expected: bool,
    ) {
        assert_eq!(GlBinding::for_profile(granted).serves(drawable), expected);
    }
}
