use std::collections::HashSet;

use crate::version::GlVersion;

/// Extensions reported by a context, plus one `GL_VERSION_M_m`
/// pseudo-extension per valid version up to the context version.
#[derive(Debug, Clone, Default)]
pub struct ExtensionSet {
    gl_extensions: String,
    platform_extensions: String,
    names: HashSet<String>,
}

impl ExtensionSet {
    pub fn new(gl_extensions: String, platform_extensions: String, version: GlVersion) -> Self {
        let mut names: HashSet<String> = gl_extensions
            .split_whitespace()
            .chain(platform_extensions.split_whitespace())
            .map(str::to_string)
            .collect();

        names.extend(
            version
                .versions_up_to()
                .map(|v| format!("GL_VERSION_{}_{}", v.major, v.minor)),
        );

        Self {
            gl_extensions,
            platform_extensions,
            names,
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    pub fn gl_extensions(&self) -> &str {
        &self.gl_extensions
    }

    pub fn platform_extensions(&self) -> &str {
        &self.platform_extensions
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_pseudo_extensions() {
        let set = ExtensionSet::new(
            "GL_ARB_debug_output GL_EXT_texture_filter_anisotropic".to_string(),
            "GLX_ARB_create_context".to_string(),
            GlVersion::new(3, 1),
        );

        assert!(set.contains("GL_ARB_debug_output"));
        assert!(set.contains("GLX_ARB_create_context"));
        assert!(set.contains("GL_VERSION_1_0"));
        assert!(set.contains("GL_VERSION_2_1"));
        assert!(set.contains("GL_VERSION_3_1"));
        assert!(!set.contains("GL_VERSION_3_2"));
        assert!(!set.contains("GL_VERSION_4_0"));
    }
}
