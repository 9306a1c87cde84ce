//! Role aliases.
//!
//! A role maps a semantic name ("scene_linear", "compositing_log") to a
//! color-space name. When a lookup string matches both a color space and
//! a role, the color space wins.

use std::collections::BTreeMap;

/// Well-known role names.
pub mod names {
    /// The scene-linear working space.
    pub const SCENE_LINEAR: &str = "scene_linear";
    /// The log space used for compositing.
    pub const COMPOSITING_LOG: &str = "compositing_log";
    /// Default space for color timing.
    pub const COLOR_TIMING: &str = "color_timing";
    /// Space for raw (non-color) data.
    pub const DATA: &str = "data";
    /// Default space for file IO.
    pub const DEFAULT: &str = "default";
    /// Space for matte paintings.
    pub const MATTE_PAINT: &str = "matte_paint";
    /// Space for texture painting.
    pub const TEXTURE_PAINT: &str = "texture_paint";
    /// Scene-referred interchange space (ACES2065-1 in ACES configs).
    pub const ACES_INTERCHANGE: &str = "aces_interchange";
    /// Display-referred interchange space.
    pub const CIE_XYZ_D65_INTERCHANGE: &str = "cie_xyz_d65_interchange";
}

/// Role table: role name -> color-space name.
#[derive(Debug, Clone, Default)]
pub struct Roles {
    map: BTreeMap<String, String>,
}

impl Roles {
    /// Empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Defines or replaces a role.
    pub fn set(&mut self, role: impl Into<String>, colorspace: impl Into<String>) {
        self.map.insert(role.into().to_lowercase(), colorspace.into());
    }

    /// Color-space name a role points at.
    pub fn resolve(&self, role: &str) -> Option<&str> {
        self.map.get(&role.to_lowercase()).map(String::as_str)
    }

    /// Whether a role is defined.
    pub fn contains(&self, role: &str) -> bool {
        self.map.contains_key(&role.to_lowercase())
    }

    /// Iterates (role, color space) pairs in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.map.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of roles.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn case_insensitive_lookup() {
        let mut roles = Roles::new();
        roles.set("Scene_Linear", "ACEScg");
        assert_eq!(roles.resolve("scene_linear"), Some("ACEScg"));
        assert_eq!(roles.resolve("SCENE_LINEAR"), Some("ACEScg"));
        assert!(roles.resolve("missing").is_none());
    }
}
