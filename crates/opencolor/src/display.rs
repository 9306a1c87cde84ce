//! Displays, views and view transforms.
//!
//! A display is a named device; a view is a named way of looking at
//! imagery on it. A view either points directly at a color space (with
//! optional looks) or goes through a named view transform into a display
//! color space. Views may be declared per display or shared at config
//! scope and referenced by name.

use crate::transform::Transform;
use crate::types::ReferenceSpaceType;

/// A named view transform between the scene and display references.
#[derive(Debug, Clone)]
pub struct ViewTransform {
    name: String,
    description: String,
    reference_space: ReferenceSpaceType,
    to_reference: Option<Transform>,
    from_reference: Option<Transform>,
}

impl ViewTransform {
    /// Creates a view transform with the given name.
    pub fn new(name: impl Into<String>, reference_space: ReferenceSpaceType) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            reference_space,
            to_reference: None,
            from_reference: None,
        }
    }

    /// Sets the description.
    pub fn description(mut self, desc: impl Into<String>) -> Self {
        self.description = desc.into();
        self
    }

    /// Sets the to-reference transform.
    pub fn to_reference(mut self, t: Transform) -> Self {
        self.to_reference = Some(t);
        self
    }

    /// Sets the from-reference transform.
    pub fn from_reference(mut self, t: Transform) -> Self {
        self.from_reference = Some(t);
        self
    }

    /// The name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The description.
    #[inline]
    pub fn get_description(&self) -> &str {
        &self.description
    }

    /// Which reference this transform relates to.
    #[inline]
    pub fn reference_space(&self) -> ReferenceSpaceType {
        self.reference_space
    }

    /// The to-reference transform.
    #[inline]
    pub fn get_to_reference(&self) -> Option<&Transform> {
        self.to_reference.as_ref()
    }

    /// The from-reference transform.
    #[inline]
    pub fn get_from_reference(&self) -> Option<&Transform> {
        self.from_reference.as_ref()
    }
}

/// A named view on a display.
#[derive(Debug, Clone)]
pub struct View {
    /// View name.
    pub name: String,
    /// Direct color space, or the display color space when
    /// `view_transform` is set.
    pub colorspace: String,
    /// View transform name for the two-part form.
    pub view_transform: Option<String>,
    /// Look specification applied by this view.
    pub looks: String,
    /// Viewing-rule name that gates this view.
    pub rule: Option<String>,
    /// Description.
    pub description: String,
}

impl View {
    /// A view that maps straight to a color space.
    pub fn new(name: impl Into<String>, colorspace: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            colorspace: colorspace.into(),
            view_transform: None,
            looks: String::new(),
            rule: None,
            description: String::new(),
        }
    }

    /// A view that goes through a view transform into a display space.
    pub fn with_view_transform(
        name: impl Into<String>,
        view_transform: impl Into<String>,
        display_colorspace: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            colorspace: display_colorspace.into(),
            view_transform: Some(view_transform.into()),
            looks: String::new(),
            rule: None,
            description: String::new(),
        }
    }

    /// Sets the look specification.
    pub fn looks(mut self, looks: impl Into<String>) -> Self {
        self.looks = looks.into();
        self
    }
}

/// A display: a named device with an ordered list of views.
#[derive(Debug, Clone)]
pub struct Display {
    /// Display name.
    pub name: String,
    /// Views declared directly on this display.
    pub views: Vec<View>,
    /// Names of shared views this display references.
    pub shared_views: Vec<String>,
}

impl Display {
    /// Empty display.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            views: Vec::new(),
            shared_views: Vec::new(),
        }
    }

    /// Adds a display-local view.
    pub fn view(mut self, view: View) -> Self {
        self.views.push(view);
        self
    }

    /// References a config-scope shared view.
    pub fn shared_view(mut self, name: impl Into<String>) -> Self {
        self.shared_views.push(name.into());
        self
    }
}

/// Filters and reorders `names` by an active list.
///
/// The active list both filters and gives the order; an empty active
/// list keeps everything. This is the semantics of `active_displays` /
/// `active_views` and their environment overrides.
pub fn apply_active_list(names: &[String], active: &[String]) -> Vec<String> {
    if active.is_empty() {
        return names.to_vec();
    }
    active
        .iter()
        .filter(|a| names.iter().any(|n| n.eq_ignore_ascii_case(a)))
        .cloned()
        .collect()
}

/// Parses an active-list string: comma- or colon-separated names.
pub fn parse_active_list(s: &str) -> Vec<String> {
    s.split([',', ':'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn active_list_filters_and_orders() {
        let names = vec!["sRGB".to_string(), "Rec709".to_string(), "P3".to_string()];
        let active = vec!["P3".to_string(), "sRGB".to_string()];
        assert_eq!(apply_active_list(&names, &active), vec!["P3", "sRGB"]);
        assert_eq!(apply_active_list(&names, &[]), names);
    }

    #[test]
    fn parse_active_list_forms() {
        assert_eq!(parse_active_list("a, b:c"), vec!["a", "b", "c"]);
        assert!(parse_active_list("").is_empty());
    }

    #[test]
    fn view_forms() {
        let direct = View::new("Raw", "Raw");
        assert!(direct.view_transform.is_none());
        let vt = View::with_view_transform("Film", "ACES 1.0 SDR", "sRGB - Display");
        assert_eq!(vt.view_transform.as_deref(), Some("ACES 1.0 SDR"));
    }
}
