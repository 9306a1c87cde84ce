//! Looks: named creative transforms.
//!
//! A look applies an artistic modification in its *process space*. Look
//! specifications list looks separated by commas or colons, each with an
//! optional `+` (forward) or `-` (inverse) prefix, and each element may
//! give `|`-separated fallback alternatives tried in order when a look's
//! file is missing:
//!
//! ```text
//! "+shot_grade, -neutral | backup_neutral, show_lut"
//! ```

use crate::transform::Transform;

/// A named creative look.
#[derive(Debug, Clone)]
pub struct Look {
    name: String,
    process_space: String,
    description: String,
    transform: Option<Transform>,
    inverse_transform: Option<Transform>,
}

impl Look {
    /// Creates a look with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            process_space: String::new(),
            description: String::new(),
            transform: None,
            inverse_transform: None,
        }
    }

    /// Sets the process space.
    pub fn process_space(mut self, space: impl Into<String>) -> Self {
        self.process_space = space.into();
        self
    }

    /// Sets the description.
    pub fn description(mut self, desc: impl Into<String>) -> Self {
        self.description = desc.into();
        self
    }

    /// Sets the forward transform.
    pub fn transform(mut self, t: Transform) -> Self {
        self.transform = Some(t);
        self
    }

    /// Sets an explicit inverse transform.
    pub fn inverse_transform(mut self, t: Transform) -> Self {
        self.inverse_transform = Some(t);
        self
    }

    /// The look name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The process space name.
    #[inline]
    pub fn get_process_space(&self) -> &str {
        &self.process_space
    }

    /// The description.
    #[inline]
    pub fn get_description(&self) -> &str {
        &self.description
    }

    /// The forward transform.
    #[inline]
    pub fn get_transform(&self) -> Option<&Transform> {
        self.transform.as_ref()
    }

    /// The explicit inverse transform, if declared.
    #[inline]
    pub fn get_inverse_transform(&self) -> Option<&Transform> {
        self.inverse_transform.as_ref()
    }
}

/// One parsed element of a look specification: fallback alternatives in
/// priority order, each a (name, forward) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookOption {
    /// Alternatives tried in order until one builds.
    pub alternatives: Vec<(String, bool)>,
}

/// Parses a look specification into its elements.
///
/// Separators are commas or colons; `+name` and bare `name` mean
/// forward, `-name` means inverse; `a | b` gives fallbacks.
pub fn parse_look_spec(spec: &str) -> Vec<LookOption> {
    spec.split([',', ':'])
        .filter_map(|element| {
            let element = element.trim();
            if element.is_empty() {
                return None;
            }
            let alternatives: Vec<(String, bool)> = element
                .split('|')
                .filter_map(|alt| {
                    let alt = alt.trim();
                    if alt.is_empty() {
                        // An empty alternative means "or nothing".
                        return Some((String::new(), true));
                    }
                    if let Some(name) = alt.strip_prefix('-') {
                        Some((name.trim().to_string(), false))
                    } else if let Some(name) = alt.strip_prefix('+') {
                        Some((name.trim().to_string(), true))
                    } else {
                        Some((alt.to_string(), true))
                    }
                })
                .collect();
            if alternatives.is_empty() {
                None
            } else {
                Some(LookOption { alternatives })
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_look() {
        let spec = parse_look_spec("ShowLUT");
        assert_eq!(spec.len(), 1);
        assert_eq!(spec[0].alternatives, vec![("ShowLUT".to_string(), true)]);
    }

    #[test]
    fn signs_and_separators() {
        let spec = parse_look_spec("+grade, -neutral : extra");
        assert_eq!(spec.len(), 3);
        assert_eq!(spec[0].alternatives[0], ("grade".to_string(), true));
        assert_eq!(spec[1].alternatives[0], ("neutral".to_string(), false));
        assert_eq!(spec[2].alternatives[0], ("extra".to_string(), true));
    }

    #[test]
    fn fallback_alternatives() {
        let spec = parse_look_spec("primary | backup |");
        assert_eq!(spec.len(), 1);
        assert_eq!(spec[0].alternatives.len(), 3);
        assert_eq!(spec[0].alternatives[0].0, "primary");
        assert_eq!(spec[0].alternatives[1].0, "backup");
        assert_eq!(spec[0].alternatives[2].0, "");
    }

    #[test]
    fn look_builder() {
        let look = Look::new("Film Grade")
            .process_space("ACEScct")
            .description("Main film look");
        assert_eq!(look.name(), "Film Grade");
        assert_eq!(look.get_process_space(), "ACEScct");
    }
}
