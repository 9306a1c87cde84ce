//! File rules and viewing rules.
//!
//! Both are ordered first-match-wins lists that always end with a
//! default rule: file rules map file paths to color-space names, viewing
//! rules gate which views apply to a color space or encoding.

use crate::{OcioError, OcioResult};

/// One file rule.
#[derive(Debug, Clone)]
pub struct FileRule {
    /// Rule name; `Default` for the mandatory last rule.
    pub name: String,
    /// Glob-style pattern matched against the file stem (`*` and `?`).
    pub pattern: String,
    /// Extension matched case-insensitively (`*` for any).
    pub extension: String,
    /// Color space assigned on match.
    pub colorspace: String,
}

impl FileRule {
    /// The mandatory default rule.
    pub fn default_rule(colorspace: impl Into<String>) -> Self {
        Self {
            name: "Default".into(),
            pattern: "*".into(),
            extension: "*".into(),
            colorspace: colorspace.into(),
        }
    }

    fn matches(&self, path: &str) -> bool {
        let (stem, ext) = match path.rsplit_once('.') {
            Some((stem, ext)) => (stem, ext),
            None => (path, ""),
        };
        glob_match(&self.extension.to_lowercase(), &ext.to_lowercase())
            && glob_match(&self.pattern, stem)
    }
}

/// Ordered file rules ending with the default.
#[derive(Debug, Clone)]
pub struct FileRules {
    rules: Vec<FileRule>,
}

impl FileRules {
    /// Rules with a trailing default; fails when the last rule is not
    /// named `Default`.
    pub fn new(rules: Vec<FileRule>) -> OcioResult<Self> {
        match rules.last() {
            Some(last) if last.name == "Default" => Ok(Self { rules }),
            _ => Err(OcioError::Parse(
                "file rules must end with the Default rule".into(),
            )),
        }
    }

    /// Only the default rule.
    pub fn with_default(colorspace: impl Into<String>) -> Self {
        Self {
            rules: vec![FileRule::default_rule(colorspace)],
        }
    }

    /// The rules in order.
    pub fn rules(&self) -> &[FileRule] {
        &self.rules
    }

    /// Color space for a file path; the default rule guarantees a match.
    pub fn colorspace_for(&self, path: &str) -> &str {
        for rule in &self.rules {
            if rule.name == "Default" || rule.matches(path) {
                return &rule.colorspace;
            }
        }
        // The constructor guarantees a trailing default.
        &self.rules[self.rules.len() - 1].colorspace
    }
}

/// One viewing rule.
#[derive(Debug, Clone)]
pub struct ViewingRule {
    /// Rule name, referenced by views.
    pub name: String,
    /// Color spaces the rule applies to (empty = by encoding).
    pub colorspaces: Vec<String>,
    /// Encodings the rule applies to.
    pub encodings: Vec<String>,
}

impl ViewingRule {
    /// Whether a color space (with the given encoding string) satisfies
    /// the rule.
    pub fn applies_to(&self, colorspace: &str, encoding: &str) -> bool {
        if !self.colorspaces.is_empty() {
            return self
                .colorspaces
                .iter()
                .any(|cs| cs.eq_ignore_ascii_case(colorspace));
        }
        if !self.encodings.is_empty() {
            return self
                .encodings
                .iter()
                .any(|e| e.eq_ignore_ascii_case(encoding));
        }
        true
    }
}

/// Named viewing rules.
#[derive(Debug, Clone, Default)]
pub struct ViewingRules {
    rules: Vec<ViewingRule>,
}

impl ViewingRules {
    /// Empty rule set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a rule.
    pub fn add(&mut self, rule: ViewingRule) {
        self.rules.push(rule);
    }

    /// Rule lookup by name.
    pub fn get(&self, name: &str) -> Option<&ViewingRule> {
        self.rules.iter().find(|r| r.name.eq_ignore_ascii_case(name))
    }

    /// All rules.
    pub fn rules(&self) -> &[ViewingRule] {
        &self.rules
    }
}

/// Minimal glob: `*` matches any run, `?` one character.
fn glob_match(pattern: &str, text: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let t: Vec<char> = text.chars().collect();
    glob_match_at(&p, &t)
}

fn glob_match_at(p: &[char], t: &[char]) -> bool {
    match p.first() {
        None => t.is_empty(),
        Some('*') => {
            (0..=t.len()).any(|skip| glob_match_at(&p[1..], &t[skip..]))
        }
        Some('?') => !t.is_empty() && glob_match_at(&p[1..], &t[1..]),
        Some(&c) => t.first() == Some(&c) && glob_match_at(&p[1..], &t[1..]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_match_wins() {
        let rules = FileRules::new(vec![
            FileRule {
                name: "aces".into(),
                pattern: "*aces*".into(),
                extension: "exr".into(),
                colorspace: "ACES2065-1".into(),
            },
            FileRule {
                name: "any-exr".into(),
                pattern: "*".into(),
                extension: "exr".into(),
                colorspace: "linear".into(),
            },
            FileRule::default_rule("sRGB"),
        ])
        .unwrap();

        assert_eq!(rules.colorspace_for("shot_aces_plate.exr"), "ACES2065-1");
        assert_eq!(rules.colorspace_for("plate.exr"), "linear");
        assert_eq!(rules.colorspace_for("photo.jpg"), "sRGB");
    }

    #[test]
    fn missing_default_rejected() {
        assert!(FileRules::new(vec![FileRule {
            name: "x".into(),
            pattern: "*".into(),
            extension: "*".into(),
            colorspace: "linear".into(),
        }])
        .is_err());
    }

    #[test]
    fn viewing_rule_matching() {
        let rule = ViewingRule {
            name: "sdr-only".into(),
            colorspaces: vec![],
            encodings: vec!["sdr-video".into()],
        };
        assert!(rule.applies_to("whatever", "sdr-video"));
        assert!(!rule.applies_to("whatever", "hdr-video"));
    }

    #[test]
    fn glob_basics() {
        assert!(glob_match("*", "anything"));
        assert!(glob_match("sh??_*", "sh01_plate"));
        assert!(!glob_match("sh??_*", "shot_plate"));
    }
}
