//! Config: the declarative color universe of a project.
//!
//! A config is assembled through [`ConfigBuilder`] and immutable once
//! built; editing conceptually produces a new config (existing
//! processors stay valid). The first processor request uses the
//! per-config processor cache, keyed by the config's content hash, the
//! context, and the canonical transform request.
//!
//! # Example
//!
//! ```
//! use opencolor::{Config, ColorSpace, Encoding, Transform};
//! use opencolor::transform::{ExponentTransform, NegativeStyle};
//!
//! let config = Config::builder()
//!     .colorspace(ColorSpace::builder("lin").encoding(Encoding::SceneLinear).build())
//!     .colorspace(
//!         ColorSpace::builder("gamma22")
//!             .from_reference(Transform::Exponent(ExponentTransform {
//!                 value: [1.0 / 2.2, 1.0 / 2.2, 1.0 / 2.2, 1.0],
//!                 negative_style: NegativeStyle::Clamp,
//!                 direction: Default::default(),
//!             }))
//!             .build(),
//!     )
//!     .role("scene_linear", "lin")
//!     .build()
//!     .unwrap();
//!
//! let processor = config.processor("lin", "gamma22").unwrap();
//! let cpu = processor.cpu().unwrap();
//! let mut px = [0.18_f32, 0.18, 0.18, 1.0];
//! cpu.apply_rgba(&mut px);
//! ```

use std::collections::HashSet;
use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use opencolor_ops::CacheIdHasher;
use tracing::debug;

use crate::builder::OpBuilder;
use crate::cache::{file_fingerprint, ProcessorCache};
use crate::colorspace::ColorSpace;
use crate::context::Context;
use crate::display::{apply_active_list, parse_active_list, Display, View, ViewTransform};
use crate::look::Look;
use crate::processor::Processor;
use crate::role::Roles;
use crate::rules::{FileRules, ViewingRules};
use crate::transform::{ColorSpaceTransform, FileTransform, Transform};
use crate::{OcioError, OcioResult};

/// Environment variable naming the active displays.
pub const ENV_ACTIVE_DISPLAYS: &str = "OCIO_ACTIVE_DISPLAYS";
/// Environment variable naming the active views.
pub const ENV_ACTIVE_VIEWS: &str = "OCIO_ACTIVE_VIEWS";
/// Environment variable overriding the inactive color-space list.
pub const ENV_INACTIVE_COLORSPACES: &str = "OCIO_INACTIVE_COLORSPACES";

/// Immutable-after-build color configuration.
#[derive(Debug)]
pub struct Config {
    version_major: u32,
    version_minor: u32,
    description: String,
    family_separator: char,
    strict_parsing: bool,
    luma: [f64; 3],
    environment: Vec<(String, String)>,
    search_paths: Vec<PathBuf>,
    working_dir: PathBuf,
    colorspaces: Vec<ColorSpace>,
    roles: Roles,
    looks: Vec<Look>,
    view_transforms: Vec<ViewTransform>,
    displays: Vec<Display>,
    shared_views: Vec<View>,
    active_displays: Vec<String>,
    active_views: Vec<String>,
    inactive_colorspaces: Vec<String>,
    file_rules: FileRules,
    viewing_rules: ViewingRules,
    disable_processor_cache: bool,
    cache_id: String,
    processor_cache: ProcessorCache,
}

impl Config {
    /// Starts an empty builder.
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Major version.
    pub fn version_major(&self) -> u32 {
        self.version_major
    }

    /// Minor version.
    pub fn version_minor(&self) -> u32 {
        self.version_minor
    }

    /// Config description.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Separator for hierarchical family strings.
    pub fn family_separator(&self) -> char {
        self.family_separator
    }

    /// Whether unknown config content is an error.
    pub fn strict_parsing(&self) -> bool {
        self.strict_parsing
    }

    /// Luma coefficients used by saturation-carrying ops.
    pub fn luma(&self) -> [f64; 3] {
        self.luma
    }

    /// Declared environment variables and their defaults.
    pub fn environment(&self) -> &[(String, String)] {
        &self.environment
    }

    /// All color spaces, including inactive ones.
    pub fn colorspaces(&self) -> &[ColorSpace] {
        &self.colorspaces
    }

    /// Names of active color spaces (declared minus inactive).
    pub fn active_colorspace_names(&self) -> Vec<&str> {
        self.colorspaces
            .iter()
            .map(|cs| cs.name())
            .filter(|name| {
                !self
                    .inactive_colorspaces
                    .iter()
                    .any(|i| i.eq_ignore_ascii_case(name))
            })
            .collect()
    }

    /// The role table.
    pub fn roles(&self) -> &Roles {
        &self.roles
    }

    /// All looks.
    pub fn looks(&self) -> &[Look] {
        &self.looks
    }

    /// All view transforms.
    pub fn view_transforms(&self) -> &[ViewTransform] {
        &self.view_transforms
    }

    /// All displays.
    pub fn displays(&self) -> &[Display] {
        &self.displays
    }

    /// File rules.
    pub fn file_rules(&self) -> &FileRules {
        &self.file_rules
    }

    /// Viewing rules.
    pub fn viewing_rules(&self) -> &ViewingRules {
        &self.viewing_rules
    }

    /// Active display names, after the `OCIO_ACTIVE_DISPLAYS` override.
    pub fn active_displays(&self) -> Vec<String> {
        let declared: Vec<String> = self.displays.iter().map(|d| d.name.clone()).collect();
        let active = match env::var(ENV_ACTIVE_DISPLAYS) {
            Ok(v) if !v.trim().is_empty() => parse_active_list(&v),
            _ => self.active_displays.clone(),
        };
        apply_active_list(&declared, &active)
    }

    /// Active view names for a display, after `OCIO_ACTIVE_VIEWS`.
    pub fn active_views(&self, display: &str) -> OcioResult<Vec<String>> {
        let d = self.find_display(display)?;
        let mut declared: Vec<String> = d.views.iter().map(|v| v.name.clone()).collect();
        declared.extend(d.shared_views.iter().cloned());
        let active = match env::var(ENV_ACTIVE_VIEWS) {
            Ok(v) if !v.trim().is_empty() => parse_active_list(&v),
            _ => self.active_views.clone(),
        };
        Ok(apply_active_list(&declared, &active))
    }

    /// A context seeded with the config's environment declarations,
    /// search paths and working directory.
    pub fn make_context(&self) -> Context {
        let mut ctx = Context::new();
        for (name, default) in &self.environment {
            match env::var(name) {
                Ok(v) => ctx.set(name, v),
                Err(_) if !default.is_empty() => ctx.set(name, default),
                Err(_) => {}
            }
        }
        for p in &self.search_paths {
            ctx.add_search_path(p.clone());
        }
        ctx.set_working_dir(self.working_dir.clone());
        ctx
    }

    /// Looks up a color space by name, alias, or role. An explicit
    /// color-space name wins over a role of the same name.
    pub fn find_colorspace(&self, name: &str) -> Option<&ColorSpace> {
        if let Some(cs) = self.colorspaces.iter().find(|cs| cs.matches_name(name)) {
            return Some(cs);
        }
        let target = self.roles.resolve(name)?;
        self.colorspaces.iter().find(|cs| cs.matches_name(target))
    }

    /// Like [`Config::find_colorspace`] but failing with `UnknownName`.
    pub fn colorspace(&self, name: &str) -> OcioResult<&ColorSpace> {
        self.find_colorspace(name).ok_or_else(|| OcioError::UnknownName {
            kind: "color space",
            name: name.to_string(),
        })
    }

    /// Look lookup by name.
    pub fn find_look(&self, name: &str) -> OcioResult<&Look> {
        self.looks
            .iter()
            .find(|l| l.name().eq_ignore_ascii_case(name))
            .ok_or_else(|| OcioError::UnknownName {
                kind: "look",
                name: name.to_string(),
            })
    }

    /// View-transform lookup by name.
    pub fn find_view_transform(&self, name: &str) -> OcioResult<&ViewTransform> {
        self.view_transforms
            .iter()
            .find(|vt| vt.name().eq_ignore_ascii_case(name))
            .ok_or_else(|| OcioError::UnknownName {
                kind: "view transform",
                name: name.to_string(),
            })
    }

    /// Display lookup by name.
    pub fn find_display(&self, name: &str) -> OcioResult<&Display> {
        self.displays
            .iter()
            .find(|d| d.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| OcioError::UnknownName {
                kind: "display",
                name: name.to_string(),
            })
    }

    /// Resolves a view for a display: display-local first, then shared.
    pub fn find_view(&self, display: &str, view: &str) -> OcioResult<&View> {
        let d = self.find_display(display)?;
        if let Some(v) = d.views.iter().find(|v| v.name.eq_ignore_ascii_case(view)) {
            return Ok(v);
        }
        if d
            .shared_views
            .iter()
            .any(|name| name.eq_ignore_ascii_case(view))
        {
            if let Some(v) = self
                .shared_views
                .iter()
                .find(|v| v.name.eq_ignore_ascii_case(view))
            {
                return Ok(v);
            }
        }
        Err(OcioError::UnknownName {
            kind: "view",
            name: format!("{display}/{view}"),
        })
    }

    /// Content hash of the config plus the filesystem fingerprint of
    /// every externally referenced file.
    pub fn cache_id(&self) -> &str {
        &self.cache_id
    }

    /// Builds (or returns the cached) processor converting `src` to
    /// `dst`, using the config's own context.
    pub fn processor(&self, src: &str, dst: &str) -> OcioResult<Arc<Processor>> {
        let ctx = self.make_context();
        self.processor_with_context(src, dst, &ctx)
    }

    /// Builds a processor with an explicit context.
    pub fn processor_with_context(
        &self,
        src: &str,
        dst: &str,
        context: &Context,
    ) -> OcioResult<Arc<Processor>> {
        let t = Transform::ColorSpace(ColorSpaceTransform::new(src, dst));
        self.processor_for_transform(&t, context)
    }

    /// Builds a processor for an arbitrary transform request.
    pub fn processor_for_transform(
        &self,
        transform: &Transform,
        context: &Context,
    ) -> OcioResult<Arc<Processor>> {
        let key = {
            let mut h = CacheIdHasher::new();
            h.put_str(&self.cache_id).put_str(&context.cache_id());
            transform.hash_into(&mut h);
            h.finish()
        };

        if self.disable_processor_cache {
            return Ok(Arc::new(self.build_processor(transform, context, &key)?));
        }
        self.processor_cache.get_or_build(&key, || {
            self.build_processor(transform, context, &key)
        })
    }

    fn build_processor(
        &self,
        transform: &Transform,
        context: &Context,
        key: &str,
    ) -> OcioResult<Processor> {
        debug!(key, "building processor");
        let mut builder = OpBuilder::new(self, context);
        let ops = builder.build_root(transform)?;
        Processor::from_ops(ops, context.clone(), key.to_string())
    }

    /// Empties this config's processor cache. Safe while other threads
    /// hold processors.
    pub fn clear_processor_cache(&self) {
        self.processor_cache.clear();
    }

    /// Referential-integrity validation: every role, look process space,
    /// view color space, view transform and viewing rule must resolve.
    pub fn validate(&self) -> OcioResult<()> {
        let mut seen = HashSet::new();
        for cs in &self.colorspaces {
            if cs.name().is_empty() {
                return Err(OcioError::Parse("color space with empty name".into()));
            }
            if !seen.insert(cs.name().to_lowercase()) {
                return Err(OcioError::Parse(format!(
                    "duplicate color space name {:?}",
                    cs.name()
                )));
            }
        }
        for (role, target) in self.roles.iter() {
            if self.find_colorspace(target).is_none() {
                return Err(OcioError::UnknownName {
                    kind: "color space",
                    name: format!("{target} (role {role})"),
                });
            }
        }
        for look in &self.looks {
            if !look.get_process_space().is_empty()
                && self.find_colorspace(look.get_process_space()).is_none()
            {
                return Err(OcioError::UnknownName {
                    kind: "color space",
                    name: format!("{} (look {})", look.get_process_space(), look.name()),
                });
            }
        }
        for display in &self.displays {
            for view in &display.views {
                self.validate_view(display, view)?;
            }
            for shared in &display.shared_views {
                let view = self
                    .shared_views
                    .iter()
                    .find(|v| v.name.eq_ignore_ascii_case(shared))
                    .ok_or_else(|| OcioError::UnknownName {
                        kind: "view",
                        name: shared.clone(),
                    })?;
                self.validate_view(display, view)?;
            }
        }
        Ok(())
    }

    fn validate_view(&self, display: &Display, view: &View) -> OcioResult<()> {
        if self.find_colorspace(&view.colorspace).is_none() {
            return Err(OcioError::UnknownName {
                kind: "color space",
                name: format!("{} (view {}/{})", view.colorspace, display.name, view.name),
            });
        }
        if let Some(vt) = &view.view_transform {
            self.find_view_transform(vt)?;
        }
        if let Some(rule) = &view.rule {
            if self.viewing_rules.get(rule).is_none() {
                return Err(OcioError::UnknownName {
                    kind: "viewing rule",
                    name: rule.clone(),
                });
            }
        }
        for option in crate::look::parse_look_spec(&view.looks) {
            // At least one alternative of each element must exist.
            let ok = option
                .alternatives
                .iter()
                .any(|(name, _)| name.is_empty() || self.find_look(name).is_ok());
            if !ok {
                return Err(OcioError::UnknownName {
                    kind: "look",
                    name: view.looks.clone(),
                });
            }
        }
        Ok(())
    }
}

/// Mutable assembly stage for [`Config`].
#[derive(Debug)]
pub struct ConfigBuilder {
    version: (u32, u32),
    description: String,
    family_separator: char,
    strict_parsing: bool,
    luma: [f64; 3],
    environment: Vec<(String, String)>,
    search_paths: Vec<PathBuf>,
    working_dir: PathBuf,
    colorspaces: Vec<ColorSpace>,
    roles: Roles,
    looks: Vec<Look>,
    view_transforms: Vec<ViewTransform>,
    displays: Vec<Display>,
    shared_views: Vec<View>,
    active_displays: Vec<String>,
    active_views: Vec<String>,
    inactive_colorspaces: Vec<String>,
    file_rules: Option<FileRules>,
    viewing_rules: ViewingRules,
    disable_processor_cache: bool,
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self {
            version: (2, 0),
            description: String::new(),
            family_separator: '/',
            strict_parsing: true,
            luma: opencolor_ops::DEFAULT_LUMA,
            environment: Vec::new(),
            search_paths: Vec::new(),
            working_dir: PathBuf::new(),
            colorspaces: Vec::new(),
            roles: Roles::new(),
            looks: Vec::new(),
            view_transforms: Vec::new(),
            displays: Vec::new(),
            shared_views: Vec::new(),
            active_displays: Vec::new(),
            active_views: Vec::new(),
            inactive_colorspaces: Vec::new(),
            file_rules: None,
            viewing_rules: ViewingRules::new(),
            disable_processor_cache: false,
        }
    }
}

impl ConfigBuilder {
    /// Sets the profile version.
    pub fn version(mut self, major: u32, minor: u32) -> Self {
        self.version = (major, minor);
        self
    }

    /// Sets the description.
    pub fn description(mut self, desc: impl Into<String>) -> Self {
        self.description = desc.into();
        self
    }

    /// Sets the family separator character.
    pub fn family_separator(mut self, sep: char) -> Self {
        self.family_separator = sep;
        self
    }

    /// Sets strict parsing.
    pub fn strict_parsing(mut self, strict: bool) -> Self {
        self.strict_parsing = strict;
        self
    }

    /// Sets the luma coefficients.
    pub fn luma(mut self, luma: [f64; 3]) -> Self {
        self.luma = luma;
        self
    }

    /// Declares an environment variable with a default value.
    pub fn environment_var(mut self, name: impl Into<String>, default: impl Into<String>) -> Self {
        self.environment.push((name.into(), default.into()));
        self
    }

    /// Appends a search path.
    pub fn search_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.search_paths.push(path.into());
        self
    }

    /// Sets the working directory.
    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = dir.into();
        self
    }

    /// Adds a color space.
    pub fn colorspace(mut self, cs: ColorSpace) -> Self {
        self.colorspaces.push(cs);
        self
    }

    /// Defines a role.
    pub fn role(mut self, role: impl Into<String>, colorspace: impl Into<String>) -> Self {
        self.roles.set(role, colorspace);
        self
    }

    /// Adds a look.
    pub fn look(mut self, look: Look) -> Self {
        self.looks.push(look);
        self
    }

    /// Adds a view transform.
    pub fn view_transform(mut self, vt: ViewTransform) -> Self {
        self.view_transforms.push(vt);
        self
    }

    /// Adds a display.
    pub fn display(mut self, display: Display) -> Self {
        self.displays.push(display);
        self
    }

    /// Adds a config-scope shared view.
    pub fn shared_view(mut self, view: View) -> Self {
        self.shared_views.push(view);
        self
    }

    /// Sets the active-display list.
    pub fn active_displays(mut self, names: Vec<String>) -> Self {
        self.active_displays = names;
        self
    }

    /// Sets the active-view list.
    pub fn active_views(mut self, names: Vec<String>) -> Self {
        self.active_views = names;
        self
    }

    /// Sets the inactive color-space list.
    pub fn inactive_colorspaces(mut self, names: Vec<String>) -> Self {
        self.inactive_colorspaces = names;
        self
    }

    /// Sets the file rules.
    pub fn file_rules(mut self, rules: FileRules) -> Self {
        self.file_rules = Some(rules);
        self
    }

    /// Sets the viewing rules.
    pub fn viewing_rules(mut self, rules: ViewingRules) -> Self {
        self.viewing_rules = rules;
        self
    }

    /// Disables the per-config processor cache.
    pub fn disable_processor_cache(mut self, disable: bool) -> Self {
        self.disable_processor_cache = disable;
        self
    }

    /// Freezes the builder into an immutable config.
    ///
    /// Applies the `OCIO_INACTIVE_COLORSPACES` override and computes the
    /// config cache id (content hash plus file fingerprints).
    pub fn build(mut self) -> OcioResult<Config> {
        if let Ok(v) = env::var(ENV_INACTIVE_COLORSPACES) {
            if !v.trim().is_empty() {
                self.inactive_colorspaces = parse_active_list(&v);
            }
        }

        let file_rules = self
            .file_rules
            .take()
            .unwrap_or_else(|| FileRules::with_default("default"));

        let cache_id = {
            let mut h = CacheIdHasher::new();
            h.put_u64(self.version.0 as u64).put_u64(self.version.1 as u64);
            h.put_str(&self.description);
            h.put_f64s(&self.luma);
            for (name, default) in &self.environment {
                h.put_str(name).put_str(default);
            }
            for p in &self.search_paths {
                h.put_str(&p.to_string_lossy());
            }
            for (role, target) in self.roles.iter() {
                h.put_str(role).put_str(target);
            }
            for cs in &self.colorspaces {
                h.put_str(cs.name());
                h.put_str(cs.family());
                h.put_str(cs.equality_group());
                h.put_bool(cs.is_data());
                if let Some(t) = cs.to_reference() {
                    t.hash_into(&mut h);
                    hash_file_fingerprints(t, &mut h);
                }
                if let Some(t) = cs.from_reference() {
                    t.hash_into(&mut h);
                    hash_file_fingerprints(t, &mut h);
                }
            }
            for look in &self.looks {
                h.put_str(look.name()).put_str(look.get_process_space());
                if let Some(t) = look.get_transform() {
                    t.hash_into(&mut h);
                    hash_file_fingerprints(t, &mut h);
                }
                if let Some(t) = look.get_inverse_transform() {
                    t.hash_into(&mut h);
                    hash_file_fingerprints(t, &mut h);
                }
            }
            for vt in &self.view_transforms {
                h.put_str(vt.name());
                if let Some(t) = vt.get_to_reference() {
                    t.hash_into(&mut h);
                }
                if let Some(t) = vt.get_from_reference() {
                    t.hash_into(&mut h);
                }
            }
            for d in &self.displays {
                h.put_str(&d.name);
                for v in &d.views {
                    h.put_str(&v.name).put_str(&v.colorspace).put_str(&v.looks);
                    h.put_str(v.view_transform.as_deref().unwrap_or(""));
                }
                for s in &d.shared_views {
                    h.put_str(s);
                }
            }
            for name in &self.inactive_colorspaces {
                h.put_str(name);
            }
            h.finish()
        };

        let config = Config {
            version_major: self.version.0,
            version_minor: self.version.1,
            description: self.description,
            family_separator: self.family_separator,
            strict_parsing: self.strict_parsing,
            luma: self.luma,
            environment: self.environment,
            search_paths: self.search_paths,
            working_dir: self.working_dir,
            colorspaces: self.colorspaces,
            roles: self.roles,
            looks: self.looks,
            view_transforms: self.view_transforms,
            displays: self.displays,
            shared_views: self.shared_views,
            active_displays: self.active_displays,
            active_views: self.active_views,
            inactive_colorspaces: self.inactive_colorspaces,
            file_rules,
            viewing_rules: self.viewing_rules,
            disable_processor_cache: self.disable_processor_cache,
            cache_id,
            processor_cache: ProcessorCache::new(),
        };
        config.validate()?;
        Ok(config)
    }
}

/// Adds (path, mtime, size) fingerprints for every file a transform
/// references, so the config id changes when a LUT changes on disk.
fn hash_file_fingerprints(t: &Transform, h: &mut CacheIdHasher) {
    match t {
        Transform::File(FileTransform { src, .. }) => {
            h.put_str(&file_fingerprint(src));
        }
        Transform::Group(g) => {
            for child in &g.transforms {
                hash_file_fingerprints(child, h);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::colorspace::Encoding;

    fn two_space_config() -> Config {
        Config::builder()
            .colorspace(
                ColorSpace::builder("lin")
                    .encoding(Encoding::SceneLinear)
                    .build(),
            )
            .colorspace(ColorSpace::builder("srgb").build())
            .role("scene_linear", "lin")
            .build()
            .unwrap()
    }

    #[test]
    fn role_resolution_and_precedence() {
        let config = two_space_config();
        assert_eq!(config.find_colorspace("scene_linear").unwrap().name(), "lin");
        // Explicit color-space name wins over role.
        assert_eq!(config.find_colorspace("lin").unwrap().name(), "lin");
        assert!(config.find_colorspace("missing").is_none());
    }

    #[test]
    fn duplicate_names_rejected() {
        let result = Config::builder()
            .colorspace(ColorSpace::builder("a").build())
            .colorspace(ColorSpace::builder("A").build())
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn role_to_unknown_space_rejected() {
        let result = Config::builder()
            .colorspace(ColorSpace::builder("a").build())
            .role("scene_linear", "nope")
            .build();
        assert!(matches!(result, Err(OcioError::UnknownName { .. })));
    }

    #[test]
    fn view_referential_integrity() {
        let result = Config::builder()
            .colorspace(ColorSpace::builder("srgb").build())
            .display(Display::new("monitor").view(View::new("Film", "missing-space")))
            .build();
        assert!(matches!(result, Err(OcioError::UnknownName { .. })));
    }

    #[test]
    fn cache_id_stable_and_content_sensitive() {
        let a = two_space_config();
        let b = two_space_config();
        assert_eq!(a.cache_id(), b.cache_id());

        let c = Config::builder()
            .colorspace(ColorSpace::builder("lin").build())
            .build()
            .unwrap();
        assert_ne!(a.cache_id(), c.cache_id());
    }

    #[test]
    fn identity_processor_for_same_space() {
        let config = two_space_config();
        let p = config.processor("lin", "lin").unwrap();
        assert!(p.is_no_op());
    }
}
