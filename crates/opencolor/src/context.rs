//! Context variables and file resolution.
//!
//! Configs reference files through placeholders like `$SHOT` or
//! `${SEQ}`; the context holds the current values and resolves strings
//! and file paths at build time.
//!
//! # Example
//!
//! ```
//! use opencolor::Context;
//!
//! let mut ctx = Context::new();
//! ctx.set("SHOT", "sh010");
//! ctx.set("SEQ", "sq01");
//!
//! let resolved = ctx.resolve("/shows/$SEQ/shots/${SHOT}/grade.cube");
//! assert_eq!(resolved, "/shows/sq01/shots/sh010/grade.cube");
//! ```
//!
//! Resolution substitutes the longest-named variable first and recurses
//! until a fixed point, so a variable whose value itself contains a
//! placeholder resolves fully.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use opencolor_ops::CacheIdHasher;

use crate::{OcioError, OcioResult};

/// String-variable store plus search paths and working directory.
///
/// Cheap to clone; each processor captures the context used to build it.
#[derive(Debug, Clone, Default)]
pub struct Context {
    /// Sorted so iteration (and the cache id) is deterministic.
    vars: BTreeMap<String, String>,
    search_paths: Vec<PathBuf>,
    working_dir: PathBuf,
}

impl Context {
    /// Empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a variable; replaces any previous value.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(name.into(), value.into());
    }

    /// Current value of a variable.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }

    /// Appends a search path.
    pub fn add_search_path(&mut self, path: impl Into<PathBuf>) {
        self.search_paths.push(path.into());
    }

    /// The search paths in priority order.
    pub fn search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }

    /// Sets the working directory relative paths resolve against.
    pub fn set_working_dir(&mut self, dir: impl Into<PathBuf>) {
        self.working_dir = dir.into();
    }

    /// The working directory.
    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    /// Substitutes `$VAR`, `${VAR}` and `%VAR%` placeholders, longest
    /// variable name first, repeating until nothing changes.
    pub fn resolve(&self, input: &str) -> String {
        let mut current = input.to_string();
        // Longest names first so $SHOT_EXT never matches $SHOT.
        let mut names: Vec<&String> = self.vars.keys().collect();
        names.sort_by_key(|n| std::cmp::Reverse(n.len()));

        for _ in 0..8 {
            let mut next = current.clone();
            for name in &names {
                let value = &self.vars[*name];
                next = next.replace(&format!("${{{name}}}"), value);
                next = next.replace(&format!("%{name}%"), value);
                next = replace_bare(&next, name, value);
            }
            if next == current {
                break;
            }
            current = next;
        }
        current
    }

    /// Resolves placeholders in `path`, then locates the file: absolute
    /// paths are checked directly, relative paths are tried against each
    /// search path and finally the working directory.
    pub fn resolve_file(&self, path: &str) -> OcioResult<PathBuf> {
        let resolved = self.resolve(path);
        let candidate = PathBuf::from(&resolved);
        if candidate.is_absolute() {
            if candidate.is_file() {
                return Ok(candidate);
            }
            return Err(OcioError::MissingFile { path: candidate });
        }
        for base in &self.search_paths {
            let base = if base.is_absolute() {
                base.clone()
            } else {
                self.working_dir.join(base)
            };
            let full = base.join(&candidate);
            if full.is_file() {
                return Ok(full);
            }
        }
        let fallback = self.working_dir.join(&candidate);
        if fallback.is_file() {
            return Ok(fallback);
        }
        Err(OcioError::MissingFile { path: candidate })
    }

    /// Deterministic id over the resolved variable state.
    pub fn cache_id(&self) -> String {
        let mut h = CacheIdHasher::new();
        for (k, v) in &self.vars {
            h.put_str(k).put_str(v);
        }
        for p in &self.search_paths {
            h.put_str(&p.to_string_lossy());
        }
        h.put_str(&self.working_dir.to_string_lossy());
        h.finish()
    }
}

/// `$VAR` form: the name ends at the first non-alphanumeric,
/// non-underscore character.
fn replace_bare(input: &str, name: &str, value: &str) -> String {
    let needle = format!("${name}");
    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(pos) = rest.find(&needle) {
        let after = &rest[pos + needle.len()..];
        let boundary = after
            .chars()
            .next()
            .map(|c| !c.is_alphanumeric() && c != '_')
            .unwrap_or(true);
        out.push_str(&rest[..pos]);
        if boundary {
            out.push_str(value);
        } else {
            out.push_str(&needle);
        }
        rest = after;
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_all_three_forms() {
        let mut ctx = Context::new();
        ctx.set("SHOT", "sh010");
        assert_eq!(ctx.resolve("a/$SHOT/b"), "a/sh010/b");
        assert_eq!(ctx.resolve("a/${SHOT}/b"), "a/sh010/b");
        assert_eq!(ctx.resolve("a/%SHOT%/b"), "a/sh010/b");
    }

    #[test]
    fn longest_name_wins() {
        let mut ctx = Context::new();
        ctx.set("SHOT", "wrong");
        ctx.set("SHOT_EXT", "right");
        assert_eq!(ctx.resolve("$SHOT_EXT"), "right");
    }

    #[test]
    fn recursive_resolution_to_fixed_point() {
        let mut ctx = Context::new();
        ctx.set("ROOT", "/shows/$SHOW");
        ctx.set("SHOW", "alpha");
        assert_eq!(ctx.resolve("$ROOT/luts"), "/shows/alpha/luts");
    }

    #[test]
    fn unknown_left_as_is() {
        let ctx = Context::new();
        assert_eq!(ctx.resolve("$UNKNOWN"), "$UNKNOWN");
        assert_eq!(ctx.resolve("${UNKNOWN}"), "${UNKNOWN}");
    }

    #[test]
    fn missing_file_error() {
        let ctx = Context::new();
        assert!(matches!(
            ctx.resolve_file("definitely/not/here.cube"),
            Err(OcioError::MissingFile { .. })
        ));
    }

    #[test]
    fn finds_file_on_search_path() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("grade.cube"), "LUT_1D_SIZE 2\n0 0 0\n1 1 1\n").unwrap();
        let mut ctx = Context::new();
        ctx.add_search_path(dir.path());
        let found = ctx.resolve_file("grade.cube").unwrap();
        assert!(found.ends_with("grade.cube"));
    }

    #[test]
    fn cache_id_changes_with_vars() {
        let mut a = Context::new();
        let b = Context::new();
        a.set("SHOT", "sh010");
        assert_ne!(a.cache_id(), b.cache_id());
    }
}
