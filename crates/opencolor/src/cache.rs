//! Caches: per-config processors, process-wide parsed files and CDLs.
//!
//! The processor cache has at-most-one-build-per-key semantics: the map
//! lock is only held to fetch or insert the entry, and each entry has
//! its own mutex, so one slow build never blocks unrelated keys and two
//! requesters of the same key build exactly once.
//!
//! The file and CDL caches are process-wide, keyed by absolute path plus
//! a filesystem fingerprint (mtime + size), with the same discipline.
//! [`clear_all_caches`] empties both.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, OnceLock, RwLock};

use opencolor_lut::cdl::ColorCorrection;
use opencolor_lut::clf::ProcessList;
use tracing::debug;

use crate::processor::Processor;
use crate::{OcioError, OcioResult};

// ----------------------------------------------------------------------
// Processor cache
// ----------------------------------------------------------------------

type Entry = Arc<Mutex<Option<Arc<Processor>>>>;

/// Per-config processor cache.
#[derive(Debug, Default)]
pub(crate) struct ProcessorCache {
    map: RwLock<HashMap<String, Entry>>,
}

impl ProcessorCache {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Returns the cached processor for `key`, building it at most once.
    /// Later requesters block on the entry mutex while the first builds.
    pub(crate) fn get_or_build(
        &self,
        key: &str,
        build: impl FnOnce() -> OcioResult<Processor>,
    ) -> OcioResult<Arc<Processor>> {
        let entry = {
            let read = self.map.read().unwrap_or_else(|e| e.into_inner());
            read.get(key).cloned()
        };
        let entry = match entry {
            Some(e) => e,
            None => {
                let mut write = self.map.write().unwrap_or_else(|e| e.into_inner());
                write
                    .entry(key.to_string())
                    .or_insert_with(|| Arc::new(Mutex::new(None)))
                    .clone()
            }
        };

        let mut slot = entry.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(p) = slot.as_ref() {
            return Ok(Arc::clone(p));
        }
        let built = Arc::new(build()?);
        // A processor with live dynamic properties is never cached: a
        // later requester must not observe another holder's edits.
        if !built.is_dynamic() {
            *slot = Some(Arc::clone(&built));
        }
        Ok(built)
    }

    /// Empties the cache; outstanding processors stay valid.
    pub(crate) fn clear(&self) {
        self.map
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }
}

// ----------------------------------------------------------------------
// File fingerprints
// ----------------------------------------------------------------------

/// Path + mtime + size fingerprint string; unreadable files fingerprint
/// as path only, so a missing file still produces a stable id.
pub(crate) fn file_fingerprint(path: &Path) -> String {
    match std::fs::metadata(path) {
        Ok(meta) => {
            let mtime = meta
                .modified()
                .ok()
                .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
                .map(|d| d.as_nanos())
                .unwrap_or(0);
            format!("{}|{}|{}", path.display(), mtime, meta.len())
        }
        Err(_) => format!("{}|missing", path.display()),
    }
}

// ----------------------------------------------------------------------
// Process-wide file and CDL caches
// ----------------------------------------------------------------------

type FileEntry = Arc<Mutex<Option<Arc<ProcessList>>>>;
type CdlEntry = Arc<Mutex<Option<Arc<ColorCorrection>>>>;

#[derive(Default)]
struct GlobalCaches {
    files: RwLock<HashMap<String, FileEntry>>,
    cdls: RwLock<HashMap<String, CdlEntry>>,
}

fn globals() -> &'static GlobalCaches {
    static CACHES: OnceLock<GlobalCaches> = OnceLock::new();
    CACHES.get_or_init(GlobalCaches::default)
}

/// Parses (or fetches the cached) CLF/CTF process list for a file.
pub(crate) fn cached_process_list(path: &Path) -> OcioResult<Arc<ProcessList>> {
    let key = file_fingerprint(path);
    let entry = {
        let read = globals().files.read().unwrap_or_else(|e| e.into_inner());
        read.get(&key).cloned()
    };
    let entry = match entry {
        Some(e) => e,
        None => {
            let mut write = globals().files.write().unwrap_or_else(|e| e.into_inner());
            write
                .entry(key)
                .or_insert_with(|| Arc::new(Mutex::new(None)))
                .clone()
        }
    };

    let mut slot = entry.lock().unwrap_or_else(|e| e.into_inner());
    if let Some(list) = slot.as_ref() {
        return Ok(Arc::clone(list));
    }
    debug!(path = %path.display(), "parsing transform file");
    let parsed = Arc::new(opencolor_lut::clf::read_clf(path)?);
    *slot = Some(Arc::clone(&parsed));
    Ok(parsed)
}

/// Reads (or fetches the cached) CDL from a `.cc` / `.ccc` file.
///
/// `.ccc` files require a `ccc_id`, matched against the correction ids
/// with a 0-based index fallback.
pub(crate) fn cached_cdl(path: &Path, ccc_id: Option<&str>) -> OcioResult<Arc<ColorCorrection>> {
    let key = format!("{}#{}", file_fingerprint(path), ccc_id.unwrap_or(""));
    let entry = {
        let read = globals().cdls.read().unwrap_or_else(|e| e.into_inner());
        read.get(&key).cloned()
    };
    let entry = match entry {
        Some(e) => e,
        None => {
            let mut write = globals().cdls.write().unwrap_or_else(|e| e.into_inner());
            write
                .entry(key)
                .or_insert_with(|| Arc::new(Mutex::new(None)))
                .clone()
        }
    };

    let mut slot = entry.lock().unwrap_or_else(|e| e.into_inner());
    if let Some(cc) = slot.as_ref() {
        return Ok(Arc::clone(cc));
    }

    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();
    let cc = match ext.as_str() {
        "cc" => opencolor_lut::cdl::read_cc(path)?,
        "ccc" => {
            let id = ccc_id.ok_or_else(|| {
                OcioError::Parse(format!(
                    "{} is a collection; a cccId is required",
                    path.display()
                ))
            })?;
            let collection = opencolor_lut::cdl::read_ccc(path)?;
            collection
                .find(id)
                .cloned()
                .ok_or_else(|| OcioError::UnknownName {
                    kind: "cccId",
                    name: id.to_string(),
                })?
        }
        other => {
            return Err(OcioError::UnsupportedFormat {
                extension: other.to_string(),
                path: path.to_path_buf(),
            });
        }
    };
    let cc = Arc::new(cc);
    *slot = Some(Arc::clone(&cc));
    Ok(cc)
}

/// Empties the process-wide file and CDL caches.
pub fn clear_all_caches() {
    let g = globals();
    g.files.write().unwrap_or_else(|e| e.into_inner()).clear();
    g.cdls.write().unwrap_or_else(|e| e.into_inner()).clear();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    #[test]
    fn processor_cache_builds_once() {
        use crate::{ColorSpace, Config};
        let config = Config::builder()
            .colorspace(ColorSpace::builder("a").build())
            .colorspace(ColorSpace::builder("b").build())
            .build()
            .unwrap();

        let p1 = config.processor("a", "b").unwrap();
        let p2 = config.processor("a", "b").unwrap();
        assert!(Arc::ptr_eq(&p1, &p2));

        config.clear_processor_cache();
        let p3 = config.processor("a", "b").unwrap();
        assert!(!Arc::ptr_eq(&p1, &p3));
    }

    #[test]
    fn fingerprint_tracks_content_change() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x.clf");
        std::fs::write(&path, "a").unwrap();
        let f1 = file_fingerprint(&path);
        // Size change is enough to move the fingerprint.
        let mut file = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(b"bb").unwrap();
        drop(file);
        let f2 = file_fingerprint(&path);
        assert_ne!(f1, f2);
    }

    #[test]
    fn ccc_requires_id() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("grades.ccc");
        std::fs::write(
            &path,
            r#"<ColorCorrectionCollection>
  <ColorCorrection id="a">
    <SOPNode><Slope>1 1 1</Slope><Offset>0 0 0</Offset><Power>1 1 1</Power></SOPNode>
  </ColorCorrection>
</ColorCorrectionCollection>"#,
        )
        .unwrap();
        assert!(cached_cdl(&path, None).is_err());
        let cc = cached_cdl(&path, Some("a")).unwrap();
        assert_eq!(cc.id, "a");
        let by_index = cached_cdl(&path, Some("0")).unwrap();
        assert_eq!(by_index.id, "a");
    }
}
