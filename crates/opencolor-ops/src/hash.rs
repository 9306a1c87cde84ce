//! Content hashing for op cache ids.
//!
//! Every op can report a deterministic id derived from its canonicalized
//! parameters. Two ops with equal ids are interchangeable; the processor
//! cache and LUT-array sharing both rely on this.

use sha2::{Digest, Sha256};

/// Accumulates canonicalized op parameters into a SHA-256 digest.
///
/// Floats are fed as their raw bit patterns so that `-0.0` and `0.0` hash
/// differently only when the op treats them differently (callers normalize
/// first when needed).
#[derive(Debug, Default)]
pub struct CacheIdHasher {
    digest: Sha256,
}

impl CacheIdHasher {
    /// Creates an empty hasher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds a tag (op kind, style name, direction).
    pub fn put_str(&mut self, s: &str) -> &mut Self {
        self.digest.update((s.len() as u64).to_le_bytes());
        self.digest.update(s.as_bytes());
        self
    }

    /// Feeds one f64 parameter.
    pub fn put_f64(&mut self, v: f64) -> &mut Self {
        self.digest.update(v.to_bits().to_le_bytes());
        self
    }

    /// Feeds a slice of f64 parameters.
    pub fn put_f64s(&mut self, vs: &[f64]) -> &mut Self {
        for &v in vs {
            self.put_f64(v);
        }
        self
    }

    /// Feeds a slice of f32 samples (LUT arrays).
    pub fn put_f32s(&mut self, vs: &[f32]) -> &mut Self {
        self.digest.update((vs.len() as u64).to_le_bytes());
        for &v in vs {
            self.digest.update(v.to_bits().to_le_bytes());
        }
        self
    }

    /// Feeds an integer parameter.
    pub fn put_u64(&mut self, v: u64) -> &mut Self {
        self.digest.update(v.to_le_bytes());
        self
    }

    /// Feeds a boolean flag.
    pub fn put_bool(&mut self, v: bool) -> &mut Self {
        self.digest.update([v as u8]);
        self
    }

    /// Finishes and returns the hex id.
    pub fn finish(self) -> String {
        let out = self.digest.finalize();
        let mut s = String::with_capacity(out.len() * 2);
        for b in out {
            use std::fmt::Write;
            let _ = write!(s, "{b:02x}");
        }
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic() {
        let mut a = CacheIdHasher::new();
        a.put_str("matrix").put_f64(1.5).put_bool(true);
        let mut b = CacheIdHasher::new();
        b.put_str("matrix").put_f64(1.5).put_bool(true);
        assert_eq!(a.finish(), b.finish());
    }

    #[test]
    fn order_sensitive() {
        let mut a = CacheIdHasher::new();
        a.put_f64(1.0).put_f64(2.0);
        let mut b = CacheIdHasher::new();
        b.put_f64(2.0).put_f64(1.0);
        assert_ne!(a.finish(), b.finish());
    }
}
