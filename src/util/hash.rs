//! Hashing utilities for checksums and fingerprinting.

use std::path::Path;

use sha1::Sha1;
use sha2::{Digest, Sha256};

/// Compute the SHA256 hash of a byte slice as lowercase hex.
pub fn sha256_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Compute the SHA-1 hash of a byte slice as lowercase hex.
///
/// Only for verifying sources that publish SHA-1 digests.
pub fn sha1_bytes(data: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Incremental hasher for cache keys built from many components.
///
/// Every component is terminated by a NUL separator so that `["ab", "c"]`
/// and `["a", "bc"]` never produce the same digest.
#[derive(Default)]
pub struct Fingerprint {
    hasher: Sha256,
}

impl Fingerprint {
    pub fn new() -> Self {
        Fingerprint {
            hasher: Sha256::new(),
        }
    }

    /// Add a string component.
    pub fn update_str(&mut self, s: &str) -> &mut Self {
        self.hasher.update(s.as_bytes());
        self.hasher.update(b"\0");
        self
    }

    /// Add a tagged section marker, e.g. `"deps"`, followed by an item count.
    pub fn section(&mut self, tag: &str, len: usize) -> &mut Self {
        self.update_str(tag);
        self.update_str(&len.to_string())
    }

    /// Add multiple strings.
    pub fn update_strs<'a>(&mut self, items: impl IntoIterator<Item = &'a str>) -> &mut Self {
        for s in items {
            self.update_str(s);
        }
        self
    }

    /// Add an optional string component.
    pub fn update_opt(&mut self, opt: Option<&str>) -> &mut Self {
        match opt {
            Some(s) => {
                self.hasher.update(b"\x01");
                self.update_str(s)
            }
            None => {
                self.hasher.update(b"\x00");
                self
            }
        }
    }

    /// Add a filesystem path (lossy UTF-8).
    pub fn update_path(&mut self, path: &Path) -> &mut Self {
        self.update_str(&path.to_string_lossy())
    }

    /// Finalize and return the fingerprint as a hex string.
    pub fn finish(self) -> String {
        hex::encode(self.hasher.finalize())
    }
}
