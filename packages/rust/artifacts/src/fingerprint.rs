//! Content fingerprinting for change detection.

use sha2::{Digest, Sha256};

use docmirror_shared::Checksum;

/// SHA-256 hex digest of `content`.
///
/// Only ever compared for equality; a pure function of the input bytes, so
/// stable across runs and processes.
pub fn checksum(content: &str) -> Checksum {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    Checksum::from_hex(format!("{:x}", hasher.finalize()))
}
