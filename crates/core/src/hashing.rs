//! SHA-256 digest helpers.
//!
//! Content hashes identify analysed artifacts without storing the artifact
//! itself; payload digests identify webhook bodies in the dead-letter log.

use sha2::{Digest, Sha256};

/// SHA-256 hex digest of the given bytes.
pub fn sha256_hex(data: &[u8]) -> String {
    let digest = Sha256::digest(data);
    format!("{digest:x}")
}

/// Content hash of a text artifact: digest of the trimmed UTF-8 bytes.
pub fn content_hash_text(text: &str) -> String {
    sha256_hex(text.trim().as_bytes())
}
