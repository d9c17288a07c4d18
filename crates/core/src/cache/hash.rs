//! Digests used for cache file names and content deduplication.

use sha2::{Digest, Sha256};

/// Compute the file name stem for a cache key.
///
/// Keys are normalized URLs; hashing keeps file names free of
/// filesystem-unsafe characters.
pub fn entry_digest(key: &str) -> String {
    hex::encode(Sha256::digest(key.as_bytes()))
}

/// Compute the digest of an extracted text body.
pub fn content_digest(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(b"content\n");
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}
