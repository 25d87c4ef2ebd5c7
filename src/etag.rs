//! Content hashing for ETag synthesis and the ETag-pair annotation.
//!
//! Per the crate's design notes, the hash must be deterministic and
//! collision-resistant enough that equal bodies always produce equal
//! digests; MD5 is used because it matches the published test fixtures
//! (`"world1"` hashes to `48b21a691481958c34cc165011bdb9bc`), not for any
//! cryptographic property.

use md5::{Digest, Md5};

/// Computes the lowercase hex MD5 digest of `body`.
#[must_use]
pub fn content_hash(body: &[u8]) -> String {
    let mut hasher = Md5::new();
    hasher.update(body);
    hex::encode(hasher.finalize())
}

/// Formats a content hash as a weak, quoted ETag value suitable for
/// synthesizing an `ETag` header when the origin didn't supply one.
#[must_use]
pub fn synthesize_etag(body: &[u8]) -> String {
    format!("\"{}\"", content_hash(body))
}
