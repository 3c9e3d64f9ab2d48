//! # Collection Fingerprint
//!
//! The version marker of a cache: a digest of the collection's id-set. It
//! detects membership changes only; item contents are never hashed.

use sha2::{Digest, Sha256};

/// Compute the order-independent fingerprint of a set of item ids.
///
/// Ids are sorted, joined with `,` and hashed with SHA-256; the result is the
/// lower-case hex digest.
pub fn fingerprint<I, S>(ids: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut sorted: Vec<S> = ids.into_iter().collect();
    sorted.sort_by(|a, b| a.as_ref().cmp(b.as_ref()));

    let mut hasher = Sha256::new();
    for (index, id) in sorted.iter().enumerate() {
        if index > 0 {
            hasher.update(b",");
        }
        hasher.update(id.as_ref().as_bytes());
    }

    hex::encode(hasher.finalize())
}
