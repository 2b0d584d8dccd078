//! Cache key mapping.
//!
//! Every function here is pure: the same inputs always produce the same
//! identifier, which is what makes `set` an idempotent overwrite.

use sha2::{Digest, Sha256};

/// File extension of cache records.
pub const RECORD_EXTENSION: &str = "cache";

/// Name prefix of tag records.
const TAG_PREFIX: &str = "tag_";

/// Hex-encoded SHA-256 of a cache name.
pub fn hash_name(name: &str) -> String {
    hex::encode(Sha256::digest(name.as_bytes()))
}

/// Relative path of the record holding `name`.
///
/// `prefix/ab/cdef….cache` with sharding, `prefix/abcdef….cache` without;
/// the prefix segment is omitted when `prefix` is empty.
pub fn record_path(name: &str, prefix: &str, subdir: bool) -> String {
    let hash = hash_name(name);
    let mut path = String::with_capacity(hash.len() + prefix.len() + 16);

    let prefix = prefix.trim_matches('/');
    if !prefix.is_empty() {
        path.push_str(prefix);
        path.push('/');
    }
    if subdir {
        path.push_str(&hash[..2]);
        path.push('/');
        path.push_str(&hash[2..]);
    } else {
        path.push_str(&hash);
    }
    path.push('.');
    path.push_str(RECORD_EXTENSION);
    path
}

/// Namespaced key for the remote store.
pub fn namespaced_key(prefix: &str, name: &str) -> String {
    format!("{prefix}{name}")
}

/// Cache name of the record listing a tag's members.
pub fn tag_record_name(tag: &str) -> String {
    format!("{TAG_PREFIX}{}", hash_name(tag))
}
