// src/utils/hash.rs

//! Deterministic keys for on-disk records.

use sha2::{Digest, Sha256};

/// Hex digest of a logical cache key, truncated to 32 characters.
pub fn key_hash(key: &str) -> String {
    let digest = Sha256::digest(key.as_bytes());
    let mut hex = hex::encode(digest);
    hex.truncate(32);
    hex
}

/// File-system safe form of a caller-supplied identifier.
pub fn sanitize_id(id: &str) -> String {
    let cleaned: String = id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "anonymous".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_hash_is_stable_and_short() {
        let a = key_hash("https://site.com/chapter-1");
        let b = key_hash("https://site.com/chapter-1");
        assert_eq!(a, b);
        assert_eq!(a.len(), 32);
        assert_ne!(a, key_hash("https://site.com/chapter-2"));
    }

    #[test]
    fn test_sanitize_id() {
        assert_eq!(sanitize_id("user:42/x"), "user_42_x");
        assert_eq!(sanitize_id(""), "anonymous");
    }
}
