//! Content hashing helpers, ported from the original implementation's
//! `utils/hash_utils.py`: SHA-256, hex-encoded.

use sha2::{Digest, Sha256};

/// Hash arbitrary bytes.
pub fn compute_hash(data: &[u8]) -> String {
    let digest = Sha256::digest(data);
    hex::encode(digest)
}

/// Hash a UTF-8 string (the common case: document/chunk content).
pub fn compute_text_hash(text: &str) -> String {
    compute_hash(text.as_bytes())
}

/// Hash a `(model, text)` pair for embedding cache keys (spec §4.6):
/// `sha256("{model}:{text}")`, matching the original cache's `_make_key`.
pub fn compute_embedding_cache_key(model: &str, text: &str) -> String {
    compute_text_hash(&format!("{model}:{text}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_hash_is_deterministic() {
        assert_eq!(compute_text_hash("hello"), compute_text_hash("hello"));
    }

    #[test]
    fn text_hash_distinguishes_content() {
        assert_ne!(compute_text_hash("hello"), compute_text_hash("world"));
    }

    #[test]
    fn cache_key_distinguishes_model() {
        let a = compute_embedding_cache_key("model-a", "same text");
        let b = compute_embedding_cache_key("model-b", "same text");
        assert_ne!(a, b);
    }

    #[test]
    fn cache_key_is_hex() {
        let key = compute_embedding_cache_key("model", "text");
        assert_eq!(key.len(), 64);
        assert!(key.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
