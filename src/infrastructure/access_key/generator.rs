//! Access key generation

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::RngCore;

/// Generator for opaque access key strings
///
/// Keys are stored and compared as-is, so the only requirement is enough
/// entropy that a collision with an existing key is not a practical concern.
#[derive(Debug, Clone)]
pub struct AccessKeyGenerator {
    /// Prefix for all generated keys (e.g., "ak_")
    prefix: String,
    /// Number of random bytes to generate
    key_bytes: usize,
}

impl Default for AccessKeyGenerator {
    fn default() -> Self {
        Self::new("ak_")
    }
}

impl AccessKeyGenerator {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            key_bytes: 24,
        }
    }

    pub fn with_key_bytes(mut self, bytes: usize) -> Self {
        self.key_bytes = bytes;
        self
    }

    /// Generate a new key string
    pub fn generate(&self) -> String {
        let mut random_bytes = vec![0u8; self.key_bytes];
        rand::thread_rng().fill_bytes(&mut random_bytes);

        format!("{}{}", self.prefix, URL_SAFE_NO_PAD.encode(&random_bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_has_prefix_and_length() {
        let key = AccessKeyGenerator::default().generate();

        assert!(key.starts_with("ak_"));
        // 24 bytes -> 32 base64 characters without padding
        assert_eq!(key.len(), 3 + 32);
    }

    #[test]
    fn test_generate_is_url_safe() {
        let key = AccessKeyGenerator::new("").with_key_bytes(64).generate();
        assert!(key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn test_generate_unique() {
        let generator = AccessKeyGenerator::default();
        assert_ne!(generator.generate(), generator.generate());
    }
}
