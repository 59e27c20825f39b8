//! Content fingerprinting
//!
//! Each stored embedding carries a digest of the exact text it was generated
//! from, so a change-and-resave can be detected by comparing digests rather
//! than comparing vectors.

use sha2::{Digest, Sha256};

/// Compute the SHA-256 digest of the UTF-8 bytes of `text`, as lowercase hex.
///
/// Deterministic and byte-sensitive: any difference in the input, including
/// whitespace, yields a different digest.
pub fn fingerprint(text: &str) -> String {
    let digest = Sha256::digest(text.as_bytes());
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_deterministic() {
        let a = fingerprint("Buy milk");
        let b = fingerprint("Buy milk");
        assert_eq!(a, b);
    }

    #[test]
    fn test_fingerprint_distinct_inputs() {
        assert_ne!(fingerprint("Buy milk"), fingerprint("Buy milk and eggs"));
    }

    #[test]
    fn test_fingerprint_whitespace_sensitive() {
        assert_ne!(fingerprint("Buy milk"), fingerprint("Buy milk "));
        assert_ne!(fingerprint("Buy milk"), fingerprint("Buy  milk"));
    }

    #[test]
    fn test_fingerprint_known_vectors() {
        // Standard SHA-256 test vectors
        assert_eq!(
            fingerprint("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(
            fingerprint(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_fingerprint_format() {
        let digest = fingerprint("anything");
        assert_eq!(digest.len(), 64);
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(digest, digest.to_lowercase());
    }
}
