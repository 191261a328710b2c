//! Secure random tokens.
//!
//! Reset and verification links carry one of these; anti-enumeration paths
//! generate (and discard) one so both branches do comparable work.

use rand::RngCore;
use sha2::{Digest, Sha256};

/// Default entropy for reset and verification tokens: 32 bytes (256 bits).
pub const DEFAULT_TOKEN_BYTES: usize = 32;

/// Generate `byte_len` bytes from the thread-local CSPRNG, hex-encoded.
pub fn generate_token(byte_len: usize) -> String {
    let mut bytes = vec![0u8; byte_len];
    rand::rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Generate a token with the default entropy.
pub fn generate_default_token() -> String {
    generate_token(DEFAULT_TOKEN_BYTES)
}

/// SHA-256 fingerprint of a token, hex-encoded.
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Short fingerprint prefix, for log lines.
pub fn token_fingerprint(token: &str) -> String {
    let mut digest = hash_token(token);
    digest.truncate(12);
    digest
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn token_is_hex_of_requested_length() {
        let token = generate_token(16);
        assert_eq!(token.len(), 32);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(generate_default_token().len(), 64);
    }

    #[test]
    fn tokens_are_unique() {
        let tokens: HashSet<String> = (0..1000).map(|_| generate_default_token()).collect();
        assert_eq!(tokens.len(), 1000);
    }

    #[test]
    fn hash_is_deterministic() {
        assert_eq!(hash_token("abc"), hash_token("abc"));
        assert_ne!(hash_token("abc"), hash_token("abd"));
    }

    #[test]
    fn hash_matches_known_vector() {
        assert_eq!(
            hash_token("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn fingerprint_is_prefix_of_hash() {
        let fp = token_fingerprint("abc");
        assert_eq!(fp.len(), 12);
        assert!(hash_token("abc").starts_with(&fp));
    }
}
