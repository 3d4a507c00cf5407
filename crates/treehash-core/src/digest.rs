//! SHA-256 digest primitives for tree hashing.
//!
//! A [`DigestEngine`] wraps one reusable SHA-256 state. The state is
//! mutable, so concurrent hashing hands each worker its own engine
//! rather than sharing one behind a lock.

use sha2::{Digest as _, Sha256};

/// Digest size in bytes (SHA-256)
pub const DIGEST_SIZE: usize = 32;

/// A fixed-size digest value
pub type Digest = [u8; DIGEST_SIZE];

/// Reusable SHA-256 engine
///
/// Each call finalizes and resets the internal state, so one engine can
/// serve any number of sequential hash operations without reallocation.
#[derive(Debug, Default)]
pub struct DigestEngine {
    sha: Sha256,
}

impl DigestEngine {
    /// Create a new engine
    #[must_use]
    pub fn new() -> Self {
        Self { sha: Sha256::new() }
    }

    /// Digest of one chunk's bytes
    pub fn hash_chunk(&mut self, bytes: &[u8]) -> Digest {
        self.sha.update(bytes);
        self.sha.finalize_reset().into()
    }

    /// Digest of the concatenation of two digests, left first
    pub fn hash_pair(&mut self, left: &Digest, right: &Digest) -> Digest {
        self.sha.update(left);
        self.sha.update(right);
        self.sha.finalize_reset().into()
    }

    /// Digest of zero input bytes
    ///
    /// This is the tree hash of an empty file.
    pub fn hash_empty(&mut self) -> Digest {
        self.sha.finalize_reset().into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EMPTY_SHA256: &str = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

    #[test]
    fn test_hash_empty_known_answer() {
        let mut engine = DigestEngine::new();
        assert_eq!(hex::encode(engine.hash_empty()), EMPTY_SHA256);
    }

    #[test]
    fn test_hash_chunk_matches_one_shot() {
        let data = vec![0xAB; 4096];
        let mut engine = DigestEngine::new();
        let expected: Digest = Sha256::digest(&data).into();
        assert_eq!(engine.hash_chunk(&data), expected);
    }

    #[test]
    fn test_hash_pair_is_concatenation_in_order() {
        let mut engine = DigestEngine::new();
        let left = engine.hash_chunk(b"left");
        let right = engine.hash_chunk(b"right");

        let mut concat = Vec::with_capacity(DIGEST_SIZE * 2);
        concat.extend_from_slice(&left);
        concat.extend_from_slice(&right);
        let expected: Digest = Sha256::digest(&concat).into();

        assert_eq!(engine.hash_pair(&left, &right), expected);
        assert_ne!(engine.hash_pair(&right, &left), expected);
    }

    #[test]
    fn test_engine_state_resets_between_calls() {
        let mut engine = DigestEngine::new();
        let first = engine.hash_chunk(b"payload");
        engine.hash_chunk(b"interleaved");
        let second = engine.hash_chunk(b"payload");
        assert_eq!(first, second);
    }
}
