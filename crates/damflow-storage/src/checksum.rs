//! SHA-256 content digests for upload integrity checks.

use sha2::{Digest, Sha256};
use std::fmt;

use crate::error::{StorageError, StorageResult};

/// A SHA-256 digest.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentDigest([u8; 32]);

impl ContentDigest {
    /// Lowercase hex, 64 characters.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Compares against a client supplied hex digest, ignoring case and surrounding
    /// whitespace.
    pub fn matches(&self, client_hex: &str) -> bool {
        self.to_hex().eq_ignore_ascii_case(client_hex.trim())
    }

    /// Fails with [`StorageError::ChecksumMismatch`] unless `client_hex` matches.
    pub fn verify(&self, client_hex: &str) -> StorageResult<()> {
        if self.matches(client_hex) {
            Ok(())
        } else {
            Err(StorageError::ChecksumMismatch {
                expected: client_hex.trim().to_ascii_lowercase(),
                actual: self.to_hex(),
            })
        }
    }
}

impl fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentDigest({})", self.to_hex())
    }
}

/// Incremental SHA-256 hasher. Feed it chunks as they arrive so the whole input is
/// never held in memory.
#[derive(Clone, Default)]
pub struct ContentHasher(Sha256);

impl ContentHasher {
    pub fn new() -> Self {
        Self(Sha256::new())
    }

    pub fn update(&mut self, chunk: &[u8]) {
        self.0.update(chunk);
    }

    pub fn finalize(self) -> ContentDigest {
        ContentDigest(self.0.finalize().into())
    }

    pub fn digest_bytes(data: &[u8]) -> ContentDigest {
        let mut hasher = Self::new();
        hasher.update(data);
        hasher.finalize()
    }
}
