//! Single-pass buffering with SHA-256
//!
//! Bodies are hashed as they are read, so the digest is ready the moment the
//! last chunk arrives and the bytes are never walked twice.

use bytes::{Bytes, BytesMut};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// The body grew past the allowed size
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("body exceeds {limit} bytes")]
pub struct LimitExceeded {
    pub limit: u64,
}

/// Accumulates chunks while hashing them
pub struct HashingBuffer {
    hasher: Sha256,
    buf: BytesMut,
    limit: Option<u64>,
}

impl HashingBuffer {
    pub fn new() -> Self {
        Self {
            hasher: Sha256::new(),
            buf: BytesMut::new(),
            limit: None,
        }
    }

    /// Buffer that refuses to grow past `limit` bytes
    pub fn with_limit(limit: u64) -> Self {
        Self {
            limit: Some(limit),
            // Cap the up-front allocation; limits can be large
            buf: BytesMut::with_capacity(limit.min(1024 * 1024) as usize),
            ..Self::new()
        }
    }

    /// Append a chunk. Nothing is appended if it would cross the limit.
    pub fn push(&mut self, chunk: &[u8]) -> Result<(), LimitExceeded> {
        if let Some(limit) = self.limit {
            if self.len() + chunk.len() as u64 > limit {
                return Err(LimitExceeded { limit });
            }
        }
        self.hasher.update(chunk);
        self.buf.extend_from_slice(chunk);
        Ok(())
    }

    pub fn len(&self) -> u64 {
        self.buf.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Buffered bytes and their lowercase hex SHA-256
    pub fn finish(self) -> (Bytes, String) {
        let digest = hex::encode(self.hasher.finalize());
        (self.buf.freeze(), digest)
    }
}

impl Default for HashingBuffer {
    fn default() -> Self {
        Self::new()
    }
}

/// Lowercase hex SHA-256 of `data`
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}
