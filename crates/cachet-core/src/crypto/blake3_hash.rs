//! BLAKE3 hash implementation.
//!
//! BLAKE3 in default hash mode with 256-bit output is the single digest
//! primitive of the format, used for:
//! - Chunk nonce derivation
//! - Wrap-key derivation
//! - The sender signature digest

/// Computes BLAKE3 hash in default mode with 256-bit output.
///
/// # Example
/// ```
/// use cachet_core::crypto::blake3_hash;
///
/// // BLAKE3("") conformance anchor
/// let hash = blake3_hash(&[]);
/// let expected = hex::decode("af1349b9f5f9a1a6a0404dea36dcc9499bcb25c9adc112b7cc9a93cae41f3262").unwrap();
/// assert_eq!(hash.as_slice(), expected.as_slice());
/// ```
pub fn blake3_hash(data: &[u8]) -> [u8; 32] {
    *blake3::hash(data).as_bytes()
}

/// Computes BLAKE3 hash incrementally using a hasher.
///
/// Used where the digest input is assembled from several fields.
pub struct Blake3Hasher {
    inner: blake3::Hasher,
}

impl Blake3Hasher {
    /// Creates a new BLAKE3 hasher.
    pub fn new() -> Self {
        Self {
            inner: blake3::Hasher::new(),
        }
    }

    /// Updates the hasher with additional data.
    pub fn update(&mut self, data: &[u8]) {
        self.inner.update(data);
    }

    /// Finalizes the hash and returns the 32-byte output.
    pub fn finalize(self) -> [u8; 32] {
        *self.inner.finalize().as_bytes()
    }
}

impl Default for Blake3Hasher {
    fn default() -> Self {
        Self::new()
    }
}
