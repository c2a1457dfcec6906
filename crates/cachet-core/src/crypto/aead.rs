//! ChaCha20-Poly1305 AEAD implementation (RFC 8439).
//!
//! Provides authenticated encryption with associated data for:
//! - Chunk encryption
//! - Data-key wrapping

use chacha20poly1305::{
    aead::{Aead, KeyInit, Payload},
    ChaCha20Poly1305, Nonce,
};
use thiserror::Error;

use super::{KEY_SIZE, NONCE_SIZE, TAG_SIZE};

/// Errors that can occur during AEAD operations.
#[derive(Debug, Error)]
pub enum AeadError {
    /// Invalid key length (must be 32 bytes)
    #[error("Invalid key length: expected {KEY_SIZE} bytes, got {0}")]
    InvalidKeyLength(usize),

    /// Invalid nonce length (must be 12 bytes)
    #[error("Invalid nonce length: expected {NONCE_SIZE} bytes, got {0}")]
    InvalidNonceLength(usize),

    /// Encryption failed
    #[error("Encryption failed")]
    EncryptionFailed,

    /// Decryption failed (authentication tag mismatch)
    #[error("Decryption failed: authentication tag mismatch")]
    DecryptionFailed,

    /// Ciphertext too short (must contain at least the tag)
    #[error("Ciphertext too short: expected at least {TAG_SIZE} bytes, got {0}")]
    CiphertextTooShort(usize),
}

/// Encrypts plaintext using ChaCha20-Poly1305.
///
/// # Arguments
/// * `key` - 32-byte encryption key
/// * `nonce` - 12-byte nonce (must be unique per key)
/// * `plaintext` - Data to encrypt
/// * `aad` - Additional authenticated data (not encrypted, but authenticated)
///
/// # Returns
/// Ciphertext concatenated with 16-byte authentication tag
///
/// # Note
/// The nonce is NOT included in the output. Callers derive or store nonces
/// separately; the envelope derives them from the header salt.
pub fn encrypt_chacha20poly1305(
    key: &[u8],
    nonce: &[u8],
    plaintext: &[u8],
    aad: &[u8],
) -> Result<Vec<u8>, AeadError> {
    if key.len() != KEY_SIZE {
        return Err(AeadError::InvalidKeyLength(key.len()));
    }
    if nonce.len() != NONCE_SIZE {
        return Err(AeadError::InvalidNonceLength(nonce.len()));
    }

    let cipher =
        ChaCha20Poly1305::new_from_slice(key).map_err(|_| AeadError::InvalidKeyLength(key.len()))?;

    let nonce = Nonce::from_slice(nonce);
    let payload = Payload { msg: plaintext, aad };

    cipher
        .encrypt(nonce, payload)
        .map_err(|_| AeadError::EncryptionFailed)
}

/// Decrypts ciphertext using ChaCha20-Poly1305.
///
/// # Arguments
/// * `key` - 32-byte encryption key
/// * `nonce` - 12-byte nonce used during encryption
/// * `ciphertext_with_tag` - Ciphertext concatenated with 16-byte authentication tag
/// * `aad` - Additional authenticated data (must match encryption)
///
/// # Returns
/// Decrypted plaintext on success, or error if authentication fails
pub fn decrypt_chacha20poly1305(
    key: &[u8],
    nonce: &[u8],
    ciphertext_with_tag: &[u8],
    aad: &[u8],
) -> Result<Vec<u8>, AeadError> {
    if key.len() != KEY_SIZE {
        return Err(AeadError::InvalidKeyLength(key.len()));
    }
    if nonce.len() != NONCE_SIZE {
        return Err(AeadError::InvalidNonceLength(nonce.len()));
    }
    if ciphertext_with_tag.len() < TAG_SIZE {
        return Err(AeadError::CiphertextTooShort(ciphertext_with_tag.len()));
    }

    let cipher =
        ChaCha20Poly1305::new_from_slice(key).map_err(|_| AeadError::InvalidKeyLength(key.len()))?;

    let nonce = Nonce::from_slice(nonce);
    let payload = Payload {
        msg: ciphertext_with_tag,
        aad,
    };

    cipher
        .decrypt(nonce, payload)
        .map_err(|_| AeadError::DecryptionFailed)
}
