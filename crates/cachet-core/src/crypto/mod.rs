//! Cryptographic primitives for cachet.
//!
//! Implements the algorithm suite of the envelope format:
//! - ChaCha20-Poly1305 (RFC 8439)
//! - BLAKE3 (256-bit default mode)
//! - X25519 (RFC 7748)
//! - Ed25519 (RFC 8032 pure mode)

mod aead;
mod agreement;
mod blake3_hash;
mod signature;

pub use aead::{decrypt_chacha20poly1305, encrypt_chacha20poly1305, AeadError};
pub use agreement::{
    derive_agreement_public, generate_agreement_keypair, x25519_shared_secret, AgreementError,
};
pub use blake3_hash::{blake3_hash, Blake3Hasher};
pub use signature::{
    derive_verifying_key, generate_signing_keypair, sign_ed25519, verify_ed25519, SignatureError,
};

/// AEAD nonce size for ChaCha20-Poly1305
pub const NONCE_SIZE: usize = 12;

/// AEAD tag size for ChaCha20-Poly1305
pub const TAG_SIZE: usize = 16;

/// Key size for all symmetric operations and both curves
pub const KEY_SIZE: usize = 32;

/// Signature size for Ed25519
pub const SIGNATURE_SIZE: usize = 64;
