//! Cachet Core - primitives shared by the cachet envelope engine.
//!
//! This crate provides:
//! - Cryptographic primitives (BLAKE3, ChaCha20-Poly1305, X25519, Ed25519)
//! - Canonical encoding for deterministic serialization
//! - Key types (agreement and signing keypairs)

#![deny(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

pub mod crypto;
pub mod encoding;
pub mod keys;

pub use crypto::*;
pub use encoding::{CanonicalDecode, CanonicalEncode, DecodeError};
pub use keys::*;
