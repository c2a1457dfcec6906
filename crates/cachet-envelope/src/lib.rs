//! Cachet Envelope - hybrid public-key streaming authenticated encryption.
//!
//! An envelope is a self-describing encrypted byte stream: a header naming
//! the format parameters and carrying one wrapped data key per recipient,
//! followed by a sequence of length-framed AEAD chunks. Any one of the
//! named recipients can decrypt; the sender can optionally authenticate
//! the header with an Ed25519 signature.
//!
//! Wire layout:
//!
//! ```text
//! magic (4 bytes "CHT1")
//! header_len   : u32 big-endian, at most 64 KiB
//! header_bytes : canonical header record
//! frames ...   : each a u32 big-endian word (bit 31 = terminal flag,
//!                bits 0..30 = ciphertext length) followed by that many
//!                ciphertext bytes (AEAD tag included). Exactly one frame
//!                is terminal, and it is the last.
//! ```
//!
//! The engine is synchronous and single-threaded per envelope; memory use
//! is bounded by one chunk regardless of stream length.

#![deny(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

mod chunk;
mod decrypt;
mod encrypt;
mod error;
mod header;
mod wrap;

pub use decrypt::{Decryptor, StreamReader};
pub use encrypt::{Encryptor, StreamWriter};
pub use error::{EnvelopeError, ErrorKind, Result};
pub use header::{Header, SenderAuth, WrappedKey};

/// Magic bytes opening every envelope.
pub const MAGIC: [u8; 4] = *b"CHT1";

/// Smallest permitted plaintext chunk size (1 KiB).
pub const MIN_CHUNK_SIZE: u32 = 1 << 10;

/// Largest permitted plaintext chunk size (1 MiB).
pub const MAX_CHUNK_SIZE: u32 = 1 << 20;

/// Chunk size used by callers with no particular preference (64 KiB).
pub const DEFAULT_CHUNK_SIZE: u32 = 1 << 16;

/// Salt length in the header; feeds chunk nonce derivation.
pub const SALT_SIZE: usize = 32;

/// Upper bound on the encoded header, enforced by both codec directions.
pub const MAX_HEADER_LEN: usize = 64 * 1024;

/// Upper bound on wrapped-key records in one header.
pub const MAX_RECIPIENTS: usize = 1024;

/// Length of one wrapped-key record: a 32-byte data key plus the AEAD tag.
pub const WRAPPED_KEY_LEN: usize = cachet_core::crypto::KEY_SIZE + cachet_core::crypto::TAG_SIZE;
