//! Envelope header codec.
//!
//! The header is a canonical record framed by the 4-byte magic and a
//! big-endian u32 length so a decoder can read it without structural
//! knowledge. Field order: chunk size, salt, ephemeral public key,
//! optional sender block, wrapped-key list.
//!
//! The sender signature covers a digest of the other header fields plus
//! the sender's public key; the wrapped-key list enters the digest in its
//! exact serialized form, in header order. Recipients are never reordered
//! after signing.

use std::io::{Read, Write};

use bytes::{Buf, Bytes, BytesMut};
use cachet_core::crypto::{blake3_hash, Blake3Hasher, SIGNATURE_SIZE};
use cachet_core::encoding::{decode_bytes, CanonicalDecode, CanonicalEncode, DecodeError};
use tracing::debug;

use crate::error::{EnvelopeError, Result};
use crate::{
    MAGIC, MAX_CHUNK_SIZE, MAX_HEADER_LEN, MAX_RECIPIENTS, MIN_CHUNK_SIZE, SALT_SIZE,
    WRAPPED_KEY_LEN,
};

/// The AEAD-encrypted data key for one recipient.
///
/// Wrapped keys carry no recipient identifier; a reader finds its record
/// by trial decryption, which keeps the recipient list anonymous.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrappedKey {
    /// Encrypted data key (32-byte key plus 16-byte tag).
    pub d_key: Vec<u8>,
}

impl CanonicalEncode for WrappedKey {
    fn encode(&self, buf: &mut BytesMut) {
        (&self.d_key[..]).encode(buf);
    }
}

impl CanonicalDecode for WrappedKey {
    fn decode(buf: &mut Bytes) -> std::result::Result<Self, DecodeError> {
        let d_key = decode_bytes(buf, WRAPPED_KEY_LEN)?;
        Ok(Self { d_key })
    }
}

/// Sender identity block: embedded public key plus header signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SenderAuth {
    /// The sender's Ed25519 public key.
    pub public_key: [u8; 32],
    /// Ed25519 signature over the header signing digest.
    pub signature: [u8; SIGNATURE_SIZE],
}

impl CanonicalEncode for SenderAuth {
    fn encode(&self, buf: &mut BytesMut) {
        self.public_key.encode(buf);
        self.signature.encode(buf);
    }
}

impl CanonicalDecode for SenderAuth {
    fn decode(buf: &mut Bytes) -> std::result::Result<Self, DecodeError> {
        Ok(Self {
            public_key: <[u8; 32]>::decode(buf)?,
            signature: <[u8; SIGNATURE_SIZE]>::decode(buf)?,
        })
    }
}

/// The envelope header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    /// Maximum plaintext bytes per chunk.
    pub chunk_size: u32,
    /// Per-envelope random salt; feeds chunk nonce derivation.
    pub salt: [u8; SALT_SIZE],
    /// The encryptor's fresh X25519 public key.
    pub ephemeral_pk: [u8; 32],
    /// Sender block; absent for an unauthenticated sender.
    pub sender: Option<SenderAuth>,
    /// One wrapped data key per recipient, in insertion order. Non-empty.
    pub wrapped_keys: Vec<WrappedKey>,
}

fn encode_wrapped_keys(keys: &[WrappedKey], buf: &mut BytesMut) {
    (keys.len() as u32).encode(buf);
    for key in keys {
        key.encode(buf);
    }
}

impl CanonicalEncode for Header {
    fn encode(&self, buf: &mut BytesMut) {
        self.chunk_size.encode(buf);
        self.salt.encode(buf);
        self.ephemeral_pk.encode(buf);
        self.sender.encode(buf);
        encode_wrapped_keys(&self.wrapped_keys, buf);
    }
}

impl CanonicalDecode for Header {
    fn decode(buf: &mut Bytes) -> std::result::Result<Self, DecodeError> {
        let chunk_size = u32::decode(buf)?;
        let salt = <[u8; SALT_SIZE]>::decode(buf)?;
        let ephemeral_pk = <[u8; 32]>::decode(buf)?;
        let sender = Option::<SenderAuth>::decode(buf)?;

        // Bound the count before allocating; the outer length frame caps
        // the buffer but not a lying count prefix.
        let count = u32::decode(buf)? as usize;
        if count > MAX_RECIPIENTS {
            return Err(DecodeError::LengthOutOfBounds {
                length: count,
                max: MAX_RECIPIENTS,
            });
        }
        let mut wrapped_keys = Vec::with_capacity(count);
        for _ in 0..count {
            wrapped_keys.push(WrappedKey::decode(buf)?);
        }

        Ok(Self {
            chunk_size,
            salt,
            ephemeral_pk,
            sender,
            wrapped_keys,
        })
    }
}

impl Header {
    /// Checks the structural invariants of the header.
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size < MIN_CHUNK_SIZE || self.chunk_size > MAX_CHUNK_SIZE {
            return Err(EnvelopeError::MalformedHeader(format!(
                "chunk size {} out of range",
                self.chunk_size
            )));
        }
        if self.wrapped_keys.is_empty() {
            return Err(EnvelopeError::MalformedHeader(
                "no wrapped keys".to_string(),
            ));
        }
        if self.wrapped_keys.len() > MAX_RECIPIENTS {
            return Err(EnvelopeError::MalformedHeader(
                "too many wrapped keys".to_string(),
            ));
        }
        for key in &self.wrapped_keys {
            if key.d_key.len() != WRAPPED_KEY_LEN {
                return Err(EnvelopeError::MalformedHeader(format!(
                    "wrapped key has length {}, expected {}",
                    key.d_key.len(),
                    WRAPPED_KEY_LEN
                )));
            }
        }
        Ok(())
    }

    /// Returns the maximum plaintext bytes per chunk.
    pub fn chunk_size(&self) -> u32 {
        self.chunk_size
    }

    /// Returns the number of recipients the envelope was wrapped for.
    pub fn recipient_count(&self) -> usize {
        self.wrapped_keys.len()
    }

    /// True if the header carries a sender block.
    pub fn has_sender(&self) -> bool {
        self.sender.is_some()
    }

    /// Computes the digest the sender signs.
    ///
    /// Covers salt, ephemeral public key, chunk size (big-endian), the
    /// sender's public key, and a digest of the wrapped-key list exactly
    /// as serialized, in header order.
    pub fn signing_digest(&self, sender_pk: &[u8; 32]) -> [u8; 32] {
        let mut keys_buf = BytesMut::new();
        encode_wrapped_keys(&self.wrapped_keys, &mut keys_buf);
        let keys_digest = blake3_hash(&keys_buf);

        let mut hasher = Blake3Hasher::new();
        hasher.update(&self.salt);
        hasher.update(&self.ephemeral_pk);
        hasher.update(&self.chunk_size.to_be_bytes());
        hasher.update(sender_pk);
        hasher.update(&keys_digest);
        hasher.finalize()
    }

    /// Writes the magic, length frame, and encoded header to a sink.
    pub fn write_to<W: Write>(&self, sink: &mut W) -> Result<()> {
        self.validate()?;
        let bytes = self.to_vec();
        if bytes.len() > MAX_HEADER_LEN {
            return Err(EnvelopeError::Primitive("encoded header exceeds bound"));
        }

        sink.write_all(&MAGIC)?;
        sink.write_all(&(bytes.len() as u32).to_be_bytes())?;
        sink.write_all(&bytes)?;
        Ok(())
    }

    /// Reads and validates a header from a source.
    ///
    /// A source that ends inside the header is reported as malformed, not
    /// as EOF: without a complete header there is no envelope to speak of.
    pub fn read_from<R: Read>(source: &mut R) -> Result<Self> {
        let mut magic = [0u8; 4];
        read_fully(source, &mut magic)?;
        if magic != MAGIC {
            return Err(EnvelopeError::MalformedHeader("bad magic".to_string()));
        }

        let mut len_bytes = [0u8; 4];
        read_fully(source, &mut len_bytes)?;
        let len = u32::from_be_bytes(len_bytes) as usize;
        if len == 0 || len > MAX_HEADER_LEN {
            return Err(EnvelopeError::MalformedHeader(format!(
                "header length {} out of bounds",
                len
            )));
        }

        let mut bytes = vec![0u8; len];
        read_fully(source, &mut bytes)?;

        let header = Self::from_frame(&bytes)?;
        debug!(
            chunk_size = header.chunk_size,
            recipients = header.wrapped_keys.len(),
            signed = header.sender.is_some(),
            "parsed envelope header"
        );
        Ok(header)
    }

    /// Decodes and validates header bytes (the content of the length frame).
    pub fn from_frame(bytes: &[u8]) -> Result<Self> {
        let mut buf = Bytes::copy_from_slice(bytes);
        let header = Header::decode(&mut buf)
            .map_err(|e| EnvelopeError::MalformedHeader(e.to_string()))?;
        if buf.has_remaining() {
            return Err(EnvelopeError::MalformedHeader(
                "trailing bytes in header".to_string(),
            ));
        }
        header.validate()?;
        Ok(header)
    }
}

fn read_fully<R: Read>(source: &mut R, buf: &mut [u8]) -> Result<()> {
    source.read_exact(buf).map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            EnvelopeError::MalformedHeader("truncated header".to_string())
        } else {
            EnvelopeError::Io(e)
        }
    })
}
