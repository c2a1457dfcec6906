//! Canonical encoding system for the envelope wire format.
//!
//! Everything that participates in hashing or signing MUST use canonical
//! encoding so the byte representation is deterministic.
//!
//! # Encoding Rules
//!
//! - **Integers**: Little-endian encoding
//! - **Fixed Arrays**: Elements encoded consecutively without length prefix
//! - **Byte Strings**: u32 byte length followed by the raw bytes
//! - **Options**: 0x00 for None, 0x01 + value for Some
//! - **Structs**: Fields encoded in declaration order without padding

use bytes::{Buf, BufMut, Bytes, BytesMut};
use thiserror::Error;

/// Errors during canonical decoding.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Not enough bytes to decode
    #[error("Insufficient bytes: expected {expected}, got {available}")]
    InsufficientBytes {
        /// Expected number of bytes
        expected: usize,
        /// Actually available bytes
        available: usize,
    },

    /// Invalid option or enum tag
    #[error("Invalid enum tag: {0}")]
    InvalidEnumTag(u32),

    /// A length prefix exceeds the caller's bound
    #[error("Length {length} exceeds bound {max}")]
    LengthOutOfBounds {
        /// Decoded length
        length: usize,
        /// Maximum the caller allows
        max: usize,
    },
}

/// Trait for types that can be canonically encoded.
pub trait CanonicalEncode {
    /// Encodes the value to canonical byte representation.
    fn encode(&self, buf: &mut BytesMut);

    /// Returns the encoded byte representation.
    fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::new();
        self.encode(&mut buf);
        buf.freeze()
    }

    /// Returns the encoded byte representation as a Vec.
    fn to_vec(&self) -> Vec<u8> {
        self.to_bytes().to_vec()
    }
}

/// Trait for types that can be decoded from canonical encoding.
pub trait CanonicalDecode: Sized {
    /// Decodes from canonical byte representation.
    fn decode(buf: &mut Bytes) -> Result<Self, DecodeError>;

    /// Decodes from a byte slice.
    fn from_bytes(bytes: &[u8]) -> Result<Self, DecodeError> {
        let mut buf = Bytes::copy_from_slice(bytes);
        Self::decode(&mut buf)
    }
}

// ============================================================================
// Primitive implementations
// ============================================================================

impl CanonicalEncode for u8 {
    fn encode(&self, buf: &mut BytesMut) {
        buf.put_u8(*self);
    }
}

impl CanonicalDecode for u8 {
    fn decode(buf: &mut Bytes) -> Result<Self, DecodeError> {
        if buf.remaining() < 1 {
            return Err(DecodeError::InsufficientBytes {
                expected: 1,
                available: buf.remaining(),
            });
        }
        Ok(buf.get_u8())
    }
}

impl CanonicalEncode for u32 {
    fn encode(&self, buf: &mut BytesMut) {
        buf.put_u32_le(*self);
    }
}

impl CanonicalDecode for u32 {
    fn decode(buf: &mut Bytes) -> Result<Self, DecodeError> {
        if buf.remaining() < 4 {
            return Err(DecodeError::InsufficientBytes {
                expected: 4,
                available: buf.remaining(),
            });
        }
        Ok(buf.get_u32_le())
    }
}

// ============================================================================
// Fixed array implementations
// ============================================================================

impl<const N: usize> CanonicalEncode for [u8; N] {
    fn encode(&self, buf: &mut BytesMut) {
        buf.put_slice(self);
    }
}

impl<const N: usize> CanonicalDecode for [u8; N] {
    fn decode(buf: &mut Bytes) -> Result<Self, DecodeError> {
        if buf.remaining() < N {
            return Err(DecodeError::InsufficientBytes {
                expected: N,
                available: buf.remaining(),
            });
        }
        let mut arr = [0u8; N];
        buf.copy_to_slice(&mut arr);
        Ok(arr)
    }
}

// ============================================================================
// Byte string implementations
// ============================================================================

impl CanonicalEncode for &[u8] {
    fn encode(&self, buf: &mut BytesMut) {
        let len = self.len();
        assert!(len <= u32::MAX as usize, "Byte slice length exceeds u32::MAX");
        (len as u32).encode(buf);
        buf.put_slice(self);
    }
}

/// Decodes a u32-length-prefixed byte string, rejecting lengths above `max`.
///
/// The bound is enforced before any allocation so a corrupt length prefix
/// cannot drive memory use.
pub fn decode_bytes(buf: &mut Bytes, max: usize) -> Result<Vec<u8>, DecodeError> {
    let len = u32::decode(buf)? as usize;
    if len > max {
        return Err(DecodeError::LengthOutOfBounds { length: len, max });
    }
    if buf.remaining() < len {
        return Err(DecodeError::InsufficientBytes {
            expected: len,
            available: buf.remaining(),
        });
    }
    Ok(buf.copy_to_bytes(len).to_vec())
}

// ============================================================================
// Option implementation
// ============================================================================

impl<T: CanonicalEncode> CanonicalEncode for Option<T> {
    fn encode(&self, buf: &mut BytesMut) {
        match self {
            None => buf.put_u8(0x00),
            Some(value) => {
                buf.put_u8(0x01);
                value.encode(buf);
            }
        }
    }
}

impl<T: CanonicalDecode> CanonicalDecode for Option<T> {
    fn decode(buf: &mut Bytes) -> Result<Self, DecodeError> {
        let tag = u8::decode(buf)?;
        match tag {
            0x00 => Ok(None),
            0x01 => Ok(Some(T::decode(buf)?)),
            _ => Err(DecodeError::InvalidEnumTag(tag as u32)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_u32_encoding() {
        let value: u32 = 1;
        assert_eq!(value.to_vec(), vec![0x01, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn test_option_none_encoding() {
        let opt: Option<u32> = None;
        assert_eq!(opt.to_vec(), vec![0x00]);
    }

    #[test]
    fn test_option_some_encoding() {
        let opt: Option<u32> = Some(0x12345678);
        assert_eq!(opt.to_vec(), vec![0x01, 0x78, 0x56, 0x34, 0x12]);
    }

    #[test]
    fn test_option_bad_tag() {
        let result = Option::<u32>::from_bytes(&[0x02]);
        assert_eq!(result, Err(DecodeError::InvalidEnumTag(2)));
    }

    #[test]
    fn test_fixed_array_encoding() {
        let arr: [u8; 4] = [0x01, 0x02, 0x03, 0x04];
        assert_eq!(arr.to_vec(), vec![0x01, 0x02, 0x03, 0x04]);
    }

    #[test]
    fn test_byte_string_roundtrip() {
        let data: &[u8] = &[0xAA, 0xBB, 0xCC];
        let encoded = data.to_vec();
        assert_eq!(encoded, vec![0x03, 0x00, 0x00, 0x00, 0xAA, 0xBB, 0xCC]);

        let mut buf = Bytes::from(encoded);
        let decoded = decode_bytes(&mut buf, 16).unwrap();
        assert_eq!(decoded, data);
    }

    #[test]
    fn test_byte_string_over_bound() {
        let data: &[u8] = &[0u8; 64];
        let encoded = data.to_vec();

        let mut buf = Bytes::from(encoded);
        let result = decode_bytes(&mut buf, 48);
        assert_eq!(
            result,
            Err(DecodeError::LengthOutOfBounds {
                length: 64,
                max: 48
            })
        );
    }

    #[test]
    fn test_byte_string_truncated() {
        // Length prefix claims 8 bytes, only 3 present.
        let mut buf = Bytes::from(vec![0x08, 0x00, 0x00, 0x00, 0xAA, 0xBB, 0xCC]);
        let result = decode_bytes(&mut buf, 16);
        assert_eq!(
            result,
            Err(DecodeError::InsufficientBytes {
                expected: 8,
                available: 3
            })
        );
    }

    #[test]
    fn test_roundtrip_primitives() {
        let val: u8 = 42;
        assert_eq!(u8::from_bytes(&val.to_vec()).unwrap(), val);

        let val: u32 = 0x12345678;
        assert_eq!(u32::from_bytes(&val.to_vec()).unwrap(), val);
    }

    #[test]
    fn test_roundtrip_option() {
        let opt: Option<u32> = Some(12345);
        assert_eq!(Option::<u32>::from_bytes(&opt.to_vec()).unwrap(), opt);

        let opt: Option<u32> = None;
        assert_eq!(Option::<u32>::from_bytes(&opt.to_vec()).unwrap(), opt);
    }
}
