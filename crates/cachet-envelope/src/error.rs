//! Error surface of the envelope engine.
//!
//! Errors are sticky: once an encryptor, decryptor, or stream adapter has
//! failed, every subsequent call reports the same kind. The fieldless
//! [`ErrorKind`] mirror is what instances retain; replayed errors carry a
//! canonical message rather than the original payload.

use thiserror::Error;

use crate::{MAX_CHUNK_SIZE, MIN_CHUNK_SIZE};

/// Result alias for envelope operations.
pub type Result<T> = std::result::Result<T, EnvelopeError>;

/// Errors reported by the envelope engine.
#[derive(Debug, Error)]
pub enum EnvelopeError {
    /// Chunk size outside the permitted range.
    #[error("chunk size {0} outside [{MIN_CHUNK_SIZE}, {MAX_CHUNK_SIZE}]")]
    InvalidChunkSize(u32),

    /// Key material is missing, malformed, or non-contributory.
    #[error("missing or invalid key material")]
    InvalidKey,

    /// Encryption was started with an empty recipient list.
    #[error("no recipients configured")]
    NoRecipients,

    /// Configuration was attempted after the envelope was started.
    #[error("envelope already started")]
    AlreadyStarted,

    /// A write or close was attempted on a finished stream.
    #[error("stream already closed")]
    AlreadyClosed,

    /// The header failed structural validation.
    #[error("malformed header: {0}")]
    MalformedHeader(String),

    /// A chunk frame failed structural validation.
    #[error("malformed chunk: {0}")]
    MalformedChunk(String),

    /// Bytes follow the terminal chunk.
    #[error("trailing bytes after terminal chunk")]
    TrailingGarbage,

    /// The input ended before the terminal chunk.
    #[error("unexpected end of stream")]
    UnexpectedEof,

    /// No wrapped key in the header unwraps with the supplied private key.
    #[error("no wrapped key matches the supplied private key")]
    NoMatchingRecipient,

    /// A chunk's AEAD tag did not verify.
    #[error("chunk authentication failed")]
    AuthenticationFailure,

    /// The header's sender differs from the expected sender, or its
    /// signature does not verify.
    #[error("sender verification failed")]
    SenderMismatch,

    /// A sender was expected but the envelope carries no signature.
    #[error("envelope carries no sender signature")]
    UnauthenticatedSender,

    /// Passthrough of a source or sink failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Impossible-in-practice failure of an underlying primitive.
    #[error("crypto primitive failure: {0}")]
    Primitive(&'static str),
}

impl EnvelopeError {
    /// Returns the fieldless kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            EnvelopeError::InvalidChunkSize(_) => ErrorKind::InvalidChunkSize,
            EnvelopeError::InvalidKey => ErrorKind::InvalidKey,
            EnvelopeError::NoRecipients => ErrorKind::NoRecipients,
            EnvelopeError::AlreadyStarted => ErrorKind::AlreadyStarted,
            EnvelopeError::AlreadyClosed => ErrorKind::AlreadyClosed,
            EnvelopeError::MalformedHeader(_) => ErrorKind::MalformedHeader,
            EnvelopeError::MalformedChunk(_) => ErrorKind::MalformedChunk,
            EnvelopeError::TrailingGarbage => ErrorKind::TrailingGarbage,
            EnvelopeError::UnexpectedEof => ErrorKind::UnexpectedEof,
            EnvelopeError::NoMatchingRecipient => ErrorKind::NoMatchingRecipient,
            EnvelopeError::AuthenticationFailure => ErrorKind::AuthenticationFailure,
            EnvelopeError::SenderMismatch => ErrorKind::SenderMismatch,
            EnvelopeError::UnauthenticatedSender => ErrorKind::UnauthenticatedSender,
            EnvelopeError::Io(_) => ErrorKind::Io,
            EnvelopeError::Primitive(_) => ErrorKind::Primitive,
        }
    }
}

/// Fieldless mirror of [`EnvelopeError`] for sticky-failure bookkeeping
/// and for asserting on error classes in tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum ErrorKind {
    InvalidChunkSize,
    InvalidKey,
    NoRecipients,
    AlreadyStarted,
    AlreadyClosed,
    MalformedHeader,
    MalformedChunk,
    TrailingGarbage,
    UnexpectedEof,
    NoMatchingRecipient,
    AuthenticationFailure,
    SenderMismatch,
    UnauthenticatedSender,
    Io,
    Primitive,
}

/// Reconstructs an error of the retained kind for sticky replay.
impl From<ErrorKind> for EnvelopeError {
    fn from(kind: ErrorKind) -> Self {
        match kind {
            ErrorKind::InvalidChunkSize => EnvelopeError::InvalidChunkSize(0),
            ErrorKind::InvalidKey => EnvelopeError::InvalidKey,
            ErrorKind::NoRecipients => EnvelopeError::NoRecipients,
            ErrorKind::AlreadyStarted => EnvelopeError::AlreadyStarted,
            ErrorKind::AlreadyClosed => EnvelopeError::AlreadyClosed,
            ErrorKind::MalformedHeader => {
                EnvelopeError::MalformedHeader("previously failed".to_string())
            }
            ErrorKind::MalformedChunk => {
                EnvelopeError::MalformedChunk("previously failed".to_string())
            }
            ErrorKind::TrailingGarbage => EnvelopeError::TrailingGarbage,
            ErrorKind::UnexpectedEof => EnvelopeError::UnexpectedEof,
            ErrorKind::NoMatchingRecipient => EnvelopeError::NoMatchingRecipient,
            ErrorKind::AuthenticationFailure => EnvelopeError::AuthenticationFailure,
            ErrorKind::SenderMismatch => EnvelopeError::SenderMismatch,
            ErrorKind::UnauthenticatedSender => EnvelopeError::UnauthenticatedSender,
            ErrorKind::Io => EnvelopeError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "stream previously failed with an I/O error",
            )),
            ErrorKind::Primitive => EnvelopeError::Primitive("previously failed"),
        }
    }
}

/// Conversion for the `std::io` adapter impls on the stream types.
impl From<EnvelopeError> for std::io::Error {
    fn from(err: EnvelopeError) -> Self {
        match err {
            EnvelopeError::Io(io) => io,
            EnvelopeError::UnexpectedEof => {
                std::io::Error::new(std::io::ErrorKind::UnexpectedEof, EnvelopeError::UnexpectedEof)
            }
            other => std::io::Error::new(std::io::ErrorKind::InvalidData, other),
        }
    }
}
