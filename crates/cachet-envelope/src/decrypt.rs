//! Envelope decryption: header parse, key unwrap, sender verification,
//! one-shot drive, and the stream reader adapter.
//!
//! A [`Decryptor`] reads the header eagerly on construction, unwraps the
//! data key when the private key is supplied, and then drives the chunk
//! engine. Every error is sticky: once an instance has failed, all
//! further calls report the same kind, and recovery means constructing a
//! fresh decryptor over the envelope bytes.

use std::io::{Read, Write};

use cachet_core::crypto::verify_ed25519;
use cachet_core::keys::{AgreementSecret, VerifyingPublic};
use tracing::debug;
use zeroize::{Zeroize, Zeroizing};

use crate::chunk::ChunkOpener;
use crate::error::{EnvelopeError, ErrorKind, Result};
use crate::header::Header;
use crate::wrap::unwrap_data_key;

enum DecState {
    AwaitingKey,
    Ready(ChunkOpener),
    Done,
    Failed(ErrorKind),
}

/// Envelope decryptor.
pub struct Decryptor<R: Read> {
    source: R,
    header: Header,
    state: DecState,
}

impl<R: Read> Decryptor<R> {
    /// Reads and validates the envelope header; does not yet consume any
    /// chunk.
    pub fn new(mut source: R) -> Result<Self> {
        let header = Header::read_from(&mut source)?;
        Ok(Self {
            source,
            header,
            state: DecState::AwaitingKey,
        })
    }

    /// Returns the parsed header.
    pub fn header(&self) -> &Header {
        &self.header
    }

    /// Returns the sender public key embedded in the header, if any.
    pub fn sender_public_key(&self) -> Option<VerifyingPublic> {
        self.header
            .sender
            .as_ref()
            .map(|auth| VerifyingPublic::new(auth.public_key))
    }

    /// Supplies the recipient's private key and optionally pins the
    /// expected sender.
    ///
    /// With `expected_sender` set, the header must carry a sender block
    /// whose public key matches and whose signature verifies
    /// ([`EnvelopeError::UnauthenticatedSender`] /
    /// [`EnvelopeError::SenderMismatch`] otherwise). The data key is then
    /// recovered by trial decryption of the wrapped-key list
    /// ([`EnvelopeError::NoMatchingRecipient`] if no record unwraps).
    pub fn set_private_key(
        &mut self,
        secret: &AgreementSecret,
        expected_sender: Option<&VerifyingPublic>,
    ) -> Result<()> {
        match &self.state {
            DecState::AwaitingKey => {}
            DecState::Failed(kind) => return Err((*kind).into()),
            DecState::Ready(_) | DecState::Done => return Err(EnvelopeError::AlreadyStarted),
        }

        if let Some(expected) = expected_sender {
            match &self.header.sender {
                None => return Err(self.fail(EnvelopeError::UnauthenticatedSender)),
                Some(auth) => {
                    if &auth.public_key != expected.as_bytes() {
                        return Err(self.fail(EnvelopeError::SenderMismatch));
                    }
                    let digest = self.header.signing_digest(&auth.public_key);
                    if verify_ed25519(&auth.public_key, &digest, &auth.signature).is_err() {
                        return Err(self.fail(EnvelopeError::SenderMismatch));
                    }
                }
            }
        }

        let data_key =
            match unwrap_data_key(secret, &self.header.ephemeral_pk, &self.header.wrapped_keys) {
                Ok(key) => key,
                Err(e) => return Err(self.fail(e)),
            };

        debug!(
            recipients = self.header.recipient_count(),
            verified_sender = expected_sender.is_some(),
            "unwrapped data key"
        );
        self.state = DecState::Ready(ChunkOpener::new(
            data_key,
            self.header.salt,
            self.header.chunk_size,
        ));
        Ok(())
    }

    /// Streams the whole plaintext into `sink`, validating the terminal
    /// chunk and rejecting trailing bytes.
    pub fn decrypt<W: Write>(&mut self, sink: &mut W) -> Result<()> {
        let mut opener = match std::mem::replace(&mut self.state, DecState::Done) {
            DecState::Ready(opener) => opener,
            other => {
                let err = match &other {
                    DecState::AwaitingKey => EnvelopeError::InvalidKey,
                    DecState::Done => EnvelopeError::AlreadyClosed,
                    DecState::Failed(kind) => (*kind).into(),
                    DecState::Ready(_) => unreachable!(),
                };
                self.state = other;
                return Err(err);
            }
        };

        loop {
            let (plaintext, terminal) = match opener.open_next(&mut self.source) {
                Ok(chunk) => chunk,
                Err(e) => return Err(self.fail(e)),
            };
            let plaintext = Zeroizing::new(plaintext);

            if let Err(e) = sink.write_all(&plaintext) {
                return Err(self.fail(EnvelopeError::Io(e)));
            }
            if terminal {
                if let Err(e) = ensure_eof(&mut self.source) {
                    return Err(self.fail(e));
                }
                debug!("envelope decrypted");
                return Ok(());
            }
        }
    }

    /// Turns the decryptor into a [`StreamReader`] yielding plaintext
    /// incrementally.
    pub fn stream_reader(self) -> Result<StreamReader<R>> {
        match self.state {
            DecState::Ready(opener) => Ok(StreamReader {
                source: self.source,
                opener,
                buffered: Zeroizing::new(Vec::new()),
                pos: 0,
                done: false,
                failed: None,
            }),
            DecState::AwaitingKey => Err(EnvelopeError::InvalidKey),
            DecState::Done => Err(EnvelopeError::AlreadyClosed),
            DecState::Failed(kind) => Err(kind.into()),
        }
    }

    fn fail(&mut self, err: EnvelopeError) -> EnvelopeError {
        self.state = DecState::Failed(err.kind());
        err
    }
}

/// Confirms the source is exhausted after the terminal chunk.
fn ensure_eof<R: Read>(source: &mut R) -> Result<()> {
    let mut probe = [0u8; 1];
    loop {
        match source.read(&mut probe) {
            Ok(0) => return Ok(()),
            Ok(_) => return Err(EnvelopeError::TrailingGarbage),
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(EnvelopeError::Io(e)),
        }
    }
}

/// Streaming decryption adapter.
///
/// Pulls and authenticates one chunk at a time; a read never exposes a
/// byte from a chunk whose tag has not verified. EOF (a zero-length read)
/// is reported only after the terminal chunk has been fully delivered,
/// and any framing or authentication error is sticky.
pub struct StreamReader<R: Read> {
    source: R,
    opener: ChunkOpener,
    buffered: Zeroizing<Vec<u8>>,
    pos: usize,
    done: bool,
    failed: Option<ErrorKind>,
}

impl<R: Read> StreamReader<R> {
    /// Reads up to `out.len()` bytes of plaintext, pulling the next chunk
    /// from the source on demand. Returns `Ok(0)` only at end of stream.
    pub fn read(&mut self, out: &mut [u8]) -> Result<usize> {
        if let Some(kind) = self.failed {
            return Err(kind.into());
        }
        if out.is_empty() {
            return Ok(0);
        }

        loop {
            if self.pos < self.buffered.len() {
                let n = (self.buffered.len() - self.pos).min(out.len());
                out[..n].copy_from_slice(&self.buffered[self.pos..self.pos + n]);
                self.pos += n;
                return Ok(n);
            }
            if self.done {
                return Ok(0);
            }

            let (plaintext, terminal) = match self.opener.open_next(&mut self.source) {
                Ok(chunk) => chunk,
                Err(e) => return Err(self.fail(e)),
            };
            if terminal {
                if let Err(e) = ensure_eof(&mut self.source) {
                    return Err(self.fail(e));
                }
                self.done = true;
            }

            self.buffered.zeroize();
            *self.buffered = plaintext;
            self.pos = 0;
        }
    }

    /// True once the terminal chunk has been read and verified.
    pub fn finished(&self) -> bool {
        self.done && self.pos >= self.buffered.len()
    }

    fn fail(&mut self, err: EnvelopeError) -> EnvelopeError {
        self.buffered.zeroize();
        self.failed = Some(err.kind());
        err
    }
}

impl<R: Read> Read for StreamReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        StreamReader::read(self, buf).map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Encryptor, MIN_CHUNK_SIZE};
    use cachet_core::keys::Keypair;

    fn envelope_for(recipient: &Keypair, payload: &[u8]) -> Vec<u8> {
        let mut encryptor = Encryptor::new(None, MIN_CHUNK_SIZE).unwrap();
        encryptor.add_recipient(&recipient.agreement_public()).unwrap();
        let mut sink = Vec::new();
        encryptor.encrypt(&mut &payload[..], &mut sink).unwrap();
        sink
    }

    #[test]
    fn test_decrypt_before_key_rejected() {
        let recipient = Keypair::generate();
        let envelope = envelope_for(&recipient, b"payload");

        let mut decryptor = Decryptor::new(envelope.as_slice()).unwrap();
        let mut sink = Vec::new();
        assert_eq!(
            decryptor.decrypt(&mut sink).unwrap_err().kind(),
            ErrorKind::InvalidKey
        );
    }

    #[test]
    fn test_failure_is_sticky() {
        let recipient = Keypair::generate();
        let stranger = Keypair::generate();
        let envelope = envelope_for(&recipient, b"payload");

        let mut decryptor = Decryptor::new(envelope.as_slice()).unwrap();
        let err = decryptor
            .set_private_key(&stranger.agreement, None)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NoMatchingRecipient);

        // The instance is dead; the right key no longer helps.
        let err = decryptor
            .set_private_key(&recipient.agreement, None)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NoMatchingRecipient);
    }

    #[test]
    fn test_second_decrypt_rejected() {
        let recipient = Keypair::generate();
        let envelope = envelope_for(&recipient, b"payload");

        let mut decryptor = Decryptor::new(envelope.as_slice()).unwrap();
        decryptor.set_private_key(&recipient.agreement, None).unwrap();

        let mut sink = Vec::new();
        decryptor.decrypt(&mut sink).unwrap();
        assert_eq!(sink, b"payload");

        assert_eq!(
            decryptor.decrypt(&mut sink).unwrap_err().kind(),
            ErrorKind::AlreadyClosed
        );
    }
}
