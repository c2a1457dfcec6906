//! Envelope encryption: configuration, one-shot drive, and the stream
//! writer adapter.
//!
//! An [`Encryptor`] is configured with a chunk size, an optional sender
//! identity, and at least one recipient, then started exactly once —
//! either by [`Encryptor::encrypt`] (read a source to EOF) or by
//! [`Encryptor::stream_writer`] (incremental writes). Starting writes the
//! header; chunks follow in strict index order, and the terminal chunk is
//! emitted at EOF or on [`StreamWriter::close`].

use std::io::{Read, Write};

use cachet_core::keys::{AgreementPublic, AgreementSecret, SigningKey};
use rand::{rngs::OsRng, RngCore};
use tracing::debug;
use zeroize::{Zeroize, Zeroizing};

use crate::chunk::ChunkSealer;
use crate::error::{EnvelopeError, ErrorKind, Result};
use crate::header::{Header, SenderAuth};
use crate::wrap::{wrap_data_key, DataKey};
use crate::{MAX_CHUNK_SIZE, MIN_CHUNK_SIZE, SALT_SIZE};

/// Envelope encryptor.
///
/// Holds the configuration until the envelope is started; all
/// configuration calls fail with [`EnvelopeError::AlreadyStarted`] after
/// that point.
#[derive(Debug)]
pub struct Encryptor {
    chunk_size: u32,
    sender: Option<SigningKey>,
    recipients: Vec<AgreementPublic>,
    started: bool,
}

impl Encryptor {
    /// Creates an encryptor with an optional sender identity.
    ///
    /// # Errors
    /// [`EnvelopeError::InvalidChunkSize`] if `chunk_size` is outside
    /// `[MIN_CHUNK_SIZE, MAX_CHUNK_SIZE]`.
    pub fn new(sender: Option<&SigningKey>, chunk_size: u32) -> Result<Self> {
        if !(MIN_CHUNK_SIZE..=MAX_CHUNK_SIZE).contains(&chunk_size) {
            return Err(EnvelopeError::InvalidChunkSize(chunk_size));
        }
        Ok(Self {
            chunk_size,
            sender: sender.cloned(),
            recipients: Vec::new(),
            started: false,
        })
    }

    /// Sets or replaces the sender identity.
    pub fn set_sender(&mut self, sender: &SigningKey) -> Result<()> {
        if self.started {
            return Err(EnvelopeError::AlreadyStarted);
        }
        self.sender = Some(sender.clone());
        Ok(())
    }

    /// Appends a recipient. The envelope can be decrypted by any one of
    /// the recipients added before it is started.
    pub fn add_recipient(&mut self, recipient: &AgreementPublic) -> Result<()> {
        if self.started {
            return Err(EnvelopeError::AlreadyStarted);
        }
        self.recipients.push(*recipient);
        Ok(())
    }

    /// Returns the number of recipients configured so far.
    pub fn recipient_count(&self) -> usize {
        self.recipients.len()
    }

    /// Encrypts `source` to EOF into `sink` as one complete envelope.
    ///
    /// Emits full chunks while input lasts and finishes with a terminal
    /// chunk holding the remainder, which may be empty.
    pub fn encrypt<R: Read, W: Write>(&mut self, source: &mut R, sink: &mut W) -> Result<()> {
        if self.started {
            return Err(EnvelopeError::AlreadyStarted);
        }
        self.started = true;

        let mut sealer = self.start(sink)?;
        let chunk_size = self.chunk_size as usize;
        let mut buf = Zeroizing::new(vec![0u8; chunk_size]);

        loop {
            let filled = read_full(source, &mut buf)?;
            if filled == chunk_size {
                sink.write_all(&sealer.seal(&buf, false)?)?;
            } else {
                sink.write_all(&sealer.seal(&buf[..filled], true)?)?;
                break;
            }
        }
        sink.flush()?;
        Ok(())
    }

    /// Starts the envelope and returns a [`StreamWriter`] accepting
    /// arbitrary-sized writes.
    pub fn stream_writer<W: Write>(self, mut sink: W) -> Result<StreamWriter<W>> {
        if self.started {
            return Err(EnvelopeError::AlreadyStarted);
        }
        let sealer = self.start(&mut sink)?;
        Ok(StreamWriter {
            sink,
            sealer,
            buf: Zeroizing::new(Vec::with_capacity(self.chunk_size as usize)),
            chunk_size: self.chunk_size as usize,
            state: WriterState::Open,
        })
    }

    /// Generates the per-envelope secrets, wraps the data key for every
    /// recipient, signs and writes the header.
    fn start<W: Write>(&self, sink: &mut W) -> Result<ChunkSealer> {
        if self.recipients.is_empty() {
            return Err(EnvelopeError::NoRecipients);
        }

        let mut salt = [0u8; SALT_SIZE];
        OsRng.fill_bytes(&mut salt);
        let data_key = DataKey::generate();
        let ephemeral = AgreementSecret::random();

        let wrapped_keys = self
            .recipients
            .iter()
            .map(|recipient| wrap_data_key(&ephemeral, recipient, &data_key))
            .collect::<Result<Vec<_>>>()?;

        let mut header = Header {
            chunk_size: self.chunk_size,
            salt,
            ephemeral_pk: *ephemeral.public().as_bytes(),
            sender: None,
            wrapped_keys,
        };

        if let Some(sender) = &self.sender {
            let public_key = *sender.public_key().as_bytes();
            let digest = header.signing_digest(&public_key);
            let signature = sender.sign(&digest);
            header.sender = Some(SenderAuth {
                public_key,
                signature,
            });
        }

        header.write_to(sink)?;
        debug!(
            recipients = header.recipient_count(),
            chunk_size = self.chunk_size,
            signed = header.has_sender(),
            "wrote envelope header"
        );
        Ok(ChunkSealer::new(data_key, salt, self.chunk_size))
    }
}

/// Reads until the buffer is full or the source reaches EOF.
fn read_full<R: Read>(source: &mut R, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match source.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(EnvelopeError::Io(e)),
        }
    }
    Ok(filled)
}

enum WriterState {
    Open,
    Closed,
    Failed(ErrorKind),
}

/// Streaming encryption adapter.
///
/// Buffers plaintext until a full chunk accumulates, so the envelope's
/// chunk boundaries depend only on total length and chunk size, never on
/// the caller's write sizes. [`StreamWriter::close`] flushes the
/// remainder as the terminal chunk. The plaintext buffer and data key are
/// zeroized on drop; a writer dropped without `close` leaves an envelope
/// every decryptor reports as truncated.
pub struct StreamWriter<W: Write> {
    sink: W,
    sealer: ChunkSealer,
    buf: Zeroizing<Vec<u8>>,
    chunk_size: usize,
    state: WriterState,
}

impl<W: Write> StreamWriter<W> {
    /// Appends plaintext to the envelope, emitting full chunks as they
    /// accumulate. Returns the number of bytes consumed, always
    /// `data.len()` on success.
    pub fn write(&mut self, data: &[u8]) -> Result<usize> {
        self.check_open()?;

        let mut consumed = 0;
        while consumed < data.len() {
            let take = (self.chunk_size - self.buf.len()).min(data.len() - consumed);
            self.buf.extend_from_slice(&data[consumed..consumed + take]);
            consumed += take;

            if self.buf.len() == self.chunk_size {
                self.emit(false)?;
            }
        }
        Ok(consumed)
    }

    /// Emits the buffered remainder as the terminal chunk and flushes the
    /// sink. Subsequent writes fail with [`EnvelopeError::AlreadyClosed`].
    pub fn close(&mut self) -> Result<()> {
        self.check_open()?;
        self.emit(true)?;
        if let Err(e) = self.sink.flush() {
            return Err(self.fail(EnvelopeError::Io(e)));
        }
        self.state = WriterState::Closed;
        debug!("closed envelope stream");
        Ok(())
    }

    fn check_open(&self) -> Result<()> {
        match &self.state {
            WriterState::Open => Ok(()),
            WriterState::Closed => Err(EnvelopeError::AlreadyClosed),
            WriterState::Failed(kind) => Err((*kind).into()),
        }
    }

    fn emit(&mut self, terminal: bool) -> Result<()> {
        let frame = match self.sealer.seal(&self.buf, terminal) {
            Ok(frame) => frame,
            Err(e) => return Err(self.fail(e)),
        };
        self.buf.zeroize();
        if let Err(e) = self.sink.write_all(&frame) {
            return Err(self.fail(EnvelopeError::Io(e)));
        }
        Ok(())
    }

    fn fail(&mut self, err: EnvelopeError) -> EnvelopeError {
        self.buf.zeroize();
        self.state = WriterState::Failed(err.kind());
        err
    }
}

impl<W: Write> Write for StreamWriter<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        StreamWriter::write(self, buf).map_err(Into::into)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.check_open().map_err(std::io::Error::from)?;
        self.sink.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MIN_CHUNK_SIZE;

    #[test]
    fn test_chunk_size_bounds() {
        for chunk_size in [0, MIN_CHUNK_SIZE - 1, MAX_CHUNK_SIZE + 1] {
            let err = Encryptor::new(None, chunk_size).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidChunkSize, "size {}", chunk_size);
        }
        assert!(Encryptor::new(None, MIN_CHUNK_SIZE).is_ok());
        assert!(Encryptor::new(None, MAX_CHUNK_SIZE).is_ok());
    }

    #[test]
    fn test_encrypt_requires_recipients() {
        let mut encryptor = Encryptor::new(None, MIN_CHUNK_SIZE).unwrap();
        let mut sink = Vec::new();
        let err = encryptor.encrypt(&mut &b"data"[..], &mut sink).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NoRecipients);
        assert!(sink.is_empty(), "nothing may be written without recipients");
    }

    #[test]
    fn test_config_after_start_rejected() {
        let recipient = AgreementSecret::random().public();
        let mut encryptor = Encryptor::new(None, MIN_CHUNK_SIZE).unwrap();
        encryptor.add_recipient(&recipient).unwrap();

        let mut sink = Vec::new();
        encryptor.encrypt(&mut &b""[..], &mut sink).unwrap();

        let err = encryptor.add_recipient(&recipient).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlreadyStarted);

        let err = encryptor.set_sender(&SigningKey::random()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlreadyStarted);

        let err = encryptor.encrypt(&mut &b""[..], &mut sink).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlreadyStarted);
    }

    #[test]
    fn test_stream_writer_close_twice() {
        let recipient = AgreementSecret::random().public();
        let mut encryptor = Encryptor::new(None, MIN_CHUNK_SIZE).unwrap();
        encryptor.add_recipient(&recipient).unwrap();

        let mut writer = encryptor.stream_writer(Vec::new()).unwrap();
        writer.close().unwrap();

        assert_eq!(writer.close().unwrap_err().kind(), ErrorKind::AlreadyClosed);
        assert_eq!(
            writer.write(b"more").unwrap_err().kind(),
            ErrorKind::AlreadyClosed
        );
    }
}
