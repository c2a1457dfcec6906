//! Chunk engine: nonce derivation, AAD construction, frame codec.
//!
//! Every chunk is AEAD-encrypted with a nonce and AAD derived from the
//! header salt, the chunk index, and the terminal flag, so truncation,
//! reordering, and terminal-bit forgery all surface as authentication
//! failures or framing errors.
//!
//! Frame layout: a u32 big-endian word whose top bit marks the terminal
//! chunk and whose low 31 bits carry the ciphertext length, followed by
//! the ciphertext (tag included).

use std::io::Read;

use cachet_core::crypto::{
    decrypt_chacha20poly1305, encrypt_chacha20poly1305, Blake3Hasher, NONCE_SIZE, TAG_SIZE,
};
use tracing::trace;

use crate::error::{EnvelopeError, Result};
use crate::wrap::DataKey;
use crate::SALT_SIZE;

/// Terminal-chunk marker in the frame word.
const TERMINAL_BIT: u32 = 1 << 31;

const FLAG_MORE: u8 = 0x00;
const FLAG_TERMINAL: u8 = 0x01;

fn chunk_flag(terminal: bool) -> u8 {
    if terminal {
        FLAG_TERMINAL
    } else {
        FLAG_MORE
    }
}

/// Derives the chunk nonce: the first 12 bytes of
/// `BLAKE3(salt ‖ index_be32 ‖ flag)`.
fn chunk_nonce(salt: &[u8; SALT_SIZE], index: u32, terminal: bool) -> [u8; NONCE_SIZE] {
    let mut hasher = Blake3Hasher::new();
    hasher.update(salt);
    hasher.update(&index.to_be_bytes());
    hasher.update(&[chunk_flag(terminal)]);
    let digest = hasher.finalize();

    let mut nonce = [0u8; NONCE_SIZE];
    nonce.copy_from_slice(&digest[..NONCE_SIZE]);
    nonce
}

/// Builds the chunk AAD: `salt ‖ index_be32 ‖ flag`.
fn chunk_aad(salt: &[u8; SALT_SIZE], index: u32, terminal: bool) -> [u8; SALT_SIZE + 5] {
    let mut aad = [0u8; SALT_SIZE + 5];
    aad[..SALT_SIZE].copy_from_slice(salt);
    aad[SALT_SIZE..SALT_SIZE + 4].copy_from_slice(&index.to_be_bytes());
    aad[SALT_SIZE + 4] = chunk_flag(terminal);
    aad
}

/// Seals plaintext chunks into frames, in strict index order.
pub(crate) struct ChunkSealer {
    key: DataKey,
    salt: [u8; SALT_SIZE],
    chunk_size: u32,
    next_index: u32,
    finished: bool,
}

impl ChunkSealer {
    pub(crate) fn new(key: DataKey, salt: [u8; SALT_SIZE], chunk_size: u32) -> Self {
        Self {
            key,
            salt,
            chunk_size,
            next_index: 0,
            finished: false,
        }
    }

    /// Seals one chunk and returns the complete frame.
    ///
    /// Non-terminal plaintext must be exactly the chunk size; the terminal
    /// chunk carries anything up to it, including nothing.
    pub(crate) fn seal(&mut self, plaintext: &[u8], terminal: bool) -> Result<Vec<u8>> {
        if self.finished {
            return Err(EnvelopeError::AlreadyClosed);
        }
        if terminal {
            if plaintext.len() > self.chunk_size as usize {
                return Err(EnvelopeError::Primitive("terminal chunk over chunk size"));
            }
        } else {
            if plaintext.len() != self.chunk_size as usize {
                return Err(EnvelopeError::Primitive("non-terminal chunk not full"));
            }
            if self.next_index == u32::MAX {
                return Err(EnvelopeError::Primitive("chunk counter overflow"));
            }
        }

        let index = self.next_index;
        let nonce = chunk_nonce(&self.salt, index, terminal);
        let aad = chunk_aad(&self.salt, index, terminal);
        let ciphertext =
            encrypt_chacha20poly1305(self.key.as_bytes(), &nonce, plaintext, &aad)
                .map_err(|_| EnvelopeError::Primitive("chunk encryption failed"))?;

        let mut word = ciphertext.len() as u32;
        if terminal {
            word |= TERMINAL_BIT;
            self.finished = true;
        } else {
            self.next_index = index + 1;
        }

        let mut frame = Vec::with_capacity(4 + ciphertext.len());
        frame.extend_from_slice(&word.to_be_bytes());
        frame.extend_from_slice(&ciphertext);

        trace!(index, terminal, ciphertext_len = ciphertext.len(), "sealed chunk");
        Ok(frame)
    }
}

/// Opens frames back into plaintext chunks, enforcing order and termination.
pub(crate) struct ChunkOpener {
    key: DataKey,
    salt: [u8; SALT_SIZE],
    chunk_size: u32,
    next_index: u32,
    finished: bool,
}

impl ChunkOpener {
    pub(crate) fn new(key: DataKey, salt: [u8; SALT_SIZE], chunk_size: u32) -> Self {
        Self {
            key,
            salt,
            chunk_size,
            next_index: 0,
            finished: false,
        }
    }

    /// True once the terminal chunk has been opened.
    pub(crate) fn finished(&self) -> bool {
        self.finished
    }

    /// Reads, validates, and decrypts the next frame.
    ///
    /// # Returns
    /// The chunk plaintext and whether it was the terminal chunk.
    pub(crate) fn open_next<R: Read>(&mut self, source: &mut R) -> Result<(Vec<u8>, bool)> {
        if self.finished {
            return Err(EnvelopeError::AlreadyClosed);
        }

        let mut word_bytes = [0u8; 4];
        read_frame_bytes(source, &mut word_bytes)?;
        let word = u32::from_be_bytes(word_bytes);

        let terminal = word & TERMINAL_BIT != 0;
        let len = (word & !TERMINAL_BIT) as usize;
        let full_len = self.chunk_size as usize + TAG_SIZE;

        if len < TAG_SIZE {
            return Err(EnvelopeError::MalformedChunk(
                "frame shorter than the tag".to_string(),
            ));
        }
        if len > full_len {
            return Err(EnvelopeError::MalformedChunk(
                "frame exceeds chunk size".to_string(),
            ));
        }
        if !terminal {
            if len != full_len {
                return Err(EnvelopeError::MalformedChunk(
                    "non-terminal chunk not full".to_string(),
                ));
            }
            if self.next_index == u32::MAX {
                return Err(EnvelopeError::Primitive("chunk counter overflow"));
            }
        }

        let mut ciphertext = vec![0u8; len];
        read_frame_bytes(source, &mut ciphertext)?;

        let index = self.next_index;
        let nonce = chunk_nonce(&self.salt, index, terminal);
        let aad = chunk_aad(&self.salt, index, terminal);
        let plaintext = decrypt_chacha20poly1305(self.key.as_bytes(), &nonce, &ciphertext, &aad)
            .map_err(|_| EnvelopeError::AuthenticationFailure)?;

        if terminal {
            self.finished = true;
        } else {
            self.next_index = index + 1;
        }

        trace!(index, terminal, plaintext_len = plaintext.len(), "opened chunk");
        Ok((plaintext, terminal))
    }
}

fn read_frame_bytes<R: Read>(source: &mut R, buf: &mut [u8]) -> Result<()> {
    source.read_exact(buf).map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            EnvelopeError::UnexpectedEof
        } else {
            EnvelopeError::Io(e)
        }
    })
}
