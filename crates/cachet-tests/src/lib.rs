//! Test support for the cachet envelope engine.
//!
//! Provides the helpers the scenario tests share: deterministic payloads,
//! one-call seal/open wrappers, and a frame walker for asserting on the
//! wire layout of an envelope.

#![deny(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

use cachet_core::keys::{AgreementPublic, AgreementSecret, SigningKey, VerifyingPublic};
use cachet_envelope::{Decryptor, Encryptor, EnvelopeError, MAGIC};

/// Installs a fmt tracing subscriber honoring `RUST_LOG`, once.
///
/// Safe to call from every test; later calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Builds a deterministic payload of the given length (`byte i = i & 0xff`).
pub fn patterned(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i & 0xff) as u8).collect()
}

/// Encrypts a payload into a fresh envelope in one call.
///
/// Panics on failure; test setup only.
pub fn seal_envelope(
    payload: &[u8],
    recipients: &[AgreementPublic],
    sender: Option<&SigningKey>,
    chunk_size: u32,
) -> Vec<u8> {
    let mut encryptor = Encryptor::new(sender, chunk_size).expect("chunk size in range");
    for recipient in recipients {
        encryptor.add_recipient(recipient).expect("configuring");
    }
    let mut envelope = Vec::new();
    encryptor
        .encrypt(&mut &payload[..], &mut envelope)
        .expect("encryption succeeds");
    envelope
}

/// Decrypts a complete envelope in one call.
pub fn open_envelope(
    envelope: &[u8],
    secret: &AgreementSecret,
    expected_sender: Option<&VerifyingPublic>,
) -> Result<Vec<u8>, EnvelopeError> {
    let mut decryptor = Decryptor::new(envelope)?;
    decryptor.set_private_key(secret, expected_sender)?;
    let mut plaintext = Vec::new();
    decryptor.decrypt(&mut plaintext)?;
    Ok(plaintext)
}

/// Structural summary of an envelope's wire layout.
pub struct EnvelopeLayout {
    /// Length of the encoded header record.
    pub header_len: usize,
    /// Number of non-terminal frames.
    pub non_terminal_frames: usize,
    /// Ciphertext length of the terminal frame.
    pub terminal_ciphertext_len: usize,
}

/// Walks an envelope's frames without decrypting, asserting the layout is
/// well formed: magic, length-framed header, frames back to back, exactly
/// one terminal frame in last position.
pub fn walk_frames(envelope: &[u8]) -> EnvelopeLayout {
    assert!(envelope.len() >= 8, "envelope shorter than its framing");
    assert_eq!(&envelope[..4], &MAGIC, "bad magic");

    let header_len =
        u32::from_be_bytes(envelope[4..8].try_into().expect("4 bytes")) as usize;
    let mut offset = 8 + header_len;
    assert!(offset <= envelope.len(), "header runs past the envelope");

    let mut non_terminal_frames = 0;
    loop {
        assert!(offset + 4 <= envelope.len(), "missing frame word");
        let word = u32::from_be_bytes(envelope[offset..offset + 4].try_into().expect("4 bytes"));
        let terminal = word & (1 << 31) != 0;
        let len = (word & !(1 << 31)) as usize;
        offset += 4 + len;
        assert!(offset <= envelope.len(), "frame runs past the envelope");

        if terminal {
            assert_eq!(offset, envelope.len(), "bytes after the terminal frame");
            return EnvelopeLayout {
                header_len,
                non_terminal_frames,
                terminal_ciphertext_len: len,
            };
        }
        non_terminal_frames += 1;
    }
}
