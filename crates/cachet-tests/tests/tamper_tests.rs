//! Corruption, truncation, and reordering detection.
//!
//! An envelope must never decrypt to wrong plaintext. Every single-byte
//! mutation, every truncation, and every frame reorder has to surface as
//! a structured error.

use cachet_core::crypto::TAG_SIZE;
use cachet_core::keys::Keypair;
use cachet_envelope::{ErrorKind, MIN_CHUNK_SIZE};
use cachet_tests::{open_envelope, patterned, seal_envelope, walk_frames};

// ============================================================================
// Single-Byte Mutations
// ============================================================================

/// Flipping any byte of an envelope must fail decryption with one of the
/// tamper-class errors, and never succeed or produce wrong plaintext.
#[test]
fn test_every_byte_flip_detected() {
    let receiver = Keypair::generate();
    let payload = patterned(10 * MIN_CHUNK_SIZE as usize);
    let envelope = seal_envelope(
        &payload,
        &[receiver.agreement_public()],
        None,
        MIN_CHUNK_SIZE,
    );

    for offset in 0..envelope.len() {
        let mut corrupted = envelope.clone();
        corrupted[offset] ^= 0xFF;

        let err = open_envelope(&corrupted, &receiver.agreement, None)
            .expect_err(&format!("flip at offset {} must not decrypt", offset));
        assert!(
            matches!(
                err.kind(),
                ErrorKind::MalformedHeader
                    | ErrorKind::NoMatchingRecipient
                    | ErrorKind::AuthenticationFailure
                    | ErrorKind::MalformedChunk
                    | ErrorKind::TrailingGarbage
                    | ErrorKind::UnexpectedEof
            ),
            "flip at offset {} produced unexpected error {:?}",
            offset,
            err
        );
    }
}

/// Mass corruption (the whole stream randomized) must fail, usually
/// already at header parse.
#[test]
fn test_randomized_envelope_rejected() {
    use rand::RngCore;

    let receiver = Keypair::generate();
    let payload = patterned(23 * MIN_CHUNK_SIZE as usize + 311);
    let mut envelope = seal_envelope(
        &payload,
        &[receiver.agreement_public()],
        None,
        MIN_CHUNK_SIZE,
    );

    rand::thread_rng().fill_bytes(&mut envelope);
    assert!(open_envelope(&envelope, &receiver.agreement, None).is_err());
}

// ============================================================================
// Truncation
// ============================================================================

/// Removing any suffix of an envelope must be detected. Cuts inside the
/// header fail header parsing; cuts in the chunk stream surface as EOF.
#[test]
fn test_every_truncation_detected() {
    let receiver = Keypair::generate();
    let payload = patterned(2 * MIN_CHUNK_SIZE as usize + 17);
    let envelope = seal_envelope(
        &payload,
        &[receiver.agreement_public()],
        None,
        MIN_CHUNK_SIZE,
    );

    for keep in 0..envelope.len() {
        let err = open_envelope(&envelope[..keep], &receiver.agreement, None)
            .expect_err(&format!("truncation to {} bytes must not decrypt", keep));
        assert!(
            matches!(
                err.kind(),
                ErrorKind::UnexpectedEof
                    | ErrorKind::AuthenticationFailure
                    | ErrorKind::MalformedHeader
            ),
            "truncation to {} bytes produced unexpected error {:?}",
            keep,
            err
        );
    }
}

/// A writer dropped without close leaves no terminal chunk; the decryptor
/// reports the stream as truncated.
#[test]
fn test_abandoned_writer_leaves_truncated_envelope() {
    use cachet_envelope::Encryptor;

    let receiver = Keypair::generate();
    let mut sink = Vec::new();
    {
        let mut encryptor = Encryptor::new(None, MIN_CHUNK_SIZE).unwrap();
        encryptor.add_recipient(&receiver.agreement_public()).unwrap();
        let mut writer = encryptor.stream_writer(&mut sink).unwrap();
        writer.write(&patterned(MIN_CHUNK_SIZE as usize)).unwrap();
        // Dropped without close: no terminal chunk is ever emitted.
    }

    let err = open_envelope(&sink, &receiver.agreement, None).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnexpectedEof);
}

// ============================================================================
// Trailing Bytes and Reordering
// ============================================================================

#[test]
fn test_trailing_garbage_detected() {
    let receiver = Keypair::generate();
    let payload = patterned(MIN_CHUNK_SIZE as usize + 5);
    let mut envelope = seal_envelope(
        &payload,
        &[receiver.agreement_public()],
        None,
        MIN_CHUNK_SIZE,
    );
    envelope.push(0x00);

    let err = open_envelope(&envelope, &receiver.agreement, None).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TrailingGarbage);
}

#[test]
fn test_swapped_frames_detected() {
    let receiver = Keypair::generate();
    let payload = patterned(3 * MIN_CHUNK_SIZE as usize);
    let envelope = seal_envelope(
        &payload,
        &[receiver.agreement_public()],
        None,
        MIN_CHUNK_SIZE,
    );

    let layout = walk_frames(&envelope);
    let frame_len = 4 + MIN_CHUNK_SIZE as usize + TAG_SIZE;
    let chunks_at = 8 + layout.header_len;

    // Swap the first two (equal-sized) non-terminal frames.
    let mut swapped = envelope.clone();
    let (first, second) = (chunks_at, chunks_at + frame_len);
    for i in 0..frame_len {
        swapped.swap(first + i, second + i);
    }

    let err = open_envelope(&swapped, &receiver.agreement, None).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AuthenticationFailure);
}

#[test]
fn test_duplicated_frame_detected() {
    let receiver = Keypair::generate();
    let payload = patterned(2 * MIN_CHUNK_SIZE as usize);
    let envelope = seal_envelope(
        &payload,
        &[receiver.agreement_public()],
        None,
        MIN_CHUNK_SIZE,
    );

    let layout = walk_frames(&envelope);
    let frame_len = 4 + MIN_CHUNK_SIZE as usize + TAG_SIZE;
    let chunks_at = 8 + layout.header_len;

    // Replay the first frame in place of the second.
    let mut replayed = envelope.clone();
    let first_frame = envelope[chunks_at..chunks_at + frame_len].to_vec();
    replayed[chunks_at + frame_len..chunks_at + 2 * frame_len].copy_from_slice(&first_frame);

    let err = open_envelope(&replayed, &receiver.agreement, None).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AuthenticationFailure);
}

/// Splicing the chunk stream of one envelope under the header of another
/// must fail: the data key and salt differ per envelope.
#[test]
fn test_cross_envelope_splice_detected() {
    let receiver = Keypair::generate();
    let payload = patterned(MIN_CHUNK_SIZE as usize + 9);

    let a = seal_envelope(&payload, &[receiver.agreement_public()], None, MIN_CHUNK_SIZE);
    let b = seal_envelope(&payload, &[receiver.agreement_public()], None, MIN_CHUNK_SIZE);

    let a_layout = walk_frames(&a);
    let b_layout = walk_frames(&b);

    let mut spliced = a[..8 + a_layout.header_len].to_vec();
    spliced.extend_from_slice(&b[8 + b_layout.header_len..]);

    let err = open_envelope(&spliced, &receiver.agreement, None).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AuthenticationFailure);
}
