//! Per-recipient data-key wrapping.
//!
//! The encryptor performs one X25519 exchange per recipient between its
//! ephemeral key and the recipient's public key, derives a wrap key
//! `BLAKE3(shared ‖ ephemeral_pk ‖ recipient_pk ‖ info)`, and encrypts the
//! data key under it. The wrap AEAD uses a fixed all-zero nonce: the wrap
//! key is unique per (envelope, recipient) because the ephemeral key is
//! fresh per envelope.
//!
//! Unwrapping computes the shared secret once and trial-decrypts the
//! wrapped records in header order; a valid tag signals the match.

use std::fmt;

use cachet_core::crypto::{
    decrypt_chacha20poly1305, encrypt_chacha20poly1305, Blake3Hasher, KEY_SIZE, NONCE_SIZE,
};
use cachet_core::keys::{AgreementPublic, AgreementSecret};
use rand::{rngs::OsRng, RngCore};
use zeroize::{Zeroize, Zeroizing};

use crate::error::{EnvelopeError, Result};
use crate::header::WrappedKey;

/// Domain separator for wrap-key derivation.
const WRAP_INFO: &[u8] = b"cachet/v1/wrap";

/// Fixed wrap nonce; safe because every wrap key is single-use.
const WRAP_NONCE: [u8; NONCE_SIZE] = [0u8; NONCE_SIZE];

/// The per-envelope symmetric data key. Zeroized on drop.
pub(crate) struct DataKey([u8; KEY_SIZE]);

impl DataKey {
    /// Generates a fresh data key from the OS entropy source.
    pub(crate) fn generate() -> Self {
        let mut bytes = [0u8; KEY_SIZE];
        OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub(crate) fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }

    pub(crate) fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }
}

impl fmt::Debug for DataKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DataKey([REDACTED])")
    }
}

impl Drop for DataKey {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

fn derive_wrap_key(
    shared: &[u8; 32],
    ephemeral_pk: &AgreementPublic,
    recipient_pk: &AgreementPublic,
) -> Zeroizing<[u8; 32]> {
    let mut hasher = Blake3Hasher::new();
    hasher.update(shared);
    hasher.update(ephemeral_pk.as_bytes());
    hasher.update(recipient_pk.as_bytes());
    hasher.update(WRAP_INFO);
    Zeroizing::new(hasher.finalize())
}

/// Wraps the data key for one recipient.
pub(crate) fn wrap_data_key(
    ephemeral: &AgreementSecret,
    recipient: &AgreementPublic,
    data_key: &DataKey,
) -> Result<WrappedKey> {
    let shared = Zeroizing::new(
        ephemeral
            .shared_secret(recipient)
            .map_err(|_| EnvelopeError::InvalidKey)?,
    );
    let wrap_key = derive_wrap_key(&shared, &ephemeral.public(), recipient);

    let d_key = encrypt_chacha20poly1305(&wrap_key[..], &WRAP_NONCE, data_key.as_bytes(), &[])
        .map_err(|_| EnvelopeError::Primitive("data key wrap failed"))?;

    Ok(WrappedKey { d_key })
}

/// Recovers the data key by trial-decrypting the wrapped records.
pub(crate) fn unwrap_data_key(
    secret: &AgreementSecret,
    ephemeral_pk: &[u8; 32],
    wrapped_keys: &[WrappedKey],
) -> Result<DataKey> {
    let ephemeral_pk = AgreementPublic::new(*ephemeral_pk);
    let shared = Zeroizing::new(
        secret
            .shared_secret(&ephemeral_pk)
            .map_err(|_| EnvelopeError::InvalidKey)?,
    );
    let wrap_key = derive_wrap_key(&shared, &ephemeral_pk, &secret.public());

    for wrapped in wrapped_keys {
        if let Ok(mut plaintext) =
            decrypt_chacha20poly1305(&wrap_key[..], &WRAP_NONCE, &wrapped.d_key, &[])
        {
            if plaintext.len() == KEY_SIZE {
                let mut key = [0u8; KEY_SIZE];
                key.copy_from_slice(&plaintext);
                plaintext.zeroize();
                return Ok(DataKey::from_bytes(key));
            }
            plaintext.zeroize();
        }
    }

    Err(EnvelopeError::NoMatchingRecipient)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    #[test]
    fn test_wrap_unwrap_roundtrip() {
        let recipient = AgreementSecret::random();
        let ephemeral = AgreementSecret::random();
        let data_key = DataKey::generate();

        let wrapped = wrap_data_key(&ephemeral, &recipient.public(), &data_key).unwrap();
        assert_eq!(wrapped.d_key.len(), crate::WRAPPED_KEY_LEN);

        let unwrapped = unwrap_data_key(
            &recipient,
            ephemeral.public().as_bytes(),
            std::slice::from_ref(&wrapped),
        )
        .unwrap();
        assert_eq!(unwrapped.as_bytes(), data_key.as_bytes());
    }

    #[test]
    fn test_unwrap_wrong_recipient() {
        let recipient = AgreementSecret::random();
        let intruder = AgreementSecret::random();
        let ephemeral = AgreementSecret::random();
        let data_key = DataKey::generate();

        let wrapped = wrap_data_key(&ephemeral, &recipient.public(), &data_key).unwrap();
        let err = unwrap_data_key(
            &intruder,
            ephemeral.public().as_bytes(),
            std::slice::from_ref(&wrapped),
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NoMatchingRecipient);
    }

    #[test]
    fn test_every_recipient_unwraps_same_key() {
        let recipients: Vec<AgreementSecret> =
            (0..4).map(|_| AgreementSecret::random()).collect();
        let ephemeral = AgreementSecret::random();
        let data_key = DataKey::generate();

        let wrapped: Vec<WrappedKey> = recipients
            .iter()
            .map(|r| wrap_data_key(&ephemeral, &r.public(), &data_key).unwrap())
            .collect();

        for recipient in &recipients {
            let unwrapped =
                unwrap_data_key(recipient, ephemeral.public().as_bytes(), &wrapped).unwrap();
            assert_eq!(unwrapped.as_bytes(), data_key.as_bytes());
        }
    }

    #[test]
    fn test_wrap_differs_per_recipient() {
        let a = AgreementSecret::random();
        let b = AgreementSecret::random();
        let ephemeral = AgreementSecret::random();
        let data_key = DataKey::generate();

        let wrapped_a = wrap_data_key(&ephemeral, &a.public(), &data_key).unwrap();
        let wrapped_b = wrap_data_key(&ephemeral, &b.public(), &data_key).unwrap();
        assert_ne!(wrapped_a.d_key, wrapped_b.d_key);
    }

    #[test]
    fn test_low_order_ephemeral_rejected() {
        let recipient = AgreementSecret::random();
        let wrapped = WrappedKey {
            d_key: vec![0u8; crate::WRAPPED_KEY_LEN],
        };

        let err =
            unwrap_data_key(&recipient, &[0u8; 32], std::slice::from_ref(&wrapped)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidKey);
    }
}
