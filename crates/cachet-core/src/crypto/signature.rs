//! Ed25519 signatures (RFC 8032 pure mode).
//!
//! Used to authenticate the envelope header as coming from a named sender.

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use thiserror::Error;

use super::SIGNATURE_SIZE;

/// Errors that can occur during signature operations.
#[derive(Debug, Error)]
pub enum SignatureError {
    /// The public key bytes do not decode to a valid curve point.
    #[error("Invalid Ed25519 public key")]
    InvalidPublicKey,

    /// The signature does not verify for the given key and message.
    #[error("Signature verification failed")]
    VerificationFailed,
}

/// Generates a fresh Ed25519 keypair from the OS entropy source.
///
/// # Returns
/// `(secret, public)` as raw 32-byte values
pub fn generate_signing_keypair() -> ([u8; 32], [u8; 32]) {
    let signing = SigningKey::generate(&mut OsRng);
    let public = signing.verifying_key().to_bytes();
    (signing.to_bytes(), public)
}

/// Derives the Ed25519 public key for a secret key.
pub fn derive_verifying_key(secret: &[u8; 32]) -> [u8; 32] {
    SigningKey::from_bytes(secret).verifying_key().to_bytes()
}

/// Signs a message with an Ed25519 secret key.
pub fn sign_ed25519(secret: &[u8; 32], message: &[u8]) -> [u8; SIGNATURE_SIZE] {
    SigningKey::from_bytes(secret).sign(message).to_bytes()
}

/// Verifies an Ed25519 signature.
pub fn verify_ed25519(
    public: &[u8; 32],
    message: &[u8],
    signature: &[u8; SIGNATURE_SIZE],
) -> Result<(), SignatureError> {
    let key = VerifyingKey::from_bytes(public).map_err(|_| SignatureError::InvalidPublicKey)?;
    key.verify(message, &Signature::from_bytes(signature))
        .map_err(|_| SignatureError::VerificationFailed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_verify_roundtrip() {
        let (secret, public) = generate_signing_keypair();
        let message = b"cachet header digest";

        let signature = sign_ed25519(&secret, message);
        assert!(verify_ed25519(&public, message, &signature).is_ok());
    }

    #[test]
    fn test_signatures_deterministic() {
        let (secret, _) = generate_signing_keypair();
        let message = b"cachet header digest";

        assert_eq!(sign_ed25519(&secret, message), sign_ed25519(&secret, message));
    }

    #[test]
    fn test_wrong_message_fails() {
        let (secret, public) = generate_signing_keypair();

        let signature = sign_ed25519(&secret, b"original");
        let result = verify_ed25519(&public, b"tampered", &signature);
        assert!(matches!(result, Err(SignatureError::VerificationFailed)));
    }

    #[test]
    fn test_wrong_key_fails() {
        let (secret, _) = generate_signing_keypair();
        let (_, other_public) = generate_signing_keypair();

        let signature = sign_ed25519(&secret, b"message");
        let result = verify_ed25519(&other_public, b"message", &signature);
        assert!(matches!(result, Err(SignatureError::VerificationFailed)));
    }

    #[test]
    fn test_derive_verifying_key_matches_generate() {
        let (secret, public) = generate_signing_keypair();
        assert_eq!(derive_verifying_key(&secret), public);
    }
}
