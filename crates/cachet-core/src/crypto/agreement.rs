//! X25519 key agreement (RFC 7748).
//!
//! The envelope derives a per-recipient wrap key from the shared secret
//! between the encryptor's ephemeral key and the recipient's public key.

use rand::rngs::OsRng;
use thiserror::Error;
use x25519_dalek::{PublicKey, StaticSecret};

/// Errors that can occur during key agreement.
#[derive(Debug, Error)]
pub enum AgreementError {
    /// The shared secret was the all-zero point output, meaning the peer
    /// key was a low-order point and contributed nothing to the exchange.
    #[error("Non-contributory X25519 public key")]
    NonContributory,
}

/// Generates a fresh X25519 keypair from the OS entropy source.
///
/// # Returns
/// `(secret, public)` as raw 32-byte values
pub fn generate_agreement_keypair() -> ([u8; 32], [u8; 32]) {
    let secret = StaticSecret::random_from_rng(OsRng);
    let public = PublicKey::from(&secret);
    (secret.to_bytes(), public.to_bytes())
}

/// Derives the X25519 public key for a secret key.
pub fn derive_agreement_public(secret: &[u8; 32]) -> [u8; 32] {
    PublicKey::from(&StaticSecret::from(*secret)).to_bytes()
}

/// Computes the X25519 shared secret between a secret key and a peer
/// public key.
///
/// Rejects exchanges where the peer key is a low-order point; the
/// resulting all-zero secret would be attacker-predictable.
pub fn x25519_shared_secret(
    secret: &[u8; 32],
    public: &[u8; 32],
) -> Result<[u8; 32], AgreementError> {
    let shared = StaticSecret::from(*secret).diffie_hellman(&PublicKey::from(*public));
    if !shared.was_contributory() {
        return Err(AgreementError::NonContributory);
    }
    Ok(shared.to_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shared_secret_agreement() {
        let (a_secret, a_public) = generate_agreement_keypair();
        let (b_secret, b_public) = generate_agreement_keypair();

        let ab = x25519_shared_secret(&a_secret, &b_public).unwrap();
        let ba = x25519_shared_secret(&b_secret, &a_public).unwrap();

        assert_eq!(ab, ba, "both sides must agree on the shared secret");
    }

    #[test]
    fn test_different_peers_different_secrets() {
        let (a_secret, _) = generate_agreement_keypair();
        let (_, b_public) = generate_agreement_keypair();
        let (_, c_public) = generate_agreement_keypair();

        let ab = x25519_shared_secret(&a_secret, &b_public).unwrap();
        let ac = x25519_shared_secret(&a_secret, &c_public).unwrap();

        assert_ne!(ab, ac);
    }

    #[test]
    fn test_derive_public_matches_generate() {
        let (secret, public) = generate_agreement_keypair();
        assert_eq!(derive_agreement_public(&secret), public);
    }

    #[test]
    fn test_low_order_point_rejected() {
        let (secret, _) = generate_agreement_keypair();
        // The identity element is the canonical low-order point.
        let result = x25519_shared_secret(&secret, &[0u8; 32]);
        assert!(matches!(result, Err(AgreementError::NonContributory)));
    }
}
