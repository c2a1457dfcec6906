//! Key types for envelope encryption.
//!
//! Defines the agreement (X25519) and signing (Ed25519) key handles the
//! envelope engine consumes. Secret material is zeroized on drop and never
//! printed by `Debug`.

use std::fmt;

use zeroize::Zeroize;

use crate::crypto::{
    derive_agreement_public, derive_verifying_key, generate_agreement_keypair,
    generate_signing_keypair, sign_ed25519, verify_ed25519, x25519_shared_secret, AgreementError,
    SignatureError, SIGNATURE_SIZE,
};

/// X25519 secret key for key agreement.
#[derive(Clone)]
pub struct AgreementSecret([u8; 32]);

impl AgreementSecret {
    /// Creates an agreement secret from raw bytes.
    pub fn from_bytes(bytes: &[u8; 32]) -> Self {
        Self(*bytes)
    }

    /// Generates a random agreement secret.
    pub fn random() -> Self {
        let (secret, _) = generate_agreement_keypair();
        Self(secret)
    }

    /// Derives the matching public key.
    pub fn public(&self) -> AgreementPublic {
        AgreementPublic(derive_agreement_public(&self.0))
    }

    /// Computes the X25519 shared secret with a peer public key.
    pub fn shared_secret(&self, peer: &AgreementPublic) -> Result<[u8; 32], AgreementError> {
        x25519_shared_secret(&self.0, &peer.0)
    }
}

impl fmt::Debug for AgreementSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AgreementSecret([REDACTED])")
    }
}

/// Zeroizes the key on drop for security.
impl Drop for AgreementSecret {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

/// X25519 public key for key agreement.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct AgreementPublic([u8; 32]);

impl AgreementPublic {
    /// Creates a public key from raw bytes.
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Returns the inner bytes.
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Returns as a hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for AgreementPublic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AgreementPublic({})", self.to_hex())
    }
}

impl fmt::Display for AgreementPublic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl From<[u8; 32]> for AgreementPublic {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

/// Ed25519 signing key for sender authentication.
#[derive(Clone)]
pub struct SigningKey([u8; 32]);

impl SigningKey {
    /// Creates a signing key from raw bytes.
    pub fn from_bytes(bytes: &[u8; 32]) -> Self {
        Self(*bytes)
    }

    /// Generates a random signing key.
    pub fn random() -> Self {
        let (secret, _) = generate_signing_keypair();
        Self(secret)
    }

    /// Derives the matching public key.
    pub fn public_key(&self) -> VerifyingPublic {
        VerifyingPublic(derive_verifying_key(&self.0))
    }

    /// Signs a message.
    pub fn sign(&self, message: &[u8]) -> [u8; SIGNATURE_SIZE] {
        sign_ed25519(&self.0, message)
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SigningKey([REDACTED])")
    }
}

impl PartialEq for SigningKey {
    fn eq(&self, other: &Self) -> bool {
        // Constant-time comparison
        let mut diff = 0u8;
        for (a, b) in self.0.iter().zip(other.0.iter()) {
            diff |= a ^ b;
        }
        diff == 0
    }
}

impl Eq for SigningKey {}

/// Zeroizes the key on drop for security.
impl Drop for SigningKey {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

/// Ed25519 public key for verifying sender signatures.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct VerifyingPublic([u8; 32]);

impl VerifyingPublic {
    /// Creates a public key from raw bytes.
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Returns the inner bytes.
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Returns as a hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Verifies a signature over a message.
    pub fn verify(
        &self,
        message: &[u8],
        signature: &[u8; SIGNATURE_SIZE],
    ) -> Result<(), SignatureError> {
        verify_ed25519(&self.0, message, signature)
    }
}

impl fmt::Debug for VerifyingPublic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VerifyingPublic({})", self.to_hex())
    }
}

impl fmt::Display for VerifyingPublic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl From<[u8; 32]> for VerifyingPublic {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

/// A user identity: an Ed25519 signing keypair and an X25519 agreement
/// keypair.
pub struct Keypair {
    /// Signing half of the identity.
    pub signing: SigningKey,
    /// Agreement half of the identity.
    pub agreement: AgreementSecret,
}

impl Keypair {
    /// Generates a fresh identity from the OS entropy source.
    pub fn generate() -> Self {
        Self {
            signing: SigningKey::random(),
            agreement: AgreementSecret::random(),
        }
    }

    /// Returns the signing public key.
    pub fn signing_public(&self) -> VerifyingPublic {
        self.signing.public_key()
    }

    /// Returns the agreement public key.
    pub fn agreement_public(&self) -> AgreementPublic {
        self.agreement.public()
    }
}

impl fmt::Debug for Keypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Keypair")
            .field("signing_public", &self.signing_public().to_hex())
            .field("agreement_public", &self.agreement_public().to_hex())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agreement_roundtrip() {
        let alice = AgreementSecret::random();
        let bob = AgreementSecret::random();

        let ab = alice.shared_secret(&bob.public()).unwrap();
        let ba = bob.shared_secret(&alice.public()).unwrap();
        assert_eq!(ab, ba);
    }

    #[test]
    fn test_signing_key_sign_verify() {
        let key = SigningKey::random();
        let message = b"Hello, cachet!";

        let signature = key.sign(message);
        assert!(key.public_key().verify(message, &signature).is_ok());
    }

    #[test]
    fn test_secret_debug_redacted() {
        let agreement = AgreementSecret::random();
        let signing = SigningKey::random();

        assert!(format!("{:?}", agreement).contains("REDACTED"));
        assert!(format!("{:?}", signing).contains("REDACTED"));
    }

    #[test]
    fn test_public_keys_display_as_hex() {
        let keypair = Keypair::generate();

        assert_eq!(
            format!("{}", keypair.agreement_public()),
            keypair.agreement_public().to_hex()
        );
        assert_eq!(
            format!("{}", keypair.signing_public()),
            keypair.signing_public().to_hex()
        );
    }

    #[test]
    fn test_keypair_publics_are_stable() {
        let keypair = Keypair::generate();
        assert_eq!(keypair.signing_public(), keypair.signing.public_key());
        assert_eq!(keypair.agreement_public(), keypair.agreement.public());
    }

    #[test]
    fn test_signing_key_equality_constant_time() {
        let key1 = SigningKey::from_bytes(&[0x42; 32]);
        let key2 = SigningKey::from_bytes(&[0x42; 32]);
        let key3 = SigningKey::from_bytes(&[0x43; 32]);

        assert_eq!(key1, key2);
        assert_ne!(key1, key3);
    }
}
