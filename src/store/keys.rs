//! Ed25519 [KeyStore].

use std::fmt::{self, Debug, Formatter};

use ed25519_dalek::{Signer, SigningKey};
use rand::Rng;

use crate::common::{verify_signature, SIGNATURE_SIZE};

use super::KeyStore;

/// [KeyStore] holding an ed25519 signing key in memory.
pub struct Ed25519KeyStore {
    signing_key: SigningKey,
}

impl Debug for Ed25519KeyStore {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "Ed25519KeyStore({:?})", self.signing_key.verifying_key())
    }
}

impl Ed25519KeyStore {
    pub fn new(signing_key: SigningKey) -> Self {
        Self { signing_key }
    }

    /// Generate a fresh random identity.
    pub fn random() -> Self {
        let secret: [u8; 32] = rand::thread_rng().gen();

        Self::new(SigningKey::from_bytes(&secret))
    }
}

impl KeyStore for Ed25519KeyStore {
    fn public_key(&self) -> [u8; 32] {
        self.signing_key.verifying_key().to_bytes()
    }

    fn sign(&self, message: &[u8]) -> [u8; SIGNATURE_SIZE] {
        self.signing_key.sign(message).to_bytes()
    }

    fn verify(&self, public_key: &[u8; 32], message: &[u8], signature: &[u8]) -> bool {
        verify_signature(public_key, message, signature)
    }
}

#[cfg(test)]
mod test {
    use crate::Id;

    use super::*;

    #[test]
    fn sign_and_verify() {
        let keys = Ed25519KeyStore::random();
        let signature = keys.sign(b"listing");

        assert!(keys.verify(&keys.public_key(), b"listing", &signature));
        assert!(!keys.verify(&keys.public_key(), b"listinh", &signature));
        assert!(!keys.verify(&keys.public_key(), b"listing", &signature[..63]));
        assert!(!keys.verify(
            &Ed25519KeyStore::random().public_key(),
            b"listing",
            &signature
        ));
    }

    #[test]
    fn id_is_bound_to_public_key() {
        let keys = Ed25519KeyStore::new(SigningKey::from_bytes(&[8; 32]));

        assert_eq!(keys.id(), Id::from_public_key(&keys.public_key()));
    }
}
