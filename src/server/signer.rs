//! Detached signatures over disclosure payloads.

use std::sync::Arc;

use bytes::Bytes;

use crate::common::RpcResult;
use crate::store::KeyStore;

#[derive(Debug, Clone)]
/// Wraps serialized payloads into [RpcResult::OkSigned] using the node's [KeyStore].
pub struct ResponseSigner {
    keys: Arc<dyn KeyStore>,
}

impl ResponseSigner {
    pub fn new(keys: Arc<dyn KeyStore>) -> Self {
        Self { keys }
    }

    /// The public key responses signed by this signer verify with.
    pub fn public_key(&self) -> [u8; 32] {
        self.keys.public_key()
    }

    /// Sign exactly `payload`.
    pub fn sign(&self, payload: impl Into<Bytes>) -> RpcResult {
        let payload: Bytes = payload.into();
        let signature = self.keys.sign(&payload);

        RpcResult::OkSigned { payload, signature }
    }

    pub(crate) fn keys(&self) -> &Arc<dyn KeyStore> {
        &self.keys
    }
}

#[cfg(test)]
mod test {
    use crate::store::Ed25519KeyStore;

    use super::*;

    #[test]
    fn signature_covers_exact_payload() {
        let signer = ResponseSigner::new(Arc::new(Ed25519KeyStore::random()));
        let result = signer.sign(b"d4:name5:Alicee".to_vec());

        assert!(result.verify(&signer.public_key()));

        let RpcResult::OkSigned { payload, signature } = result else {
            panic!("expected a signed result");
        };

        for bit in 0..payload.len() * 8 {
            let mut flipped = payload.to_vec();
            flipped[bit / 8] ^= 1 << (bit % 8);

            let tampered = RpcResult::OkSigned {
                payload: flipped.into(),
                signature,
            };
            assert!(!tampered.verify(&signer.public_key()), "bit {bit}");
        }
    }
}
