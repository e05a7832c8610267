//! The nonce-signed request envelope (spec §6): "All calls except
//! `pool_status` are authenticated: request envelope carries a caller
//! NodeID, a strictly-increasing nonce, and a signature covering
//! `(method, nonce, params)` by the NodeID's private key. Nonce
//! verification precedes dispatch."
//!
//! Only the envelope's verification contract is implemented here; the
//! transport that carries it (HTTP/WebSocket) is out of scope.

use alloy_primitives::{Address, Signature};
use pool_primitives::NodeId;
use pool_store::{Store, StoreError};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("malformed signature: {0}")]
    MalformedSignature(String),
    #[error("signature does not recover to the claimed NodeID")]
    SignatureMismatch,
    #[error("claimed NodeID {0} is not a valid address")]
    MalformedNodeId(NodeId),
    #[error(transparent)]
    StaleNonce(#[from] StoreError),
}

/// Verifies the envelope and records the nonce, in that order, so a
/// forged signature never advances a NodeID's nonce counter.
pub struct RequestAuthenticator<S> {
    store: Arc<S>,
}

impl<S: Store> RequestAuthenticator<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// `message` is the exact byte encoding of `(method, nonce, params)`
    /// the caller signed; callers are expected to use a stable encoding
    /// (e.g. `method || be_bytes(nonce) || params_json`) on both ends.
    pub fn authenticate(
        &self,
        caller: &NodeId,
        nonce: u64,
        message: &[u8],
        signature_hex: &str,
    ) -> Result<(), AuthError> {
        let expected: Address = caller
            .as_str()
            .trim_start_matches("0x")
            .parse()
            .map_err(|_| AuthError::MalformedNodeId(caller.clone()))?;

        let sig_bytes = hex::decode(signature_hex.trim_start_matches("0x"))
            .map_err(|e| AuthError::MalformedSignature(e.to_string()))?;
        let signature = Signature::try_from(sig_bytes.as_slice())
            .map_err(|e| AuthError::MalformedSignature(e.to_string()))?;

        let recovered = signature
            .recover_address_from_msg(message)
            .map_err(|e| AuthError::MalformedSignature(e.to_string()))?;
        if recovered != expected {
            return Err(AuthError::SignatureMismatch);
        }

        self.store
            .check_and_save_nonce(caller, nonce)
            .map_err(AuthError::StaleNonce)
    }

    /// Canonical `(method, nonce, params)` encoding used on both the
    /// signing and the verifying side.
    pub fn signing_message(method: &str, nonce: u64, params: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(method.len() + 8 + params.len());
        out.extend_from_slice(method.as_bytes());
        out.extend_from_slice(&nonce.to_be_bytes());
        out.extend_from_slice(params);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_signer::SignerSync;
    use alloy_signer_local::LocalSigner;
    use pool_store::MemoryStore;

    fn signed_envelope(signer: &LocalSigner<alloy_signer::k256::ecdsa::SigningKey>, method: &str, nonce: u64, params: &[u8]) -> (NodeId, String) {
        let message = RequestAuthenticator::<MemoryStore>::signing_message(method, nonce, params);
        let signature = signer.sign_message_sync(&message).unwrap();
        let node_id = NodeId::new(signer.address().to_string());
        (node_id, hex::encode(signature.as_bytes()))
    }

    #[test]
    fn valid_signature_and_fresh_nonce_succeeds() {
        let signer = LocalSigner::random();
        let store = Arc::new(MemoryStore::new());
        let auth = RequestAuthenticator::new(store);

        let (node_id, sig_hex) = signed_envelope(&signer, "vipnode_update", 1, b"{}");
        let message = RequestAuthenticator::<MemoryStore>::signing_message("vipnode_update", 1, b"{}");
        auth.authenticate(&node_id, 1, &message, &sig_hex).unwrap();
    }

    #[test]
    fn stale_nonce_is_rejected_even_with_a_valid_signature() {
        let signer = LocalSigner::random();
        let store = Arc::new(MemoryStore::new());
        let auth = RequestAuthenticator::new(store);

        let (node_id, sig_hex) = signed_envelope(&signer, "vipnode_update", 5, b"{}");
        let message = RequestAuthenticator::<MemoryStore>::signing_message("vipnode_update", 5, b"{}");
        auth.authenticate(&node_id, 5, &message, &sig_hex).unwrap();

        let (node_id2, sig_hex2) = signed_envelope(&signer, "vipnode_update", 5, b"{}");
        let err = auth.authenticate(&node_id2, 5, &message, &sig_hex2).unwrap_err();
        assert!(matches!(err, AuthError::StaleNonce(_)));
    }

    #[test]
    fn signature_from_a_different_key_is_rejected() {
        let signer = LocalSigner::random();
        let impostor = LocalSigner::random();
        let store = Arc::new(MemoryStore::new());
        let auth = RequestAuthenticator::new(store);

        let claimed_id = NodeId::new(signer.address().to_string());
        let message = RequestAuthenticator::<MemoryStore>::signing_message("vipnode_update", 1, b"{}");
        let signature = impostor.sign_message_sync(&message).unwrap();

        let err = auth
            .authenticate(&claimed_id, 1, &message, &hex::encode(signature.as_bytes()))
            .unwrap_err();
        assert!(matches!(err, AuthError::SignatureMismatch));
    }
}
