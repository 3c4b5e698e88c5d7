/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Cryptographic primitives.
//!
//! The definitions and re-exports in this module provide two categories of cryptographic primitives:
//! 1. **Cryptographic Hashes**: provided by the [`sha2`] crate.
//! 2. **Digital Signatures**: provided by the [`ed25519_dalek`] crate.

use borsh::BorshSerialize;

use crate::leader_change::messages::{CollectData, SignedCollect};

use super::data_types::{ReplicaId, SignatureBytes};

// re-exports below.
pub use sha2::Digest;
pub use sha2::Sha256 as CryptoHasher;

pub use ed25519_dalek::{Signature, SignatureError, Signer, SigningKey, Verifier, VerifyingKey};

/// A facade around [`SigningKey`] that implements methods for [`sign`](Self::sign)-ing messages, for
/// producing [`SignedCollect`]s, and a getter for the [`public`](Self::public) key associated with the
/// signing key.
#[derive(Clone)]
pub struct Keypair(pub(crate) SigningKey);

impl Keypair {
    /// Create a `Keypair` that wraps over `signing_key`.
    pub fn new(signing_key: SigningKey) -> Keypair {
        Keypair(signing_key)
    }

    /// Sign an arbitrary `message` with the `Keypair`.
    pub fn sign(&self, message: &[u8]) -> SignatureBytes {
        SignatureBytes::new(self.0.sign(message).to_bytes())
    }

    /// Serialize `collect` and sign the serialized bytes, claiming `collect.sender` as the signer.
    pub fn sign_collect(&self, collect: &CollectData) -> SignedCollect {
        // Serializing into a Vec cannot fail.
        let payload = collect.try_to_vec().unwrap_or_default();
        let signature = self.sign(&payload);
        SignedCollect::new(payload, signature, collect.sender)
    }

    /// Sign an arbitrary payload on behalf of `sender` without checking that the payload mentions
    /// `sender`.
    pub fn sign_payload(&self, payload: Vec<u8>, sender: ReplicaId) -> SignedCollect {
        let signature = self.sign(&payload);
        SignedCollect::new(payload, signature, sender)
    }

    /// Get the `VerifyingKey` of this `Keypair`.
    pub fn public(&self) -> VerifyingKey {
        self.0.verifying_key()
    }
}
