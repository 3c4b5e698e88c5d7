/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Traits for the collaborators that the leader-change component consumes, and default
//! implementations of them.
//!
//! | Trait | Default implementation | Backed by |
//! |---|---|---|
//! | [`SignatureVerifier`] | [`Ed25519Verifier`] | [`ed25519_dalek`] |
//! | [`Digester`] | [`Sha256Digester`] | [`sha2`] |
//! | [`ViewConfiguration`] | [`StaticView`] | constant `n` and `f` |

use std::collections::HashMap;

use crate::{
    leader_change::messages::{LastEidData, SignedCollect},
    types::{
        crypto_primitives::{CryptoHasher, Digest, Signature, Verifier, VerifyingKey},
        data_types::ReplicaId,
    },
};

/// Checks signed evidence against the replica that claims to have produced it.
pub trait SignatureVerifier {
    /// Check that `signed.signature` is a valid signature over `signed.payload` by `claimed_sender`.
    fn verify(&self, signed: &SignedCollect, claimed_sender: ReplicaId) -> bool;

    /// Check the proof attached to a replica's claim about its last decided consensus instance.
    ///
    /// # Incomplete
    ///
    /// The format of decision proofs is defined by the agreement protocol, which lives outside of
    /// this crate. The default implementation accepts every proof, which means that
    /// [`highest_last_eid`](crate::leader_change::LeaderChangeManager::highest_last_eid) and
    /// [`last_eid_value`](crate::leader_change::LeaderChangeManager::last_eid_value) trust the claimed
    /// execution id. Agreement protocols that produce verifiable proofs should override this method.
    fn verify_decision_proof(&self, _last_eid: &LastEidData) -> bool {
        true
    }
}

/// Deterministic content digest, used to compare write-set values by content.
pub trait Digester {
    fn digest(&self, bytes: &[u8]) -> Vec<u8>;
}

/// Source of the size of the current view (`n`) and the maximum number of Byzantine replicas it
/// tolerates (`f`).
///
/// Both may change across reconfigurations. The quorum predicates read them every time they are
/// evaluated.
pub trait ViewConfiguration {
    fn current_n(&self) -> usize;

    fn current_f(&self) -> usize;
}

/// [`SignatureVerifier`] over Ed25519 keys, one per replica.
#[derive(Clone, Default)]
pub struct Ed25519Verifier {
    keys: HashMap<ReplicaId, VerifyingKey>,
}

impl Ed25519Verifier {
    pub fn new() -> Self {
        Self {
            keys: HashMap::new(),
        }
    }

    /// Register (or replace) the verifying key of `replica`.
    pub fn insert(&mut self, replica: ReplicaId, key: VerifyingKey) {
        self.keys.insert(replica, key);
    }

    pub fn key(&self, replica: &ReplicaId) -> Option<&VerifyingKey> {
        self.keys.get(replica)
    }
}

impl FromIterator<(ReplicaId, VerifyingKey)> for Ed25519Verifier {
    fn from_iter<T: IntoIterator<Item = (ReplicaId, VerifyingKey)>>(iter: T) -> Self {
        Self {
            keys: iter.into_iter().collect(),
        }
    }
}

impl SignatureVerifier for Ed25519Verifier {
    fn verify(&self, signed: &SignedCollect, claimed_sender: ReplicaId) -> bool {
        match self.keys.get(&claimed_sender) {
            Some(key) => {
                let signature = Signature::from_bytes(&signed.signature.bytes());
                key.verify(&signed.payload, &signature).is_ok()
            }
            None => false,
        }
    }
}

/// [`Digester`] that computes SHA-256 digests.
#[derive(Clone, Copy, Default)]
pub struct Sha256Digester;

impl Digester for Sha256Digester {
    fn digest(&self, bytes: &[u8]) -> Vec<u8> {
        CryptoHasher::digest(bytes).to_vec()
    }
}

/// [`ViewConfiguration`] with a fixed `n` and `f`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StaticView {
    n: usize,
    f: usize,
}

impl StaticView {
    pub const fn new(n: usize, f: usize) -> Self {
        Self { n, f }
    }

    /// A view of `n` replicas tolerating the largest `f` such that `n >= 3f + 1`.
    pub const fn with_n(n: usize) -> Self {
        Self {
            n,
            f: n.saturating_sub(1) / 3,
        }
    }
}

impl ViewConfiguration for StaticView {
    fn current_n(&self) -> usize {
        self.n
    }

    fn current_f(&self) -> usize {
        self.f
    }
}
