/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Evidence that replicas exchange during a leader change.
//!
//! [`SignedCollect`]s and [`LastEidData`] travel inside SYNC messages. Stop votes carry no payload
//! beyond the regency and the sender and are therefore not represented by a type of their own.

use borsh::{BorshDeserialize, BorshSerialize};

use crate::types::data_types::{ExecutionId, ReplicaId, Round, SignatureBytes};

/// A value together with the round it was written or accepted in.
///
/// Two pairs are equal iff their rounds and the *contents* of their values are equal.
#[derive(Clone, Debug, PartialEq, Eq, Hash, BorshSerialize, BorshDeserialize)]
pub struct TimestampValuePair {
    pub round: Round,
    pub value: Vec<u8>,
}

impl TimestampValuePair {
    pub fn new(round: Round, value: Vec<u8>) -> Self {
        Self { round, value }
    }

    /// The pair reported by a replica that has not accepted anything in the consensus instance yet:
    /// round 0 and an empty value.
    pub fn empty() -> Self {
        Self {
            round: Round::init(),
            value: Vec::new(),
        }
    }
}

/// One replica's report of its state in a consensus instance, sent to the leader of a new regency.
///
/// - `quorum_weaks` is the round and value that a Byzantine quorum of WEAK messages converged on.
///   WEAK messages carry the digest of the proposed value, so `quorum_weaks.value` is a digest and
///   is compared directly against the digests of write-set values.
/// - `write_set` lists every round and value the sender itself wrote.
#[derive(Clone, Debug, PartialEq, Eq, Hash, BorshSerialize, BorshDeserialize)]
pub struct CollectData {
    pub sender: ReplicaId,
    pub eid: ExecutionId,
    pub quorum_weaks: TimestampValuePair,
    pub write_set: Vec<TimestampValuePair>,
}

impl CollectData {
    pub fn new(
        sender: ReplicaId,
        eid: ExecutionId,
        quorum_weaks: TimestampValuePair,
        write_set: Vec<TimestampValuePair>,
    ) -> Self {
        Self {
            sender,
            eid,
            quorum_weaks,
            write_set,
        }
    }
}

/// Envelope around a serialized [`CollectData`]: the payload bytes, a signature over them, and the
/// replica that claims to have produced the signature.
///
/// The payload is only deserialized by [`collect_data`](Self::collect_data) after the signature has
/// been verified against `sender`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, BorshSerialize, BorshDeserialize)]
pub struct SignedCollect {
    pub payload: Vec<u8>,
    pub signature: SignatureBytes,
    pub sender: ReplicaId,
}

impl SignedCollect {
    pub fn new(payload: Vec<u8>, signature: SignatureBytes, sender: ReplicaId) -> Self {
        Self {
            payload,
            signature,
            sender,
        }
    }

    /// Deserialize the payload.
    ///
    /// # Precondition
    ///
    /// The signature over `payload` has been verified against `sender`.
    pub(crate) fn collect_data(&self) -> Result<CollectData, std::io::Error> {
        CollectData::try_from_slice(&self.payload)
    }
}

/// A replica's claim about the highest consensus instance it has decided, the decided value, and the
/// proof of the decision.
#[derive(Clone, Debug, PartialEq, Eq, Hash, BorshSerialize, BorshDeserialize)]
pub struct LastEidData {
    pub sender: ReplicaId,
    pub eid: ExecutionId,
    pub decision: Vec<u8>,
    pub proof: Vec<u8>,
}

impl LastEidData {
    pub fn new(sender: ReplicaId, eid: ExecutionId, decision: Vec<u8>, proof: Vec<u8>) -> Self {
        Self {
            sender,
            eid,
            decision,
            proof,
        }
    }
}

/// A write-set entry after normalization: the original value plus its digest.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct HashedPair {
    pub round: Round,
    pub value: Vec<u8>,
    pub digest: Vec<u8>,
}

/// A [`CollectData`] after normalization to a target execution id, with digested write-set values.
///
/// Only [`NormalizedCollects::normalize`](super::predicates::NormalizedCollects::normalize) creates
/// these.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NormalizedCollect {
    pub sender: ReplicaId,
    pub eid: ExecutionId,
    pub quorum_weaks: TimestampValuePair,
    pub write_set: Vec<HashedPair>,
}
