//! A group of replicas with freshly generated keys, and helpers to build the evidence they exchange.

use rand_core::OsRng;
use regency_rs::{
    leader_change::messages::{CollectData, LastEidData, SignedCollect, TimestampValuePair},
    pluggables::Ed25519Verifier,
    types::{
        crypto_primitives::{Keypair, SigningKey},
        data_types::{ExecutionId, ReplicaId, Round},
    },
};

pub(crate) struct Group {
    keypairs: Vec<Keypair>,
}

impl Group {
    pub(crate) fn new(n: u32) -> Self {
        let mut csprg = OsRng {};
        let keypairs = (0..n)
            .map(|_| Keypair::new(SigningKey::generate(&mut csprg)))
            .collect();
        Self { keypairs }
    }

    /// A verifier that knows the key of every replica in the group.
    pub(crate) fn verifier(&self) -> Ed25519Verifier {
        self.keypairs
            .iter()
            .enumerate()
            .map(|(id, keypair)| (ReplicaId::new(id as u32), keypair.public()))
            .collect()
    }

    pub(crate) fn keypair(&self, replica: u32) -> &Keypair {
        &self.keypairs[replica as usize]
    }

    /// A collect signed by `replica` itself.
    pub(crate) fn signed_collect(
        &self,
        replica: u32,
        eid: u64,
        quorum_weaks: (u64, &[u8]),
        write_set: &[(u64, &[u8])],
    ) -> SignedCollect {
        self.keypair(replica)
            .sign_collect(&collect(replica, eid, quorum_weaks, write_set))
    }
}

pub(crate) fn collect(
    sender: u32,
    eid: u64,
    quorum_weaks: (u64, &[u8]),
    write_set: &[(u64, &[u8])],
) -> CollectData {
    CollectData::new(
        ReplicaId::new(sender),
        ExecutionId::new(eid),
        TimestampValuePair::new(Round::new(quorum_weaks.0), quorum_weaks.1.to_vec()),
        write_set
            .iter()
            .map(|(round, value)| TimestampValuePair::new(Round::new(*round), value.to_vec()))
            .collect(),
    )
}

pub(crate) fn last_eid(sender: u32, eid: u64, decision: &[u8]) -> LastEidData {
    LastEidData::new(
        ReplicaId::new(sender),
        ExecutionId::new(eid),
        decision.to_vec(),
        Vec::new(),
    )
}
