/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The [`LeaderChangeManager`], which owns the evidence store and the regency tracker of a replica and
//! evaluates the quorum predicates over verified evidence.

use std::{
    sync::{mpsc::Sender, Mutex, MutexGuard, PoisonError},
    time::SystemTime,
};

use crate::{
    events::*,
    logging::first_seven_base64_chars,
    pluggables::{Digester, SignatureVerifier, ViewConfiguration},
    types::data_types::{ExecutionId, Regency, ReplicaId},
};

use super::{
    evidence::EvidenceStore,
    messages::{CollectData, LastEidData, SignedCollect},
    predicates::{NormalizedCollects, QuorumPredicates},
    regency::{InstallRegencyError, RegencyTracker},
};

/// Configuration of the [`LeaderChangeManager`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LeaderChangeConfiguration {
    /// Regency the replica starts in, both as its last and its next regency.
    pub initial_regency: Regency,
}

/// Leader-change state of a single replica.
///
/// Evidence, the last regency, and the next regency are guarded independently (see
/// [`regency`](super::regency) for the lock order between the latter two). Every method takes the
/// locks it needs for its whole duration and releases them before returning.
pub struct LeaderChangeManager<S: SignatureVerifier, H: Digester, W: ViewConfiguration> {
    evidence: Mutex<EvidenceStore>,
    regencies: RegencyTracker,
    verifier: S,
    digester: H,
    view: W,
    event_publisher: Option<Sender<Event>>,
}

impl<S: SignatureVerifier, H: Digester, W: ViewConfiguration> LeaderChangeManager<S, H, W> {
    pub fn new(
        configuration: LeaderChangeConfiguration,
        verifier: S,
        digester: H,
        view: W,
    ) -> Self {
        Self {
            evidence: Mutex::new(EvidenceStore::new()),
            regencies: RegencyTracker::new(configuration.initial_regency),
            verifier,
            digester,
            view,
            event_publisher: None,
        }
    }

    pub(crate) fn with_event_publisher(mut self, event_publisher: Option<Sender<Event>>) -> Self {
        self.event_publisher = event_publisher;
        self
    }

    /* ↓↓↓ Regencies ↓↓↓ */

    /// The regency tracker, for callers that need to hold the last or next regency guard across
    /// several steps.
    pub fn regencies(&self) -> &RegencyTracker {
        &self.regencies
    }

    pub fn last_regency(&self) -> Regency {
        self.regencies.last_regency()
    }

    pub fn next_regency(&self) -> Regency {
        self.regencies.next_regency()
    }

    /// Install `new_regency` and then discard all evidence for the regencies before it.
    pub fn install_regency(&self, new_regency: Regency) -> Result<(), InstallRegencyError> {
        self.regencies.install(new_regency)?;

        Event::InstallRegency(InstallRegencyEvent {
            timestamp: SystemTime::now(),
            regency: new_regency,
        })
        .publish(&self.event_publisher);

        if let Some(up_to) = new_regency.int().checked_sub(1).map(Regency::new) {
            self.remove_up_to(up_to);
        }

        Ok(())
    }

    /// Propose `new_regency` as the next regency. Returns the regency actually proposed, which is
    /// never below the last regency.
    pub fn propose_regency(&self, new_regency: Regency) -> Regency {
        let proposed = self.regencies.propose(new_regency);
        self.publish_propose_regency(proposed);
        proposed
    }

    /// Like [`propose_regency`](Self::propose_regency), and atomically records the requests whose
    /// timeout triggered the proposal.
    pub fn propose_regency_with_timed_out_requests(
        &self,
        new_regency: Regency,
        timed_out_requests: Vec<Vec<u8>>,
    ) -> Regency {
        let proposed = self
            .regencies
            .propose_with_timed_out_requests(new_regency, timed_out_requests);
        self.publish_propose_regency(proposed);
        proposed
    }

    fn publish_propose_regency(&self, regency: Regency) {
        Event::ProposeRegency(ProposeRegencyEvent {
            timestamp: SystemTime::now(),
            regency,
        })
        .publish(&self.event_publisher);
    }

    /* ↓↓↓ Stops ↓↓↓ */

    pub fn add_stop(&self, regency: Regency, sender: ReplicaId) {
        if self.evidence().add_stop(regency, sender) {
            Event::ReceiveStop(ReceiveStopEvent {
                timestamp: SystemTime::now(),
                regency,
                sender,
            })
            .publish(&self.event_publisher);
        }
    }

    pub fn remove_stops_up_to(&self, regency: Regency) {
        self.evidence().remove_stops_up_to(regency)
    }

    pub fn count_stops(&self, regency: Regency) -> usize {
        self.evidence().count_stops(regency)
    }

    pub fn stop_senders(&self, regency: Regency) -> Vec<ReplicaId> {
        self.evidence().stop_senders(regency)
    }

    /* ↓↓↓ Collects ↓↓↓ */

    /// Store a signed collect received for `regency`. Its signature is only checked when collects are
    /// [selected](Self::select_collects).
    pub fn add_collect(&self, regency: Regency, signed_collect: SignedCollect) {
        let sender = signed_collect.sender;
        if self.evidence().add_collect(regency, signed_collect) {
            Event::ReceiveCollect(ReceiveCollectEvent {
                timestamp: SystemTime::now(),
                regency,
                sender,
            })
            .publish(&self.event_publisher);
        }
    }

    pub fn remove_collects_up_to(&self, regency: Regency) {
        self.evidence().remove_collects_up_to(regency)
    }

    pub fn count_collects(&self, regency: Regency) -> usize {
        self.evidence().count_collects(regency)
    }

    /// A copy of the signed collects stored for `regency`, in the order they were received.
    pub fn collects(&self, regency: Regency) -> Option<Vec<SignedCollect>> {
        self.evidence()
            .collects(regency)
            .map(|collects| collects.iter().cloned().collect())
    }

    pub fn set_collects(&self, regency: Regency, collects: Vec<SignedCollect>) {
        self.evidence().set_collects(regency, collects)
    }

    /* ↓↓↓ Last eids ↓↓↓ */

    pub fn add_last_eid(&self, regency: Regency, last_eid: LastEidData) {
        let sender = last_eid.sender;
        let eid = last_eid.eid;
        if self.evidence().add_last_eid(regency, last_eid) {
            Event::ReceiveLastEid(ReceiveLastEidEvent {
                timestamp: SystemTime::now(),
                regency,
                sender,
                eid,
            })
            .publish(&self.event_publisher);
        }
    }

    pub fn remove_last_eids_up_to(&self, regency: Regency) {
        self.evidence().remove_last_eids_up_to(regency)
    }

    pub fn count_last_eids(&self, regency: Regency) -> usize {
        self.evidence().count_last_eids(regency)
    }

    pub fn last_eids(&self, regency: Regency) -> Option<Vec<LastEidData>> {
        self.evidence()
            .last_eids(regency)
            .map(|last_eids| last_eids.iter().cloned().collect())
    }

    pub fn set_last_eids(&self, regency: Regency, last_eids: Vec<LastEidData>) {
        self.evidence().set_last_eids(regency, last_eids)
    }

    /* ↓↓↓ All evidence ↓↓↓ */

    /// Discard stops, collects and last eids for every regency up to and including `regency`.
    pub fn remove_up_to(&self, regency: Regency) {
        self.evidence().remove_up_to(regency);

        Event::PurgeEvidence(PurgeEvidenceEvent {
            timestamp: SystemTime::now(),
            up_to: regency,
        })
        .publish(&self.event_publisher);
    }

    /* ↓↓↓ Safety decision ↓↓↓ */

    /// The quorum predicates for the view as it is right now.
    pub fn predicates(&self) -> QuorumPredicates {
        QuorumPredicates::from_view(&self.view)
    }

    /// Verify the collects stored for `regency` and normalize them to `eid`.
    ///
    /// Returns `None` if no collect was ever stored for `regency`.
    pub fn select_collects(&self, regency: Regency, eid: ExecutionId) -> Option<NormalizedCollects> {
        // Copy the collects so that verification runs without holding the evidence lock.
        let signed_collects = self.collects(regency)?;
        Some(self.select_collects_from(&signed_collects, eid))
    }

    /// Verify `signed_collects` and normalize the ones that pass to `eid`.
    ///
    /// A collect is dropped if its signature does not verify against its claimed sender, if its
    /// payload does not deserialize, or if the payload names a different sender.
    pub fn select_collects_from(
        &self,
        signed_collects: &[SignedCollect],
        eid: ExecutionId,
    ) -> NormalizedCollects {
        let verified = signed_collects
            .iter()
            .filter_map(|signed_collect| match self.verify_collect(signed_collect) {
                Ok(collect) => Some(collect),
                Err(reason) => {
                    self.drop_collect(signed_collect, reason);
                    None
                }
            });

        NormalizedCollects::normalize(verified, eid, &self.digester)
    }

    pub fn sound(&self, collects: Option<&NormalizedCollects>) -> bool {
        self.predicates().sound(collects)
    }

    pub fn bind_value(&self, collects: Option<&NormalizedCollects>) -> Option<Vec<u8>> {
        self.predicates().bind_value(collects)
    }

    /// The last-eid report for `regency` with the highest execution id. Among reports with the same
    /// execution id, the one received first wins.
    ///
    /// Reports whose decision proof is rejected by the verifier are ignored.
    pub fn highest_last_eid(&self, regency: Regency) -> Option<LastEidData> {
        let evidence = self.evidence();
        let mut highest: Option<&LastEidData> = None;
        for last_eid in evidence.last_eids(regency)? {
            if !self.verifier.verify_decision_proof(last_eid) {
                continue;
            }
            if highest.map_or(true, |highest| last_eid.eid > highest.eid) {
                highest = Some(last_eid);
            }
        }
        highest.cloned()
    }

    /// The decision reported by the first last-eid report for `regency` about execution id `eid`.
    ///
    /// Reports whose decision proof is rejected by the verifier are ignored.
    pub fn last_eid_value(&self, regency: Regency, eid: ExecutionId) -> Option<Vec<u8>> {
        self.evidence()
            .last_eids(regency)?
            .iter()
            .find(|last_eid| last_eid.eid == eid && self.verifier.verify_decision_proof(last_eid))
            .map(|last_eid| last_eid.decision.clone())
    }

    fn verify_collect(&self, signed_collect: &SignedCollect) -> Result<CollectData, DropReason> {
        if !self.verifier.verify(signed_collect, signed_collect.sender) {
            return Err(DropReason::InvalidSignature);
        }

        let collect = signed_collect
            .collect_data()
            .map_err(|_| DropReason::MalformedPayload)?;
        if collect.sender != signed_collect.sender {
            return Err(DropReason::SenderMismatch);
        }

        Ok(collect)
    }

    fn drop_collect(&self, signed_collect: &SignedCollect, reason: DropReason) {
        log::warn!(
            "Dropping collect from {} with signature {}: {:?}",
            signed_collect.sender,
            first_seven_base64_chars(&signed_collect.signature.bytes()),
            reason
        );

        Event::DropCollect(DropCollectEvent {
            timestamp: SystemTime::now(),
            sender: signed_collect.sender,
            reason,
        })
        .publish(&self.event_publisher);
    }

    fn evidence(&self) -> MutexGuard<'_, EvidenceStore> {
        self.evidence.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
