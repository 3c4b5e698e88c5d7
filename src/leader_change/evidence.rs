/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Per-regency storage of leader-change evidence.
//!
//! The [`EvidenceStore`] keeps three mappings keyed by [`Regency`]:
//! 1. **Stops**: the replicas that voted to stop the current leader and move to the regency.
//! 2. **Collects**: the [`SignedCollect`]s received in SYNC messages for the regency.
//! 3. **Last eids**: the [`LastEidData`]s received in SYNC messages for the regency.
//!
//! Every mapping value is an insertion-ordered set keyed by content, so receiving the same evidence
//! twice never counts twice. The store has no internal locking; it is guarded as a whole by its
//! owner (see [`LeaderChangeManager`](super::LeaderChangeManager)).

use std::collections::BTreeMap;

use indexmap::IndexSet;

use crate::types::data_types::{Regency, ReplicaId};

use super::messages::{LastEidData, SignedCollect};

#[derive(Default)]
pub struct EvidenceStore {
    stops: BTreeMap<Regency, IndexSet<ReplicaId>>,
    collects: BTreeMap<Regency, IndexSet<SignedCollect>>,
    last_eids: BTreeMap<Regency, IndexSet<LastEidData>>,
}

impl EvidenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /* ↓↓↓ Stops ↓↓↓ */

    /// Record that `sender` voted to move to `regency`. Returns whether the vote was new.
    pub fn add_stop(&mut self, regency: Regency, sender: ReplicaId) -> bool {
        self.stops.entry(regency).or_default().insert(sender)
    }

    pub fn remove_stops_up_to(&mut self, regency: Regency) {
        retain_above(&mut self.stops, regency)
    }

    pub fn count_stops(&self, regency: Regency) -> usize {
        self.stops.get(&regency).map_or(0, IndexSet::len)
    }

    /// The replicas that voted to move to `regency`, in the order their votes arrived.
    pub fn stop_senders(&self, regency: Regency) -> Vec<ReplicaId> {
        self.stops
            .get(&regency)
            .map(|senders| senders.iter().copied().collect())
            .unwrap_or_default()
    }

    /* ↓↓↓ Collects ↓↓↓ */

    /// Record a signed collect received for `regency`. Returns whether the collect was new.
    pub fn add_collect(&mut self, regency: Regency, signed_collect: SignedCollect) -> bool {
        self.collects
            .entry(regency)
            .or_default()
            .insert(signed_collect)
    }

    pub fn remove_collects_up_to(&mut self, regency: Regency) {
        retain_above(&mut self.collects, regency)
    }

    pub fn count_collects(&self, regency: Regency) -> usize {
        self.collects.get(&regency).map_or(0, IndexSet::len)
    }

    pub fn collects(&self, regency: Regency) -> Option<&IndexSet<SignedCollect>> {
        self.collects.get(&regency)
    }

    /// Replace every collect stored for `regency` with `collects`.
    pub fn set_collects(
        &mut self,
        regency: Regency,
        collects: impl IntoIterator<Item = SignedCollect>,
    ) {
        self.collects
            .insert(regency, collects.into_iter().collect());
    }

    /* ↓↓↓ Last eids ↓↓↓ */

    /// Record a last-eid report received for `regency`. Returns whether the report was new.
    pub fn add_last_eid(&mut self, regency: Regency, last_eid: LastEidData) -> bool {
        self.last_eids.entry(regency).or_default().insert(last_eid)
    }

    pub fn remove_last_eids_up_to(&mut self, regency: Regency) {
        retain_above(&mut self.last_eids, regency)
    }

    pub fn count_last_eids(&self, regency: Regency) -> usize {
        self.last_eids.get(&regency).map_or(0, IndexSet::len)
    }

    pub fn last_eids(&self, regency: Regency) -> Option<&IndexSet<LastEidData>> {
        self.last_eids.get(&regency)
    }

    /// Replace every last-eid report stored for `regency` with `last_eids`.
    pub fn set_last_eids(
        &mut self,
        regency: Regency,
        last_eids: impl IntoIterator<Item = LastEidData>,
    ) {
        self.last_eids
            .insert(regency, last_eids.into_iter().collect());
    }

    /* ↓↓↓ All evidence ↓↓↓ */

    /// Discard stops, collects and last eids for every regency up to and including `regency`.
    pub fn remove_up_to(&mut self, regency: Regency) {
        self.remove_stops_up_to(regency);
        self.remove_collects_up_to(regency);
        self.remove_last_eids_up_to(regency);
    }
}

/// Keep only the entries of `map` whose key is strictly greater than `regency`.
fn retain_above<T>(map: &mut BTreeMap<Regency, T>, regency: Regency) {
    match regency.int().checked_add(1) {
        Some(lowest_kept) => *map = map.split_off(&Regency::new(lowest_kept)),
        None => map.clear(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::data_types::{ExecutionId, SignatureBytes};

    fn signed_collect(sender: u32, payload: &[u8]) -> SignedCollect {
        SignedCollect::new(
            payload.to_vec(),
            SignatureBytes::new([7; 64]),
            ReplicaId::new(sender),
        )
    }

    #[test]
    fn duplicate_stops_count_once() {
        let mut store = EvidenceStore::new();
        let regency = Regency::new(3);
        assert!(store.add_stop(regency, ReplicaId::new(0)));
        assert!(!store.add_stop(regency, ReplicaId::new(0)));
        assert!(store.add_stop(regency, ReplicaId::new(2)));
        assert!(!store.add_stop(regency, ReplicaId::new(2)));

        assert_eq!(store.count_stops(regency), 2);
        assert_eq!(store.count_stops(Regency::new(4)), 0);
        assert_eq!(
            store.stop_senders(regency),
            vec![ReplicaId::new(0), ReplicaId::new(2)]
        );
    }

    #[test]
    fn remove_stops_up_to_is_inclusive() {
        let mut store = EvidenceStore::new();
        for r in 0..6 {
            store.add_stop(Regency::new(r), ReplicaId::new(1));
        }

        store.remove_stops_up_to(Regency::new(3));

        for r in 0..=3 {
            assert_eq!(store.count_stops(Regency::new(r)), 0);
        }
        for r in 4..6 {
            assert_eq!(store.count_stops(Regency::new(r)), 1);
        }
    }

    #[test]
    fn remove_up_to_max_regency_clears_everything() {
        let mut store = EvidenceStore::new();
        store.add_stop(Regency::new(u64::MAX), ReplicaId::new(1));
        store.add_collect(Regency::new(5), signed_collect(1, b"a"));

        store.remove_up_to(Regency::new(u64::MAX));

        assert_eq!(store.count_stops(Regency::new(u64::MAX)), 0);
        assert_eq!(store.count_collects(Regency::new(5)), 0);
    }

    #[test]
    fn collects_are_deduplicated_by_content() {
        let mut store = EvidenceStore::new();
        let regency = Regency::new(1);

        assert!(store.add_collect(regency, signed_collect(1, b"payload")));
        // A fresh but byte-identical envelope is the same evidence.
        assert!(!store.add_collect(regency, signed_collect(1, b"payload")));
        assert!(store.add_collect(regency, signed_collect(1, b"other payload")));

        assert_eq!(store.count_collects(regency), 2);
    }

    #[test]
    fn set_collects_replaces_previous_set() {
        let mut store = EvidenceStore::new();
        let regency = Regency::new(1);
        store.add_collect(regency, signed_collect(1, b"a"));
        store.add_collect(regency, signed_collect(2, b"b"));

        store.set_collects(regency, vec![signed_collect(3, b"c")]);

        let collects = store.collects(regency).unwrap();
        assert_eq!(collects.len(), 1);
        assert_eq!(collects[0].sender, ReplicaId::new(3));
    }

    #[test]
    fn last_eids_are_kept_per_regency() {
        let mut store = EvidenceStore::new();
        let report = LastEidData::new(ReplicaId::new(0), ExecutionId::new(9), vec![1], vec![]);

        assert!(store.add_last_eid(Regency::new(1), report.clone()));
        assert!(!store.add_last_eid(Regency::new(1), report.clone()));
        assert!(store.add_last_eid(Regency::new(2), report));

        assert_eq!(store.count_last_eids(Regency::new(1)), 1);
        store.remove_last_eids_up_to(Regency::new(1));
        assert!(store.last_eids(Regency::new(1)).is_none());
        assert_eq!(store.count_last_eids(Regency::new(2)), 1);

        store.set_last_eids(Regency::new(2), Vec::new());
        assert_eq!(store.count_last_eids(Regency::new(2)), 0);
    }
}
