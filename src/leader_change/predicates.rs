/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Byzantine quorum predicates that decide which value a new leader may propose.
//!
//! # Normalization
//!
//! The predicates are only meaningful over collects that talk about the *same* consensus instance.
//! Replicas may be executing different instances when a leader change starts, so collects are first
//! normalized to a target execution id by [`NormalizedCollects::normalize`]:
//! - A collect for a different execution id is replaced by a collect for the target execution id in
//!   which the sender is still at round 0: empty quorum-weak value and empty write set.
//! - Every write-set value is digested, so that values are compared by digest.
//! - Only the first collect of each sender is kept, and duplicate write-set entries are removed.
//!
//! # Predicates
//!
//! With `n` the size of the view and `f` the number of tolerated Byzantine replicas:
//! - [`quorum_highest`](QuorumPredicates::quorum_highest)`(r, v)`: some collect reports quorum-weak
//!   pair `(r, v)`, and more than `(n + f) / 2` collects report either that pair or a quorum-weak round
//!   lower than `r`.
//! - [`certified_value`](QuorumPredicates::certified_value)`(r, v)`: more than `f` write-set entries
//!   have round at least `r` and digest `v`.
//! - [`binds`](QuorumPredicates::binds)`(r, v)`: more than `n - f` collects, `quorum_highest(r, v)`,
//!   and `certified_value(r, v)`.
//! - [`unbound`](QuorumPredicates::unbound): at least `n - f` collects, and more than `(n + f) / 2` of
//!   them report quorum-weak round 0.
//! - [`sound`](QuorumPredicates::sound): some `(r, v)` binds, or the collects are unbound.
//!
//! All divisions are integer divisions and all inequalities are strict where stated.

use indexmap::IndexSet;

use crate::{
    pluggables::{Digester, ViewConfiguration},
    types::data_types::{ExecutionId, ReplicaId, Round},
};

use super::messages::{CollectData, HashedPair, NormalizedCollect, TimestampValuePair};

/// A set of collects normalized to a single execution id. See the [module-level docs](self).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NormalizedCollects {
    eid: ExecutionId,
    collects: Vec<NormalizedCollect>,
}

impl NormalizedCollects {
    /// Normalize `collects` to `eid`, digesting write-set values with `digester`.
    pub fn normalize<H: Digester>(
        collects: impl IntoIterator<Item = CollectData>,
        eid: ExecutionId,
        digester: &H,
    ) -> Self {
        let mut senders: IndexSet<ReplicaId> = IndexSet::new();
        let mut normalized = Vec::new();

        for collect in collects {
            if !senders.insert(collect.sender) {
                continue;
            }

            // A replica at another execution id is assumed to be at round 0 of the target instance.
            let collect = if collect.eid == eid {
                collect
            } else {
                CollectData::new(collect.sender, eid, TimestampValuePair::empty(), Vec::new())
            };

            let write_set: IndexSet<HashedPair> = collect
                .write_set
                .into_iter()
                .map(|pair| {
                    let digest = if pair.value.is_empty() {
                        Vec::new()
                    } else {
                        digester.digest(&pair.value)
                    };
                    HashedPair {
                        round: pair.round,
                        value: pair.value,
                        digest,
                    }
                })
                .collect();

            normalized.push(NormalizedCollect {
                sender: collect.sender,
                eid,
                quorum_weaks: collect.quorum_weaks,
                write_set: write_set.into_iter().collect(),
            });
        }

        Self {
            eid,
            collects: normalized,
        }
    }

    /// The execution id every collect in this set talks about.
    pub fn eid(&self) -> ExecutionId {
        self.eid
    }

    pub fn len(&self) -> usize {
        self.collects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.collects.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, NormalizedCollect> {
        self.collects.iter()
    }

    /// Every round, and every distinct value, that appears in a quorum-weak pair or a write set.
    ///
    /// Empty quorum-weak values are not candidates. Write-set values contribute their digests.
    fn candidates(&self) -> (IndexSet<Round>, IndexSet<&[u8]>) {
        let mut rounds = IndexSet::new();
        let mut values = IndexSet::new();

        for collect in &self.collects {
            rounds.insert(collect.quorum_weaks.round);
            if !collect.quorum_weaks.value.is_empty() {
                values.insert(collect.quorum_weaks.value.as_slice());
            }
            for pair in &collect.write_set {
                rounds.insert(pair.round);
                values.insert(pair.digest.as_slice());
            }
        }

        (rounds, values)
    }
}

/// The quorum predicates, evaluated with a fixed `n` and `f`.
///
/// Create one with [`from_view`](Self::from_view) right before evaluating, so that the predicates
/// always use the current view.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QuorumPredicates {
    n: usize,
    f: usize,
}

impl QuorumPredicates {
    pub const fn new(n: usize, f: usize) -> Self {
        Self { n, f }
    }

    pub fn from_view<W: ViewConfiguration>(view: &W) -> Self {
        Self::new(view.current_n(), view.current_f())
    }

    /// `n - f`, the size of a quorum of correct replicas.
    fn n_minus_f(&self) -> usize {
        self.n.saturating_sub(self.f)
    }

    /// `(n + f) / 2`, the size a set of collects must strictly exceed to be a Byzantine quorum.
    fn byzantine_quorum(&self) -> usize {
        (self.n + self.f) / 2
    }

    /// Whether `collects` certifies a single value (or the absence of any bound value) as safe to
    /// resume consensus with. `None` is never sound.
    pub fn sound(&self, collects: Option<&NormalizedCollects>) -> bool {
        let Some(collects) = collects else {
            return false;
        };

        let (rounds, values) = collects.candidates();
        for round in &rounds {
            for value in &values {
                if self.binds(*round, value, collects) {
                    return true;
                }
            }
        }

        self.unbound(collects)
    }

    pub fn binds(&self, round: Round, value: &[u8], collects: &NormalizedCollects) -> bool {
        collects.len() > self.n_minus_f()
            && self.quorum_highest(round, value, collects)
            && self.certified_value(round, value, collects)
    }

    pub fn quorum_highest(&self, round: Round, value: &[u8], collects: &NormalizedCollects) -> bool {
        let reports_pair = |c: &&NormalizedCollect| {
            c.quorum_weaks.round == round && c.quorum_weaks.value.as_slice() == value
        };

        let appears = collects.iter().any(|c| reports_pair(&c));
        let count = collects
            .iter()
            .filter(|c| c.quorum_weaks.round < round || reports_pair(c))
            .count();

        appears && count > self.byzantine_quorum()
    }

    pub fn certified_value(&self, round: Round, value: &[u8], collects: &NormalizedCollects) -> bool {
        let count = collects
            .iter()
            .flat_map(|c| c.write_set.iter())
            .filter(|pair| pair.round >= round && pair.digest.as_slice() == value)
            .count();

        count > self.f
    }

    pub fn unbound(&self, collects: &NormalizedCollects) -> bool {
        if collects.len() < self.n_minus_f() {
            return false;
        }

        let count = collects
            .iter()
            .filter(|c| c.quorum_weaks.round.is_init())
            .count();

        count > self.byzantine_quorum()
    }

    /// The original (not digested) bytes of a value that [`binds`](Self::binds), if there is one.
    ///
    /// Candidates are visited in the same order as in [`sound`](Self::sound), and the first write-set
    /// entry whose digest matches the binding candidate provides the bytes.
    pub fn bind_value(&self, collects: Option<&NormalizedCollects>) -> Option<Vec<u8>> {
        let collects = collects?;

        let (rounds, values) = collects.candidates();
        for round in &rounds {
            for value in &values {
                if !self.binds(*round, value, collects) {
                    continue;
                }

                let original = collects
                    .iter()
                    .flat_map(|c| c.write_set.iter())
                    .find(|pair| pair.digest.as_slice() == *value);
                if let Some(pair) = original {
                    return Some(pair.value.clone());
                }
            }
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pluggables::Sha256Digester;

    const EID: ExecutionId = ExecutionId::new(10);

    fn digest(value: &[u8]) -> Vec<u8> {
        Sha256Digester.digest(value)
    }

    fn collect(sender: u32, round: u64, weak: Vec<u8>, writes: &[(u64, &[u8])]) -> CollectData {
        CollectData::new(
            ReplicaId::new(sender),
            EID,
            TimestampValuePair::new(Round::new(round), weak),
            writes
                .iter()
                .map(|(r, v)| TimestampValuePair::new(Round::new(*r), v.to_vec()))
                .collect(),
        )
    }

    fn normalize(collects: Vec<CollectData>) -> NormalizedCollects {
        NormalizedCollects::normalize(collects, EID, &Sha256Digester)
    }

    /// Three of four replicas report quorum-weak (2, digest(X)) and wrote X in round 2.
    fn bound_scenario() -> NormalizedCollects {
        let x: &[u8] = b"X";
        normalize(vec![
            collect(0, 2, digest(x), &[(2, x)]),
            collect(1, 2, digest(x), &[(2, x)]),
            collect(2, 2, digest(x), &[(2, x)]),
            collect(3, 0, Vec::new(), &[]),
        ])
    }

    #[test]
    fn bound_value_is_sound_and_returned_in_original_form() {
        let predicates = QuorumPredicates::new(4, 1);
        let collects = bound_scenario();

        assert!(predicates.binds(Round::new(2), &digest(b"X"), &collects));
        assert!(predicates.sound(Some(&collects)));
        assert_eq!(predicates.bind_value(Some(&collects)), Some(b"X".to_vec()));
    }

    #[test]
    fn absent_or_empty_collects_are_not_sound() {
        let predicates = QuorumPredicates::new(4, 1);
        assert!(!predicates.sound(None));
        assert!(!predicates.sound(Some(&normalize(Vec::new()))));
        assert_eq!(predicates.bind_value(None), None);
    }

    #[test]
    fn unbound_needs_n_minus_f_collects() {
        let predicates = QuorumPredicates::new(4, 1);
        let two = normalize(vec![
            collect(0, 0, Vec::new(), &[]),
            collect(1, 0, Vec::new(), &[]),
        ]);
        assert!(!predicates.unbound(&two));

        // (4 + 1) / 2 = 2, so three round-0 collects out of three are unbound.
        let three = normalize(vec![
            collect(0, 0, Vec::new(), &[]),
            collect(1, 0, Vec::new(), &[]),
            collect(2, 0, Vec::new(), &[]),
        ]);
        assert!(predicates.unbound(&three));
        assert!(predicates.sound(Some(&three)));
        assert_eq!(predicates.bind_value(Some(&three)), None);
    }

    #[test]
    fn quorum_highest_threshold() {
        // n = 7, f = 2: (7 + 2) / 2 = 4, so 5 supporting collects are needed.
        let predicates = QuorumPredicates::new(7, 2);
        let v = digest(b"v");

        let mut collects = vec![collect(0, 3, v.clone(), &[])];
        collects.extend((1..4).map(|s| collect(s, 1, digest(b"old"), &[])));
        collects.extend((4..7).map(|s| collect(s, 5, digest(b"newer"), &[])));
        let four = normalize(collects.clone());
        assert!(!predicates.quorum_highest(Round::new(3), &v, &four));

        collects[4] = collect(4, 0, Vec::new(), &[]);
        let five = normalize(collects);
        assert!(predicates.quorum_highest(Round::new(3), &v, &five));
    }

    #[test]
    fn quorum_highest_requires_the_pair_to_appear() {
        let predicates = QuorumPredicates::new(4, 1);
        let collects = normalize((0..4).map(|s| collect(s, 0, Vec::new(), &[])).collect());
        assert!(!predicates.quorum_highest(Round::new(1), &digest(b"v"), &collects));
    }

    #[test]
    fn certified_value_is_strictly_more_than_f() {
        let predicates = QuorumPredicates::new(7, 2);
        let v: &[u8] = b"v";

        let two = normalize(vec![
            collect(0, 0, Vec::new(), &[(3, v)]),
            collect(1, 0, Vec::new(), &[(4, v)]),
            collect(2, 0, Vec::new(), &[(2, v)]),
        ]);
        // The round-2 write is below the queried round and does not count.
        assert!(!predicates.certified_value(Round::new(3), &digest(v), &two));

        let three = normalize(vec![
            collect(0, 0, Vec::new(), &[(3, v)]),
            collect(1, 0, Vec::new(), &[(4, v)]),
            collect(2, 0, Vec::new(), &[(3, v)]),
        ]);
        assert!(predicates.certified_value(Round::new(3), &digest(v), &three));
    }

    #[test]
    fn normalization_resets_collects_for_other_instances() {
        let other = CollectData::new(
            ReplicaId::new(5),
            ExecutionId::new(9),
            TimestampValuePair::new(Round::new(4), digest(b"v")),
            vec![TimestampValuePair::new(Round::new(4), b"v".to_vec())],
        );
        let collects = normalize(vec![other]);

        let normalized = collects.iter().next().unwrap();
        assert_eq!(normalized.eid, EID);
        assert_eq!(normalized.quorum_weaks, TimestampValuePair::empty());
        assert!(normalized.write_set.is_empty());
    }

    #[test]
    fn normalization_keeps_first_collect_per_sender_and_dedups_writes() {
        let v: &[u8] = b"v";
        let collects = normalize(vec![
            collect(0, 1, digest(v), &[(1, v), (1, v)]),
            collect(0, 0, Vec::new(), &[]),
        ]);

        assert_eq!(collects.len(), 1);
        let only = collects.iter().next().unwrap();
        assert_eq!(only.quorum_weaks.round, Round::new(1));
        assert_eq!(only.write_set.len(), 1);
        assert_eq!(only.write_set[0].digest, digest(v));
    }

    #[test]
    fn binds_requires_more_than_n_minus_f_collects() {
        let predicates = QuorumPredicates::new(4, 1);
        let x: &[u8] = b"X";
        let three = normalize(vec![
            collect(0, 2, digest(x), &[(2, x)]),
            collect(1, 2, digest(x), &[(2, x)]),
            collect(2, 2, digest(x), &[(2, x)]),
        ]);
        assert!(!predicates.binds(Round::new(2), &digest(x), &three));
    }
}
