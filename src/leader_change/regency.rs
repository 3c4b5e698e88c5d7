/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Tracking of the installed ("last") and proposed ("next") regencies.
//!
//! The two counters are guarded by independent mutexes, so a replica can read its next regency while
//! another thread is busy with the last one. Methods that touch both always lock `last` before `next`;
//! callers that take both guards themselves must do the same.
//!
//! Invariants:
//! - `next >= last` at all times.
//! - `last` never decreases.

use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::types::data_types::Regency;

pub struct RegencyTracker {
    last: Mutex<Regency>,
    next: Mutex<NextRegency>,
}

/// The proposed regency, together with the requests whose timeout caused it to be proposed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NextRegency {
    regency: Regency,
    timed_out_requests: Vec<Vec<u8>>,
}

impl NextRegency {
    pub fn regency(&self) -> Regency {
        self.regency
    }

    /// Serialized client requests that timed out in this replica.
    pub fn timed_out_requests(&self) -> &[Vec<u8>] {
        &self.timed_out_requests
    }
}

impl RegencyTracker {
    pub fn new(init_regency: Regency) -> Self {
        Self {
            last: Mutex::new(init_regency),
            next: Mutex::new(NextRegency {
                regency: init_regency,
                timed_out_requests: Vec::new(),
            }),
        }
    }

    /// Take the guard over the last regency. Hold it across a read-modify-write sequence.
    pub fn lock_last(&self) -> LastRegencyGuard<'_> {
        LastRegencyGuard(self.last.lock().unwrap_or_else(PoisonError::into_inner))
    }

    /// Take the guard over the next regency and its timed-out requests.
    pub fn lock_next(&self) -> NextRegencyGuard<'_> {
        NextRegencyGuard(self.next.lock().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn last_regency(&self) -> Regency {
        self.lock_last().regency()
    }

    pub fn next_regency(&self) -> Regency {
        self.lock_next().regency()
    }

    /// Install `new_regency` as the last regency.
    ///
    /// Fails without changing anything if `new_regency` is lower than the current last regency. Raises
    /// the next regency if it would otherwise fall below the new last regency.
    pub fn install(&self, new_regency: Regency) -> Result<(), InstallRegencyError> {
        let mut last = self.lock_last();
        let mut next = self.lock_next();
        last.install(new_regency, &mut next)
    }

    /// Propose `new_regency` as the next regency, returning the regency that was actually set (never
    /// lower than the last regency).
    pub fn propose(&self, new_regency: Regency) -> Regency {
        let last = self.lock_last();
        let mut next = self.lock_next();
        next.propose(new_regency, &last)
    }

    /// Propose `new_regency` and record the requests that timed out in one step.
    pub fn propose_with_timed_out_requests(
        &self,
        new_regency: Regency,
        timed_out_requests: Vec<Vec<u8>>,
    ) -> Regency {
        let last = self.lock_last();
        let mut next = self.lock_next();
        next.set_timed_out_requests(timed_out_requests);
        next.propose(new_regency, &last)
    }
}

impl Default for RegencyTracker {
    fn default() -> Self {
        Self::new(Regency::init())
    }
}

/// Exclusive access to the last regency.
pub struct LastRegencyGuard<'a>(MutexGuard<'a, Regency>);

impl<'a> LastRegencyGuard<'a> {
    pub fn regency(&self) -> Regency {
        *self.0
    }

    /// See [`RegencyTracker::install`]. Taking `next` proves that the caller also holds the next
    /// regency's guard.
    pub fn install(
        &mut self,
        new_regency: Regency,
        next: &mut NextRegencyGuard<'_>,
    ) -> Result<(), InstallRegencyError> {
        if new_regency < *self.0 {
            return Err(InstallRegencyError::NonIncreasingRegency {
                last_regency: *self.0,
                new_regency,
            });
        }

        *self.0 = new_regency;
        if next.0.regency < new_regency {
            next.0.regency = new_regency;
        }
        Ok(())
    }
}

/// Exclusive access to the next regency and the timed-out requests recorded with it.
pub struct NextRegencyGuard<'a>(MutexGuard<'a, NextRegency>);

impl<'a> NextRegencyGuard<'a> {
    pub fn regency(&self) -> Regency {
        self.0.regency
    }

    pub fn timed_out_requests(&self) -> &[Vec<u8>] {
        &self.0.timed_out_requests
    }

    pub fn set_timed_out_requests(&mut self, timed_out_requests: Vec<Vec<u8>>) {
        self.0.timed_out_requests = timed_out_requests;
    }

    pub fn take_timed_out_requests(&mut self) -> Vec<Vec<u8>> {
        std::mem::take(&mut self.0.timed_out_requests)
    }

    /// See [`RegencyTracker::propose`].
    pub fn propose(&mut self, new_regency: Regency, last: &LastRegencyGuard<'_>) -> Regency {
        self.0.regency = new_regency.max(last.regency());
        self.0.regency
    }

    /// A copy of the guarded state.
    pub fn snapshot(&self) -> NextRegency {
        self.0.clone()
    }
}

/// Enumerates the ways installing a regency can fail.
#[derive(Debug, PartialEq, Eq)]
pub enum InstallRegencyError {
    /// An attempt was made to install a regency lower than the last installed one. Regencies are only
    /// ever installed in increasing order.
    NonIncreasingRegency {
        last_regency: Regency,
        new_regency: Regency,
    },
}
