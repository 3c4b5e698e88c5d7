/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Types that exist only to store numbers or bytes, and do not have any major "active" behavior.

use std::{
    fmt::{self, Debug, Display, Formatter},
    ops::{Add, Sub},
};

use borsh::{BorshDeserialize, BorshSerialize};

/// Identifier of a replica in the current view of the group.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, BorshDeserialize, BorshSerialize,
)]
pub struct ReplicaId(u32);

impl ReplicaId {
    /// Create a new `ReplicaId` with an `int` value.
    pub const fn new(int: u32) -> Self {
        Self(int)
    }

    /// Get the `u32` value of this `ReplicaId`.
    pub const fn int(&self) -> u32 {
        self.0
    }
}

impl Display for ReplicaId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

/// Leader-election round counter.
///
/// Advancing the regency means the group is trying to install a new leader. Regency `0` is the
/// regency every replica starts in.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    BorshDeserialize,
    BorshSerialize,
)]
pub struct Regency(u64);

impl Regency {
    pub const fn new(int: u64) -> Self {
        Self(int)
    }

    pub const fn init() -> Self {
        Self(0)
    }

    pub const fn int(&self) -> u64 {
        self.0
    }
}

impl Display for Regency {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl Add<u64> for Regency {
    type Output = Regency;

    fn add(self, rhs: u64) -> Self::Output {
        Regency(self.0 + rhs)
    }
}

/// Round of a single consensus instance.
///
/// Round `0` is the round every replica is in before it has written or accepted anything for the
/// instance.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, BorshDeserialize, BorshSerialize,
)]
pub struct Round(u64);

impl Round {
    pub const fn new(int: u64) -> Self {
        Self(int)
    }

    pub const fn init() -> Self {
        Self(0)
    }

    pub const fn int(&self) -> u64 {
        self.0
    }

    pub const fn is_init(&self) -> bool {
        self.0 == 0
    }
}

impl Display for Round {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

/// Sequence number of a consensus instance, i.e., of an applied batch of operations.
///
/// Watermarks that may not exist yet ("no checkpoint taken", "nothing applied") are represented as
/// `Option<ExecutionId>`.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, BorshDeserialize, BorshSerialize,
)]
pub struct ExecutionId(u64);

impl ExecutionId {
    pub const fn new(int: u64) -> Self {
        Self(int)
    }

    pub const fn int(&self) -> u64 {
        self.0
    }
}

impl Display for ExecutionId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl Add<u64> for ExecutionId {
    type Output = ExecutionId;

    fn add(self, rhs: u64) -> Self::Output {
        ExecutionId(self.0 + rhs)
    }
}

impl Sub<ExecutionId> for ExecutionId {
    type Output = i64;

    fn sub(self, rhs: ExecutionId) -> Self::Output {
        (self.0 as i64) - (rhs.0 as i64)
    }
}

/// Number of consensus instances between two consecutive checkpoints (often called `k`).
///
/// A [`StateLog`](crate::state_transfer::state_log::StateLog) configured with period `k` keeps
/// `k - 1` batches besides the checkpoint itself.
#[derive(Clone, Copy, Debug, PartialEq, Eq, BorshDeserialize, BorshSerialize)]
pub struct CheckpointPeriod(u32);

impl CheckpointPeriod {
    pub const fn new(int: u32) -> Self {
        Self(int)
    }

    pub const fn int(&self) -> u32 {
        self.0
    }
}

/// Signature represented in bytes.
#[derive(Clone, Copy, PartialEq, Eq, Hash, BorshDeserialize, BorshSerialize)]
pub struct SignatureBytes([u8; 64]);

impl SignatureBytes {
    pub const fn new(bytes: [u8; 64]) -> Self {
        Self(bytes)
    }

    pub const fn bytes(&self) -> [u8; 64] {
        self.0
    }
}

impl Debug for SignatureBytes {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
