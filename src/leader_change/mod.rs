/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Evidence and decisions for replacing a suspected-faulty leader.
//!
//! ## Leader change in a nutshell
//!
//! 1. A replica that suspects the current leader proposes the next regency and broadcasts a STOP vote
//!    for it. Votes are stored with [`add_stop`](LeaderChangeManager::add_stop).
//! 2. Once enough STOP votes arrive, replicas install the new regency
//!    ([`install_regency`](LeaderChangeManager::install_regency)) and send the new leader a signed
//!    collect of their state in the current consensus instance, together with their last decided
//!    execution id.
//! 3. The new leader verifies and normalizes the collects
//!    ([`select_collects`](LeaderChangeManager::select_collects)) and checks whether they are
//!    [`sound`](predicates::QuorumPredicates::sound). If some value
//!    [`binds`](predicates::QuorumPredicates::binds), the leader must propose it again; if the
//!    collects are [`unbound`](predicates::QuorumPredicates::unbound), it is free to propose anything.
//!
//! ## Components
//!
//! - [`evidence`]: per-regency storage of STOP votes, collects and last-eid reports.
//! - [`predicates`]: the Byzantine quorum predicates.
//! - [`regency`]: the last and next regency counters.
//! - [`messages`]: the evidence types.
//! - [`LeaderChangeManager`]: ties the above together behind one thread-safe interface.

pub mod evidence;

pub mod implementation;
pub use implementation::{LeaderChangeConfiguration, LeaderChangeManager};

pub mod messages;

pub mod predicates;

pub mod regency;
