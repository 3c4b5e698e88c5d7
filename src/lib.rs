/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Leader change and state transfer for Byzantine fault tolerant state machine replication.
//!
//! This crate implements the safety-critical pieces a replica needs when the group replaces a
//! suspected-faulty leader, and when a lagging or recovering replica has to catch up with the others:
//! - [`leader_change`]: stores STOP, collect and last-eid evidence per regency, tracks the installed
//!   and proposed regencies, and evaluates the quorum predicates that decide which value a new
//!   leader may propose.
//! - [`state_transfer`]: keeps the last checkpoint and the batches applied since it, and turns them into
//!   a [`TransferableState`](state_transfer::transferable::TransferableState) for other replicas.
//!
//! Networking, the agreement protocol itself, and application execution live outside of this crate.
//! The collaborators it needs (signature verification, digests, and the current view) are consumed
//! through the traits in [`pluggables`].
//!
//! To get started, build a [`ReplicaSpec`](replica::ReplicaSpec) and start it.

pub mod events;

pub(crate) mod event_bus;

pub mod leader_change;

pub mod logging;

pub mod pluggables;

pub mod replica;

pub mod state_transfer;

pub mod types;
