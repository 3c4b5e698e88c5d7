/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Checkpoint and batch log that lets an up-to-date replica bring a lagging or recovering replica
//! back to its state.
//!
//! A replica records every batch it applies in its [`StateLog`](state_log::StateLog) and periodically
//! replaces the log's content with a checkpoint of the application state. When another replica asks
//! to catch up to an execution id, the log is turned into a
//! [`TransferableState`](transferable::TransferableState): the checkpoint plus the batches applied
//! after it. The receiving replica installs the snapshot into its own log and replays the batches.
//!
//! [`SharedStateLog`](shared::SharedStateLog) wraps the log so that the thread applying decisions and
//! the threads serving state transfer requests can use it concurrently.

use crate::types::data_types::CheckpointPeriod;

pub mod shared;

pub mod state_log;

pub mod transferable;

/// Configuration of the replica's [`StateLog`](state_log::StateLog).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StateLogConfiguration {
    pub checkpoint_period: CheckpointPeriod,
}
