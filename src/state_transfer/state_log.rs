/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The log of the last checkpoint and the batches applied since it.
//!
//! The checkpoint together with every batch applied after it make up the replica's current state. A
//! log configured with checkpoint period `k` has room for `k - 1` batches: the driver is expected to
//! take a new checkpoint before a `k`-th batch arrives.
//!
//! ## Execution ids of stored batches
//!
//! Batches are stored in the order in which they are applied. The batch in slot `i` belongs to
//! execution id `last_checkpoint_eid + 1 + i` (or `i` if no checkpoint execution id is known yet).
//! A batch is only retrievable if `last_checkpoint_eid < eid <= last_eid`.
//!
//! ## Two-step checkpoints
//!
//! Capturing the checkpoint bytes ([`new_checkpoint`](StateLog::new_checkpoint)) and committing the
//! checkpoint's execution id ([`set_last_checkpoint_eid`](StateLog::set_last_checkpoint_eid)) are
//! separate steps, because the driver learns the execution id of a checkpoint independently of when
//! the application hands over the bytes.

use borsh::{BorshDeserialize, BorshSerialize};

use crate::types::data_types::{CheckpointPeriod, ExecutionId, ReplicaId, Round};

use super::transferable::TransferableState;

/// One applied consensus decision: the batch bytes plus the agreement metadata needed to re-validate
/// it.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct BatchInfo {
    pub batch: Vec<u8>,
    pub round: Round,
    pub leader: ReplicaId,
}

impl BatchInfo {
    pub fn new(batch: Vec<u8>, round: Round, leader: ReplicaId) -> Self {
        Self {
            batch,
            round,
            leader,
        }
    }
}

pub struct StateLog {
    slots: Vec<Option<BatchInfo>>,
    position: usize,
    checkpoint: Option<Vec<u8>>,
    last_checkpoint_eid: Option<ExecutionId>,
    last_eid: Option<ExecutionId>,
}

impl StateLog {
    /// Create an empty log for checkpoint period `period`.
    pub fn new(period: CheckpointPeriod) -> Result<Self, StateLogError> {
        if period.int() == 0 {
            return Err(StateLogError::ZeroCheckpointPeriod);
        }

        Ok(Self {
            slots: vec![None; (period.int() - 1) as usize],
            position: 0,
            checkpoint: None,
            last_checkpoint_eid: None,
            last_eid: None,
        })
    }

    /// Number of batches the log can hold between two checkpoints.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of batches stored since the last checkpoint.
    pub fn num_batches(&self) -> usize {
        self.position
    }

    /// Replace the checkpoint with `state` and forget every stored batch.
    ///
    /// The checkpoint's execution id is not updated; call
    /// [`set_last_checkpoint_eid`](Self::set_last_checkpoint_eid) once it is known.
    pub fn new_checkpoint(&mut self, state: Vec<u8>) {
        self.slots.iter_mut().for_each(|slot| *slot = None);
        self.position = 0;
        self.checkpoint = Some(state);
    }

    /// Set the execution id the current checkpoint corresponds to. The last execution id is raised to
    /// `eid` if it is lower, since everything up to the checkpoint has been applied.
    pub fn set_last_checkpoint_eid(&mut self, eid: ExecutionId) {
        self.last_checkpoint_eid = Some(eid);
        if self.last_eid.map_or(true, |last_eid| last_eid < eid) {
            self.last_eid = Some(eid);
        }
    }

    pub fn last_checkpoint_eid(&self) -> Option<ExecutionId> {
        self.last_checkpoint_eid
    }

    pub fn set_last_eid(&mut self, eid: ExecutionId) {
        self.last_eid = Some(eid);
    }

    /// Execution id of the last batch applied, `None` if nothing was applied yet.
    pub fn last_eid(&self) -> Option<ExecutionId> {
        self.last_eid
    }

    /// The checkpoint bytes, `None` if no checkpoint was taken yet.
    pub fn checkpoint(&self) -> Option<&[u8]> {
        self.checkpoint.as_deref()
    }

    /// Store a batch that was just applied. Returns `false`, dropping the batch, if the log is full.
    pub fn append_batch(&mut self, batch: Vec<u8>, round: Round, leader: ReplicaId) -> bool {
        if self.position >= self.slots.len() {
            log::debug!(
                "State log full ({} batches), dropping batch decided in round {} by {}",
                self.slots.len(),
                round,
                leader
            );
            return false;
        }

        self.slots[self.position] = Some(BatchInfo::new(batch, round, leader));
        self.position += 1;
        self.last_eid = Some(self.first_batch_eid() + (self.position as u64 - 1));
        true
    }

    /// The batch applied for execution id `eid`, if it is stored.
    pub fn batch(&self, eid: ExecutionId) -> Option<&BatchInfo> {
        if self.last_checkpoint_eid.is_some_and(|cp_eid| eid <= cp_eid) {
            return None;
        }
        if self.last_eid.map_or(true, |last_eid| eid > last_eid) {
            return None;
        }

        let offset = (eid - self.first_batch_eid()) as usize;
        self.slots.get(offset).and_then(Option::as_ref)
    }

    /// The batches stored since the last checkpoint, in the order they were applied.
    pub fn batches(&self) -> impl Iterator<Item = &BatchInfo> {
        self.slots[..self.position].iter().flatten()
    }

    /// Build the state a replica needs to reach execution id `target_eid`.
    ///
    /// Returns `None` if no checkpoint execution id is known or `target_eid` precedes it. If
    /// `target_eid` is beyond the last applied batch, every stored batch is included and the requester
    /// has to catch up the rest in another round.
    pub fn build_transferable_state(&self, target_eid: ExecutionId) -> Option<TransferableState> {
        let checkpoint_eid = self.last_checkpoint_eid?;
        if target_eid < checkpoint_eid {
            return None;
        }

        let batches: Vec<BatchInfo> = match self.last_eid {
            Some(last_eid) if target_eid <= last_eid => {
                let size = (target_eid - checkpoint_eid) as usize;
                self.batches().take(size).cloned().collect()
            }
            Some(_) => self.batches().cloned().collect(),
            None => Vec::new(),
        };

        Some(TransferableState::new(
            batches,
            checkpoint_eid,
            target_eid,
            self.checkpoint.clone(),
        ))
    }

    /// Replace the whole content of this log with `state`.
    ///
    /// Batches beyond this log's capacity are dropped.
    pub fn install_transferable_state(&mut self, state: TransferableState) {
        let TransferableState {
            batches,
            last_checkpoint_eid,
            last_eid,
            checkpoint,
        } = state;

        self.slots.iter_mut().for_each(|slot| *slot = None);
        self.position = 0;
        for (slot, batch) in self.slots.iter_mut().zip(batches) {
            *slot = Some(batch);
            self.position += 1;
        }

        self.last_checkpoint_eid = Some(last_checkpoint_eid);
        self.checkpoint = checkpoint;
        self.last_eid = Some(last_eid);
    }

    /// Execution id of the batch in slot 0.
    fn first_batch_eid(&self) -> ExecutionId {
        self.last_checkpoint_eid
            .map_or(ExecutionId::new(0), |cp_eid| cp_eid + 1)
    }
}

/// Enumerates the ways creating a [`StateLog`] can fail.
#[derive(Debug, PartialEq, Eq)]
pub enum StateLogError {
    /// A checkpoint period of 0 leaves no room for even the checkpoint itself.
    ZeroCheckpointPeriod,
}
