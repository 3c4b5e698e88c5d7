/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The snapshot shipped from an up-to-date replica to a replica that is catching up.

use borsh::{BorshDeserialize, BorshSerialize};

use crate::types::data_types::ExecutionId;

use super::state_log::BatchInfo;

/// A checkpoint plus the batches that follow it, up to `last_eid`.
///
/// Built by [`StateLog::build_transferable_state`](super::state_log::StateLog::build_transferable_state)
/// and consumed by
/// [`StateLog::install_transferable_state`](super::state_log::StateLog::install_transferable_state).
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct TransferableState {
    pub(crate) batches: Vec<BatchInfo>,
    pub(crate) last_checkpoint_eid: ExecutionId,
    pub(crate) last_eid: ExecutionId,
    pub(crate) checkpoint: Option<Vec<u8>>,
}

impl TransferableState {
    pub fn new(
        batches: Vec<BatchInfo>,
        last_checkpoint_eid: ExecutionId,
        last_eid: ExecutionId,
        checkpoint: Option<Vec<u8>>,
    ) -> Self {
        Self {
            batches,
            last_checkpoint_eid,
            last_eid,
            checkpoint,
        }
    }

    pub fn batches(&self) -> &[BatchInfo] {
        &self.batches
    }

    pub fn last_checkpoint_eid(&self) -> ExecutionId {
        self.last_checkpoint_eid
    }

    /// The execution id the requester asked for. May be beyond the last batch included.
    pub fn last_eid(&self) -> ExecutionId {
        self.last_eid
    }

    pub fn checkpoint(&self) -> Option<&[u8]> {
        self.checkpoint.as_deref()
    }

    /// Serialize into bytes to send to another replica.
    pub fn to_bytes(&self) -> Vec<u8> {
        // Serializing into a Vec cannot fail.
        self.try_to_vec().unwrap_or_default()
    }

    /// Deserialize bytes received from another replica.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TransferableStateError> {
        Ok(Self::try_from_slice(bytes)?)
    }
}

/// Enumerates the ways decoding a [`TransferableState`] can fail.
#[derive(Debug)]
pub enum TransferableStateError {
    /// The bytes are not a borsh-serialized `TransferableState`.
    DeserializeError(std::io::Error),
}

impl From<std::io::Error> for TransferableStateError {
    fn from(value: std::io::Error) -> Self {
        TransferableStateError::DeserializeError(value)
    }
}
