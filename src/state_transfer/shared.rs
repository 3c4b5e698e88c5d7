/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! A [`StateLog`] that can be shared between the thread applying decisions and the threads serving
//! state transfer requests.

use std::{
    sync::{mpsc::Sender, Arc, Mutex, MutexGuard, PoisonError},
    time::SystemTime,
};

use crate::{
    events::{
        BuildTransferableStateEvent, Event, InstallTransferableStateEvent, NewCheckpointEvent,
    },
    types::data_types::{CheckpointPeriod, ExecutionId, ReplicaId, Round},
};

use super::{
    state_log::{BatchInfo, StateLog, StateLogError},
    transferable::TransferableState,
};

/// Every operation locks the log for its whole duration, so operations are atomic with respect to
/// each other. Clones share the same log.
#[derive(Clone)]
pub struct SharedStateLog {
    inner: Arc<Mutex<StateLog>>,
    event_publisher: Option<Sender<Event>>,
}

impl SharedStateLog {
    pub fn new(period: CheckpointPeriod) -> Result<Self, StateLogError> {
        Ok(Self::from_state_log(StateLog::new(period)?, None))
    }

    pub(crate) fn from_state_log(
        state_log: StateLog,
        event_publisher: Option<Sender<Event>>,
    ) -> Self {
        Self {
            inner: Arc::new(Mutex::new(state_log)),
            event_publisher,
        }
    }

    pub fn new_checkpoint(&self, state: Vec<u8>) {
        let checkpoint_size = state.len();
        self.lock().new_checkpoint(state);

        Event::NewCheckpoint(NewCheckpointEvent {
            timestamp: SystemTime::now(),
            checkpoint_size,
        })
        .publish(&self.event_publisher);
    }

    pub fn set_last_checkpoint_eid(&self, eid: ExecutionId) {
        self.lock().set_last_checkpoint_eid(eid)
    }

    pub fn last_checkpoint_eid(&self) -> Option<ExecutionId> {
        self.lock().last_checkpoint_eid()
    }

    pub fn set_last_eid(&self, eid: ExecutionId) {
        self.lock().set_last_eid(eid)
    }

    pub fn last_eid(&self) -> Option<ExecutionId> {
        self.lock().last_eid()
    }

    pub fn checkpoint(&self) -> Option<Vec<u8>> {
        self.lock().checkpoint().map(<[u8]>::to_vec)
    }

    pub fn num_batches(&self) -> usize {
        self.lock().num_batches()
    }

    pub fn append_batch(&self, batch: Vec<u8>, round: Round, leader: ReplicaId) -> bool {
        self.lock().append_batch(batch, round, leader)
    }

    pub fn batch(&self, eid: ExecutionId) -> Option<BatchInfo> {
        self.lock().batch(eid).cloned()
    }

    pub fn build_transferable_state(&self, target_eid: ExecutionId) -> Option<TransferableState> {
        let state = self.lock().build_transferable_state(target_eid);

        match &state {
            Some(state) => Event::BuildTransferableState(BuildTransferableStateEvent {
                timestamp: SystemTime::now(),
                target_eid,
                batches: state.batches().len(),
            })
            .publish(&self.event_publisher),
            None => log::debug!(
                "No transferable state for execution id {} (last checkpoint eid: {:?})",
                target_eid,
                self.last_checkpoint_eid()
            ),
        }

        state
    }

    pub fn install_transferable_state(&self, state: TransferableState) {
        let last_checkpoint_eid = state.last_checkpoint_eid();
        let last_eid = state.last_eid();
        let batches = state.batches().len();
        self.lock().install_transferable_state(state);

        Event::InstallTransferableState(InstallTransferableStateEvent {
            timestamp: SystemTime::now(),
            last_checkpoint_eid,
            last_eid,
            batches,
        })
        .publish(&self.event_publisher);
    }

    /// A poisoned lock only means another thread panicked while holding it; the log itself is never
    /// left half-updated by any of its methods.
    fn lock(&self) -> MutexGuard<'_, StateLog> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
