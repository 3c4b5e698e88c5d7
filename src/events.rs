/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Events emitted by the leader-change and state-transfer components.
//!
//! An event for a given action indicates that the action has been completed. Events are published on
//! an optional channel; [`event_bus`](crate::event_bus) dispatches them to user handlers and, if
//! enabled, to the default [loggers](crate::logging).

use std::{sync::mpsc::Sender, time::SystemTime};

use crate::types::data_types::{ExecutionId, Regency, ReplicaId};

pub enum Event {
    // Evidence events.
    ReceiveStop(ReceiveStopEvent),
    ReceiveCollect(ReceiveCollectEvent),
    ReceiveLastEid(ReceiveLastEidEvent),
    DropCollect(DropCollectEvent),
    PurgeEvidence(PurgeEvidenceEvent),
    // Regency events.
    ProposeRegency(ProposeRegencyEvent),
    InstallRegency(InstallRegencyEvent),
    // State log events.
    NewCheckpoint(NewCheckpointEvent),
    BuildTransferableState(BuildTransferableStateEvent),
    InstallTransferableState(InstallTransferableStateEvent),
}

impl Event {
    /// Send this event to `event_publisher`, if there is one.
    ///
    /// Events are dropped if the receiving end of the channel has been closed.
    pub(crate) fn publish(self, event_publisher: &Option<Sender<Event>>) {
        if let Some(event_publisher) = event_publisher {
            let _ = event_publisher.send(self);
        }
    }
}

/// A new STOP vote was stored.
pub struct ReceiveStopEvent {
    pub timestamp: SystemTime,
    pub regency: Regency,
    pub sender: ReplicaId,
}

/// A new signed collect was stored.
pub struct ReceiveCollectEvent {
    pub timestamp: SystemTime,
    pub regency: Regency,
    pub sender: ReplicaId,
}

/// A new last-eid report was stored.
pub struct ReceiveLastEidEvent {
    pub timestamp: SystemTime,
    pub regency: Regency,
    pub sender: ReplicaId,
    pub eid: ExecutionId,
}

/// Why a signed collect was left out of a collect selection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DropReason {
    /// The signature does not verify against the claimed sender.
    InvalidSignature,
    /// The payload is not a serialized collect.
    MalformedPayload,
    /// The payload names a different sender than the envelope.
    SenderMismatch,
}

/// A signed collect was left out of a collect selection.
pub struct DropCollectEvent {
    pub timestamp: SystemTime,
    pub sender: ReplicaId,
    pub reason: DropReason,
}

/// All evidence for regencies up to and including `up_to` was discarded.
pub struct PurgeEvidenceEvent {
    pub timestamp: SystemTime,
    pub up_to: Regency,
}

/// The next regency was proposed.
pub struct ProposeRegencyEvent {
    pub timestamp: SystemTime,
    pub regency: Regency,
}

/// A regency was installed.
pub struct InstallRegencyEvent {
    pub timestamp: SystemTime,
    pub regency: Regency,
}

/// A new checkpoint was stored in the state log.
pub struct NewCheckpointEvent {
    pub timestamp: SystemTime,
    pub checkpoint_size: usize,
}

/// A transferable state was built for a replica that is catching up.
pub struct BuildTransferableStateEvent {
    pub timestamp: SystemTime,
    pub target_eid: ExecutionId,
    pub batches: usize,
}

/// A received transferable state replaced the content of the state log.
pub struct InstallTransferableStateEvent {
    pub timestamp: SystemTime,
    pub last_checkpoint_eid: ExecutionId,
    pub last_eid: ExecutionId,
    pub batches: usize,
}
