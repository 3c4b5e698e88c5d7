/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Functions that log out events.
//!
//! The logs defined in this module are printed if the user enabled them via the
//! [configuration](crate::replica::Configuration).
//!
//! This crate logs using the [log](https://docs.rs/log/latest/log/) crate. To get these messages
//! printed onto a terminal or to a file, set up a
//! [logging implementation](https://docs.rs/log/latest/log/#available-logging-implementations).
//!
//! ## Log message format
//!
//! Log messages are CSVs (Comma Separated Values) with at least two values. The first two values are
//! always:
//! 1. The name of the [event](crate::events) in PascalCase (defined in this module as constants).
//! 2. The time the event was emitted (as number of seconds since the Unix Epoch).
//!
//! The rest of the values differ depending on the kind of event. For example, the following snippet
//! is how a [ReceiveStop](crate::events::ReceiveStopEvent) is printed:
//!
//! ```text
//! ReceiveStop, 1701329264, 3, 1
//! ```
//!
//! In the snippet, the third value is the regency voted for and the fourth value is the sender.

use std::time::SystemTime;

use base64::{engine::general_purpose::STANDARD_NO_PAD, Engine as _};

use crate::events::*;

// Names of each event in PascalCase for printing:
pub const RECEIVE_STOP: &str = "ReceiveStop";
pub const RECEIVE_COLLECT: &str = "ReceiveCollect";
pub const RECEIVE_LAST_EID: &str = "ReceiveLastEid";
pub const DROP_COLLECT: &str = "DropCollect";
pub const PURGE_EVIDENCE: &str = "PurgeEvidence";

pub const PROPOSE_REGENCY: &str = "ProposeRegency";
pub const INSTALL_REGENCY: &str = "InstallRegency";

pub const NEW_CHECKPOINT: &str = "NewCheckpoint";
pub const BUILD_TRANSFERABLE_STATE: &str = "BuildTransferableState";
pub const INSTALL_TRANSFERABLE_STATE: &str = "InstallTransferableState";

/// Implemented by event types. Used to get a closure that logs the event.
pub(crate) trait Logger {
    /// Returns a pointer to the default logging handler for a given event type.
    fn get_logger() -> Box<dyn Fn(&Self) + Send>;
}

impl Logger for ReceiveStopEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |receive_stop_event: &ReceiveStopEvent| {
            log::info!(
                "{}, {}, {}, {}",
                RECEIVE_STOP,
                secs_since_unix_epoch(receive_stop_event.timestamp),
                receive_stop_event.regency,
                receive_stop_event.sender
            )
        };
        Box::new(logger)
    }
}

impl Logger for ReceiveCollectEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |receive_collect_event: &ReceiveCollectEvent| {
            log::info!(
                "{}, {}, {}, {}",
                RECEIVE_COLLECT,
                secs_since_unix_epoch(receive_collect_event.timestamp),
                receive_collect_event.regency,
                receive_collect_event.sender
            )
        };
        Box::new(logger)
    }
}

impl Logger for ReceiveLastEidEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |receive_last_eid_event: &ReceiveLastEidEvent| {
            log::info!(
                "{}, {}, {}, {}, {}",
                RECEIVE_LAST_EID,
                secs_since_unix_epoch(receive_last_eid_event.timestamp),
                receive_last_eid_event.regency,
                receive_last_eid_event.sender,
                receive_last_eid_event.eid
            )
        };
        Box::new(logger)
    }
}

impl Logger for DropCollectEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |drop_collect_event: &DropCollectEvent| {
            log::warn!(
                "{}, {}, {}, {:?}",
                DROP_COLLECT,
                secs_since_unix_epoch(drop_collect_event.timestamp),
                drop_collect_event.sender,
                drop_collect_event.reason
            )
        };
        Box::new(logger)
    }
}

impl Logger for PurgeEvidenceEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |purge_evidence_event: &PurgeEvidenceEvent| {
            log::info!(
                "{}, {}, {}",
                PURGE_EVIDENCE,
                secs_since_unix_epoch(purge_evidence_event.timestamp),
                purge_evidence_event.up_to
            )
        };
        Box::new(logger)
    }
}

impl Logger for ProposeRegencyEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |propose_regency_event: &ProposeRegencyEvent| {
            log::info!(
                "{}, {}, {}",
                PROPOSE_REGENCY,
                secs_since_unix_epoch(propose_regency_event.timestamp),
                propose_regency_event.regency
            )
        };
        Box::new(logger)
    }
}

impl Logger for InstallRegencyEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |install_regency_event: &InstallRegencyEvent| {
            log::info!(
                "{}, {}, {}",
                INSTALL_REGENCY,
                secs_since_unix_epoch(install_regency_event.timestamp),
                install_regency_event.regency
            )
        };
        Box::new(logger)
    }
}

impl Logger for NewCheckpointEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |new_checkpoint_event: &NewCheckpointEvent| {
            log::info!(
                "{}, {}, {}",
                NEW_CHECKPOINT,
                secs_since_unix_epoch(new_checkpoint_event.timestamp),
                new_checkpoint_event.checkpoint_size
            )
        };
        Box::new(logger)
    }
}

impl Logger for BuildTransferableStateEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |build_event: &BuildTransferableStateEvent| {
            log::info!(
                "{}, {}, {}, {}",
                BUILD_TRANSFERABLE_STATE,
                secs_since_unix_epoch(build_event.timestamp),
                build_event.target_eid,
                build_event.batches
            )
        };
        Box::new(logger)
    }
}

impl Logger for InstallTransferableStateEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |install_event: &InstallTransferableStateEvent| {
            log::info!(
                "{}, {}, {}, {}, {}",
                INSTALL_TRANSFERABLE_STATE,
                secs_since_unix_epoch(install_event.timestamp),
                install_event.last_checkpoint_eid,
                install_event.last_eid,
                install_event.batches
            )
        };
        Box::new(logger)
    }
}

// Get a more readable representation of a bytesequence by base64-encoding it and taking the first 7 characters.
pub(crate) fn first_seven_base64_chars(bytes: &[u8]) -> String {
    let encoded = STANDARD_NO_PAD.encode(bytes);
    if encoded.len() > 7 {
        encoded[0..7].to_string()
    } else {
        encoded
    }
}

fn secs_since_unix_epoch(timestamp: SystemTime) -> u64 {
    timestamp
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|duration| duration.as_secs())
        .unwrap_or(0)
}
