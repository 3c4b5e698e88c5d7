/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Thread that receives published [events](crate::events) and fires the registered handlers.

use std::{
    sync::mpsc::{Receiver, RecvTimeoutError, TryRecvError},
    thread::{self, JoinHandle},
    time::Duration,
};

use crate::{events::*, logging::Logger};

pub(crate) type HandlerPtr<T> = Box<dyn Fn(&T) + Send>;

/// How long the event bus waits for an event before checking for the shutdown signal again.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

pub(crate) struct EventHandlers {
    pub(crate) receive_stop_handlers: Vec<HandlerPtr<ReceiveStopEvent>>,
    pub(crate) receive_collect_handlers: Vec<HandlerPtr<ReceiveCollectEvent>>,
    pub(crate) receive_last_eid_handlers: Vec<HandlerPtr<ReceiveLastEidEvent>>,
    pub(crate) drop_collect_handlers: Vec<HandlerPtr<DropCollectEvent>>,
    pub(crate) purge_evidence_handlers: Vec<HandlerPtr<PurgeEvidenceEvent>>,
    pub(crate) propose_regency_handlers: Vec<HandlerPtr<ProposeRegencyEvent>>,
    pub(crate) install_regency_handlers: Vec<HandlerPtr<InstallRegencyEvent>>,
    pub(crate) new_checkpoint_handlers: Vec<HandlerPtr<NewCheckpointEvent>>,
    pub(crate) build_transferable_state_handlers: Vec<HandlerPtr<BuildTransferableStateEvent>>,
    pub(crate) install_transferable_state_handlers:
        Vec<HandlerPtr<InstallTransferableStateEvent>>,
}

impl EventHandlers {
    /// Combine the default loggers (if `log_events`) with the user-provided handlers.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        log_events: bool,
        receive_stop_handler: Option<HandlerPtr<ReceiveStopEvent>>,
        receive_collect_handler: Option<HandlerPtr<ReceiveCollectEvent>>,
        receive_last_eid_handler: Option<HandlerPtr<ReceiveLastEidEvent>>,
        drop_collect_handler: Option<HandlerPtr<DropCollectEvent>>,
        purge_evidence_handler: Option<HandlerPtr<PurgeEvidenceEvent>>,
        propose_regency_handler: Option<HandlerPtr<ProposeRegencyEvent>>,
        install_regency_handler: Option<HandlerPtr<InstallRegencyEvent>>,
        new_checkpoint_handler: Option<HandlerPtr<NewCheckpointEvent>>,
        build_transferable_state_handler: Option<HandlerPtr<BuildTransferableStateEvent>>,
        install_transferable_state_handler: Option<HandlerPtr<InstallTransferableStateEvent>>,
    ) -> Self {
        Self {
            receive_stop_handlers: handlers(log_events, receive_stop_handler),
            receive_collect_handlers: handlers(log_events, receive_collect_handler),
            receive_last_eid_handlers: handlers(log_events, receive_last_eid_handler),
            drop_collect_handlers: handlers(log_events, drop_collect_handler),
            purge_evidence_handlers: handlers(log_events, purge_evidence_handler),
            propose_regency_handlers: handlers(log_events, propose_regency_handler),
            install_regency_handlers: handlers(log_events, install_regency_handler),
            new_checkpoint_handlers: handlers(log_events, new_checkpoint_handler),
            build_transferable_state_handlers: handlers(
                log_events,
                build_transferable_state_handler,
            ),
            install_transferable_state_handlers: handlers(
                log_events,
                install_transferable_state_handler,
            ),
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.receive_stop_handlers.is_empty()
            && self.receive_collect_handlers.is_empty()
            && self.receive_last_eid_handlers.is_empty()
            && self.drop_collect_handlers.is_empty()
            && self.purge_evidence_handlers.is_empty()
            && self.propose_regency_handlers.is_empty()
            && self.install_regency_handlers.is_empty()
            && self.new_checkpoint_handlers.is_empty()
            && self.build_transferable_state_handlers.is_empty()
            && self.install_transferable_state_handlers.is_empty()
    }

    pub(crate) fn fire_handlers(&self, event: Event) {
        match event {
            Event::ReceiveStop(receive_stop_event) => self
                .receive_stop_handlers
                .iter()
                .for_each(|handler| handler(&receive_stop_event)),

            Event::ReceiveCollect(receive_collect_event) => self
                .receive_collect_handlers
                .iter()
                .for_each(|handler| handler(&receive_collect_event)),

            Event::ReceiveLastEid(receive_last_eid_event) => self
                .receive_last_eid_handlers
                .iter()
                .for_each(|handler| handler(&receive_last_eid_event)),

            Event::DropCollect(drop_collect_event) => self
                .drop_collect_handlers
                .iter()
                .for_each(|handler| handler(&drop_collect_event)),

            Event::PurgeEvidence(purge_evidence_event) => self
                .purge_evidence_handlers
                .iter()
                .for_each(|handler| handler(&purge_evidence_event)),

            Event::ProposeRegency(propose_regency_event) => self
                .propose_regency_handlers
                .iter()
                .for_each(|handler| handler(&propose_regency_event)),

            Event::InstallRegency(install_regency_event) => self
                .install_regency_handlers
                .iter()
                .for_each(|handler| handler(&install_regency_event)),

            Event::NewCheckpoint(new_checkpoint_event) => self
                .new_checkpoint_handlers
                .iter()
                .for_each(|handler| handler(&new_checkpoint_event)),

            Event::BuildTransferableState(build_event) => self
                .build_transferable_state_handlers
                .iter()
                .for_each(|handler| handler(&build_event)),

            Event::InstallTransferableState(install_event) => self
                .install_transferable_state_handlers
                .iter()
                .for_each(|handler| handler(&install_event)),
        }
    }
}

/// The default logger for `T` (if `log_events`), followed by the user's handler (if any).
fn handlers<T: Logger + 'static>(
    log_events: bool,
    user_handler: Option<HandlerPtr<T>>,
) -> Vec<HandlerPtr<T>> {
    let mut handlers = Vec::new();
    if log_events {
        handlers.push(T::get_logger());
    }
    if let Some(handler) = user_handler {
        handlers.push(handler);
    }
    handlers
}

/// Start the event bus thread. It runs until `shutdown_signal` receives a message or is dropped, or
/// until every publisher of `event_subscriber` is gone.
pub(crate) fn start_event_bus(
    event_handlers: EventHandlers,
    event_subscriber: Receiver<Event>,
    shutdown_signal: Receiver<()>,
) -> JoinHandle<()> {
    thread::spawn(move || loop {
        match shutdown_signal.try_recv() {
            Ok(()) | Err(TryRecvError::Disconnected) => return,
            Err(TryRecvError::Empty) => (),
        }

        match event_subscriber.recv_timeout(POLL_INTERVAL) {
            Ok(event) => event_handlers.fire_handlers(event),
            Err(RecvTimeoutError::Timeout) => (),
            Err(RecvTimeoutError::Disconnected) => return,
        }
    })
}
