/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Methods to build and start the recovery components of a replica.
//!
//! A replica that takes part in leader changes and state transfer owns one
//! [`LeaderChangeManager`] and one [`SharedStateLog`]. This module wires them up with the replica's
//! [configuration](Configuration) and, if any handler is registered or logging is enabled, with an
//! event bus thread that dispatches their [events](crate::events).
//!
//! ## Starting a replica
//!
//! ```ignore
//! let replica =
//!     ReplicaSpec::builder()
//!     .verifier(verifier)
//!     .digester(Sha256Digester)
//!     .view(StaticView::with_n(4))
//!     .configuration(configuration)
//!     .on_install_regency(install_regency_handler)
//!     .build()
//!     .start()?;
//! ```
//!
//! ### Required setters
//!
//! - `.verifier(...)`
//! - `.digester(...)`
//! - `.view(...)`
//! - `.configuration(...)`
//!
//! ### Optional setters
//!
//! The optional setters register user-defined event handlers for events from [crate::events]:
//! - `.on_receive_stop(...)`
//! - `.on_receive_collect(...)`
//! - `.on_receive_last_eid(...)`
//! - `.on_drop_collect(...)`
//! - `.on_purge_evidence(...)`
//! - `.on_propose_regency(...)`
//! - `.on_install_regency(...)`
//! - `.on_new_checkpoint(...)`
//! - `.on_build_transferable_state(...)`
//! - `.on_install_transferable_state(...)`
//!
//! The replica's [configuration](Configuration) is also defined using the builder pattern:
//!
//! ```ignore
//! let configuration =
//!     Configuration::builder()
//!     .checkpoint_period(CheckpointPeriod::new(100))
//!     .initial_regency(Regency::init())
//!     .log_events(true)
//!     .build()
//! ```

use std::{
    sync::{
        mpsc::{self, Sender},
        Arc,
    },
    thread::JoinHandle,
};

use typed_builder::TypedBuilder;

use crate::{
    event_bus::*,
    events::*,
    leader_change::{LeaderChangeConfiguration, LeaderChangeManager},
    pluggables::{Digester, SignatureVerifier, ViewConfiguration},
    state_transfer::{
        shared::SharedStateLog,
        state_log::{StateLog, StateLogError},
        StateLogConfiguration,
    },
    types::data_types::{CheckpointPeriod, Regency},
};

/// Stores the user-defined parameters required to start the replica, that is:
/// 1. The checkpoint period, i.e., the number of consensus instances between two checkpoints. The
///    state log keeps one batch less than this.
/// 2. The regency the replica starts in.
/// 3. The "Log Events" flag, if set to "true" then logs should be printed.
///
/// ## Log Events
///
/// This crate logs using the [log](https://docs.rs/log/latest/log/) crate. To get these messages
/// printed onto a terminal or to a file, set up a [logging
/// implementation](https://docs.rs/log/latest/log/#available-logging-implementations).
#[derive(Clone, TypedBuilder)]
#[builder(builder_method(doc = "
    Create a builder for building a [Configuration]. On the builder call the following methods to construct a valid [Configuration].

    Required:
    - `.checkpoint_period(...)`
    - `.log_events(...)`

    Optional:
    - `.initial_regency(...)`
"))]
pub struct Configuration {
    #[builder(setter(doc = "Set the number of consensus instances between two checkpoints. Must be at least 1. Required."))]
    pub checkpoint_period: CheckpointPeriod,
    #[builder(default = Regency::init(), setter(doc = "Set the regency the replica starts in. Defaults to regency 0."))]
    pub initial_regency: Regency,
    #[builder(setter(doc = "Enable logging? Required."))]
    pub log_events: bool,
}

impl Into<(LeaderChangeConfiguration, StateLogConfiguration)> for Configuration {
    fn into(self) -> (LeaderChangeConfiguration, StateLogConfiguration) {
        let leader_change_config = LeaderChangeConfiguration {
            initial_regency: self.initial_regency,
        };
        let state_log_config = StateLogConfiguration {
            checkpoint_period: self.checkpoint_period,
        };
        (leader_change_config, state_log_config)
    }
}

/// Stores all parameters and trait implementations required to start a [Replica].
#[derive(TypedBuilder)]
#[builder(builder_method(doc = "
    Create a builder for building a [ReplicaSpec]. On the builder call the following methods to construct a valid [ReplicaSpec].

    Required:
    - `.verifier(...)`
    - `.digester(...)`
    - `.view(...)`
    - `.configuration(...)`

    Optional:
    - `.on_receive_stop(...)`
    - `.on_receive_collect(...)`
    - `.on_receive_last_eid(...)`
    - `.on_drop_collect(...)`
    - `.on_purge_evidence(...)`
    - `.on_propose_regency(...)`
    - `.on_install_regency(...)`
    - `.on_new_checkpoint(...)`
    - `.on_build_transferable_state(...)`
    - `.on_install_transferable_state(...)`
"))]
pub struct ReplicaSpec<S: SignatureVerifier, H: Digester, W: ViewConfiguration> {
    // Required parameters
    #[builder(setter(doc = "Set the verifier of signed collects and decision proofs. The argument must implement the [SignatureVerifier](crate::pluggables::SignatureVerifier) trait. Required."))]
    verifier: S,
    #[builder(setter(doc = "Set the digest function used to compare write-set values. The argument must implement the [Digester](crate::pluggables::Digester) trait. Required."))]
    digester: H,
    #[builder(setter(doc = "Set the source of the current view's `n` and `f`. The argument must implement the [ViewConfiguration](crate::pluggables::ViewConfiguration) trait. Required."))]
    view: W,
    #[builder(setter(doc = "Set the [configuration](Configuration). Required."))]
    configuration: Configuration,
    // Optional parameters
    #[builder(default, setter(transform = |handler: impl Fn(&ReceiveStopEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<ReceiveStopEvent>),
    doc = "Register a handler closure to be invoked after a new STOP vote is stored. Optional."))]
    on_receive_stop: Option<HandlerPtr<ReceiveStopEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&ReceiveCollectEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<ReceiveCollectEvent>),
    doc = "Register a handler closure to be invoked after a new signed collect is stored. Optional."))]
    on_receive_collect: Option<HandlerPtr<ReceiveCollectEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&ReceiveLastEidEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<ReceiveLastEidEvent>),
    doc = "Register a handler closure to be invoked after a new last-eid report is stored. Optional."))]
    on_receive_last_eid: Option<HandlerPtr<ReceiveLastEidEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&DropCollectEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<DropCollectEvent>),
    doc = "Register a handler closure to be invoked after a signed collect fails verification. Optional."))]
    on_drop_collect: Option<HandlerPtr<DropCollectEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&PurgeEvidenceEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<PurgeEvidenceEvent>),
    doc = "Register a handler closure to be invoked after evidence for old regencies is discarded. Optional."))]
    on_purge_evidence: Option<HandlerPtr<PurgeEvidenceEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&ProposeRegencyEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<ProposeRegencyEvent>),
    doc = "Register a handler closure to be invoked after the replica proposes its next regency. Optional."))]
    on_propose_regency: Option<HandlerPtr<ProposeRegencyEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&InstallRegencyEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<InstallRegencyEvent>),
    doc = "Register a handler closure to be invoked after the replica installs a regency. Optional."))]
    on_install_regency: Option<HandlerPtr<InstallRegencyEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&NewCheckpointEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<NewCheckpointEvent>),
    doc = "Register a handler closure to be invoked after a checkpoint is stored in the state log. Optional."))]
    on_new_checkpoint: Option<HandlerPtr<NewCheckpointEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&BuildTransferableStateEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<BuildTransferableStateEvent>),
    doc = "Register a handler closure to be invoked after a transferable state is built for another replica. Optional."))]
    on_build_transferable_state: Option<HandlerPtr<BuildTransferableStateEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&InstallTransferableStateEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<InstallTransferableStateEvent>),
    doc = "Register a handler closure to be invoked after a received transferable state is installed. Optional."))]
    on_install_transferable_state: Option<HandlerPtr<InstallTransferableStateEvent>>,
}

impl<S: SignatureVerifier, H: Digester, W: ViewConfiguration> ReplicaSpec<S, H, W> {
    /// Create the replica's components and, if needed, start the event bus thread.
    ///
    /// Fails if the configured checkpoint period is 0.
    pub fn start(self) -> Result<Replica<S, H, W>, StateLogError> {
        let log_events = self.configuration.log_events;
        let (leader_change_config, state_log_config) = self.configuration.into();
        let state_log = StateLog::new(state_log_config.checkpoint_period)?;

        let event_handlers = EventHandlers::new(
            log_events,
            self.on_receive_stop,
            self.on_receive_collect,
            self.on_receive_last_eid,
            self.on_drop_collect,
            self.on_purge_evidence,
            self.on_propose_regency,
            self.on_install_regency,
            self.on_new_checkpoint,
            self.on_build_transferable_state,
            self.on_install_transferable_state,
        );

        let (event_publisher, event_subscriber) = if !event_handlers.is_empty() {
            Some(mpsc::channel()).unzip()
        } else {
            (None, None)
        };

        let leader_change = Arc::new(
            LeaderChangeManager::new(leader_change_config, self.verifier, self.digester, self.view)
                .with_event_publisher(event_publisher.clone()),
        );
        let state_log = SharedStateLog::from_state_log(state_log, event_publisher);

        let (event_bus, event_bus_shutdown) = match event_subscriber {
            Some(event_subscriber) => {
                let (event_bus_shutdown, event_bus_shutdown_receiver) = mpsc::channel();
                let event_bus =
                    start_event_bus(event_handlers, event_subscriber, event_bus_shutdown_receiver);
                (Some(event_bus), Some(event_bus_shutdown))
            }
            None => (None, None),
        };

        Ok(Replica {
            leader_change,
            state_log,
            event_bus,
            event_bus_shutdown,
        })
    }
}

/// A handle to the recovery components of a replica. When this value is dropped, the event bus
/// thread (if any) is shut down.
pub struct Replica<S: SignatureVerifier, H: Digester, W: ViewConfiguration> {
    leader_change: Arc<LeaderChangeManager<S, H, W>>,
    state_log: SharedStateLog,
    event_bus: Option<JoinHandle<()>>,
    event_bus_shutdown: Option<Sender<()>>,
}

impl<S: SignatureVerifier, H: Digester, W: ViewConfiguration> Replica<S, H, W> {
    /// The replica's leader-change state. Clone the `Arc` to use it from other threads.
    pub fn leader_change(&self) -> &Arc<LeaderChangeManager<S, H, W>> {
        &self.leader_change
    }

    /// The replica's state log. Clones share the same log.
    pub fn state_log(&self) -> &SharedStateLog {
        &self.state_log
    }
}

impl<S: SignatureVerifier, H: Digester, W: ViewConfiguration> Drop for Replica<S, H, W> {
    fn drop(&mut self) {
        // The event bus may already have exited if every publisher is gone, so send errors are ignored.
        if let Some(shutdown) = self.event_bus_shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(event_bus) = self.event_bus.take() {
            if event_bus.join().is_err() {
                log::error!("Event bus thread panicked");
            }
        }
    }
}
