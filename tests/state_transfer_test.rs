use std::{sync::mpsc, thread, time::Duration};

use log::LevelFilter;
use regency_rs::{
    events::{BuildTransferableStateEvent, InstallTransferableStateEvent},
    pluggables::{Sha256Digester, StaticView},
    replica::{Configuration, ReplicaSpec},
    state_transfer::{shared::SharedStateLog, transferable::TransferableState},
    types::data_types::{CheckpointPeriod, ExecutionId, ReplicaId, Round},
};

mod common;

use common::{group::Group, logging::setup_logger};

const EVENT_TIMEOUT: Duration = Duration::from_secs(5);

fn eid(int: u64) -> ExecutionId {
    ExecutionId::new(int)
}

/// A replica that applied batches 11 to 13 after its checkpoint at execution id 10 brings another
/// replica up to execution id 12 over the wire.
#[test]
fn lagging_replica_catches_up_from_transferable_state() {
    setup_logger(LevelFilter::Trace);

    let group = Group::new(4);
    let (build_sender, build_receiver) = mpsc::channel();
    let (install_sender, install_receiver) = mpsc::channel();
    let configuration = Configuration::builder()
        .checkpoint_period(CheckpointPeriod::new(5))
        .log_events(true)
        .build();

    let up_to_date = ReplicaSpec::builder()
        .verifier(group.verifier())
        .digester(Sha256Digester)
        .view(StaticView::with_n(4))
        .configuration(configuration.clone())
        .on_build_transferable_state(move |event: &BuildTransferableStateEvent| {
            build_sender.send((event.target_eid, event.batches)).unwrap()
        })
        .build()
        .start()
        .unwrap();
    let lagging = ReplicaSpec::builder()
        .verifier(group.verifier())
        .digester(Sha256Digester)
        .view(StaticView::with_n(4))
        .configuration(configuration)
        .on_install_transferable_state(move |event: &InstallTransferableStateEvent| {
            install_sender.send(event.last_eid).unwrap()
        })
        .build()
        .start()
        .unwrap();

    // The thread applying decisions and the thread serving requests share the log.
    let applier = up_to_date.state_log().clone();
    thread::spawn(move || {
        applier.new_checkpoint(b"state at 10".to_vec());
        applier.set_last_checkpoint_eid(eid(10));
        for i in 11..=13 {
            assert!(applier.append_batch(format!("b{i}").into_bytes(), Round::new(1), ReplicaId::new(0)));
        }
    })
    .join()
    .unwrap();

    let server = up_to_date.state_log();
    assert_eq!(server.last_eid(), Some(eid(13)));
    assert!(server.build_transferable_state(eid(9)).is_none());

    let bytes = server.build_transferable_state(eid(12)).unwrap().to_bytes();
    assert_eq!(build_receiver.recv_timeout(EVENT_TIMEOUT).unwrap(), (eid(12), 2));

    let state = TransferableState::from_bytes(&bytes).unwrap();
    let client = lagging.state_log();
    client.install_transferable_state(state);
    assert_eq!(install_receiver.recv_timeout(EVENT_TIMEOUT).unwrap(), eid(12));

    assert_eq!(client.checkpoint(), Some(b"state at 10".to_vec()));
    assert_eq!(client.last_checkpoint_eid(), Some(eid(10)));
    assert_eq!(client.last_eid(), Some(eid(12)));
    for i in 11..=12 {
        assert_eq!(client.batch(eid(i)), server.batch(eid(i)));
    }
    assert!(client.batch(eid(13)).is_none());

    // The lagging replica keeps applying from where the snapshot left off.
    assert!(client.append_batch(b"b13".to_vec(), Round::new(1), ReplicaId::new(0)));
    assert_eq!(client.last_eid(), Some(eid(13)));
    assert_eq!(client.batch(eid(13)), server.batch(eid(13)));
}

#[test]
fn target_beyond_last_batch_ships_everything() {
    let log = SharedStateLog::new(CheckpointPeriod::new(5)).unwrap();
    log.new_checkpoint(b"S0".to_vec());
    log.set_last_checkpoint_eid(eid(0));
    for i in 1..=2 {
        log.append_batch(vec![i], Round::new(0), ReplicaId::new(1));
    }

    let state = log.build_transferable_state(eid(7)).unwrap();
    assert_eq!(state.batches().len(), 2);
    assert_eq!(state.last_eid(), eid(7));
    assert_eq!(state.last_checkpoint_eid(), eid(0));
}

#[test]
fn corrupted_transferable_state_is_rejected() {
    let log = SharedStateLog::new(CheckpointPeriod::new(3)).unwrap();
    log.new_checkpoint(b"S".to_vec());
    log.set_last_checkpoint_eid(eid(4));
    let bytes = log.build_transferable_state(eid(4)).unwrap().to_bytes();

    assert!(TransferableState::from_bytes(&bytes[..bytes.len() / 2]).is_err());
}

#[test]
fn zero_checkpoint_period_fails_to_start() {
    let group = Group::new(1);
    let replica = ReplicaSpec::builder()
        .verifier(group.verifier())
        .digester(Sha256Digester)
        .view(StaticView::with_n(1))
        .configuration(
            Configuration::builder()
                .checkpoint_period(CheckpointPeriod::new(0))
                .log_events(false)
                .build(),
        )
        .build()
        .start();

    assert!(replica.is_err());
}
