use std::{
    sync::{mpsc, Arc},
    thread,
    time::Duration,
};

use log::LevelFilter;
use regency_rs::{
    events::{DropCollectEvent, DropReason, InstallRegencyEvent},
    pluggables::{Digester, Sha256Digester, StaticView},
    replica::{Configuration, ReplicaSpec},
    types::data_types::{CheckpointPeriod, ExecutionId, Regency, ReplicaId},
};

mod common;

use common::{
    group::{collect, last_eid, Group},
    logging::setup_logger,
};

const EVENT_TIMEOUT: Duration = Duration::from_secs(5);

/// Four replicas move to regency 1. Three of them wrote `X` in round 1 of execution id 5, and the
/// fourth is still at execution id 4. A forged collect is dropped, and `X` binds.
#[test]
fn new_leader_reproposes_bound_value() {
    setup_logger(LevelFilter::Trace);

    let group = Group::new(4);
    let (install_sender, install_receiver) = mpsc::channel();
    let (drop_sender, drop_receiver) = mpsc::channel();

    let replica = ReplicaSpec::builder()
        .verifier(group.verifier())
        .digester(Sha256Digester)
        .view(StaticView::with_n(4))
        .configuration(
            Configuration::builder()
                .checkpoint_period(CheckpointPeriod::new(10))
                .log_events(true)
                .build(),
        )
        .on_install_regency(move |event: &InstallRegencyEvent| {
            install_sender.send(event.regency).unwrap()
        })
        .on_drop_collect(move |event: &DropCollectEvent| drop_sender.send((event.sender, event.reason)).unwrap())
        .build()
        .start()
        .unwrap();
    let leader_change = replica.leader_change();

    let regency = leader_change.propose_regency(Regency::new(1));
    assert_eq!(regency, Regency::new(1));
    for sender in 0..4 {
        leader_change.add_stop(regency, ReplicaId::new(sender));
        leader_change.add_stop(regency, ReplicaId::new(sender));
    }
    assert_eq!(leader_change.count_stops(regency), 4);

    leader_change.install_regency(regency).unwrap();
    assert_eq!(leader_change.last_regency(), regency);
    assert_eq!(
        install_receiver.recv_timeout(EVENT_TIMEOUT).unwrap(),
        regency
    );

    let digest = Sha256Digester.digest(b"X");
    // Signed with replica 3's key while claiming to come from replica 0.
    let forged = group.keypair(3).sign_collect(&collect(0, 5, (1, b"Y"), &[(1, b"Y")]));
    leader_change.add_collect(regency, forged);
    for sender in 0..3 {
        leader_change.add_collect(
            regency,
            group.signed_collect(sender, 5, (1, &digest), &[(1, b"X")]),
        );
    }
    leader_change.add_collect(regency, group.signed_collect(3, 4, (2, b"Z"), &[(2, b"Z")]));
    assert_eq!(leader_change.count_collects(regency), 5);

    let collects = leader_change
        .select_collects(regency, ExecutionId::new(5))
        .unwrap();
    assert_eq!(collects.len(), 4);
    let lagging = collects
        .iter()
        .find(|collect| collect.sender == ReplicaId::new(3))
        .unwrap();
    assert!(lagging.quorum_weaks.round.is_init());
    assert!(lagging.write_set.is_empty());

    assert!(leader_change.sound(Some(&collects)));
    assert_eq!(leader_change.bind_value(Some(&collects)), Some(b"X".to_vec()));

    assert_eq!(
        drop_receiver.recv_timeout(EVENT_TIMEOUT).unwrap(),
        (ReplicaId::new(0), DropReason::InvalidSignature)
    );
}

/// Every replica reports round 0: nothing binds, and the new leader may propose any value.
#[test]
fn unbound_collects_are_sound() {
    let group = Group::new(4);
    let replica = ReplicaSpec::builder()
        .verifier(group.verifier())
        .digester(Sha256Digester)
        .view(StaticView::with_n(4))
        .configuration(
            Configuration::builder()
                .checkpoint_period(CheckpointPeriod::new(10))
                .initial_regency(Regency::new(2))
                .log_events(false)
                .build(),
        )
        .build()
        .start()
        .unwrap();
    let leader_change = replica.leader_change();
    assert_eq!(leader_change.last_regency(), Regency::new(2));
    assert_eq!(leader_change.next_regency(), Regency::new(2));

    let regency = Regency::new(3);
    let signed: Vec<_> = (0..3)
        .map(|sender| group.signed_collect(sender, 9, (0, b""), &[]))
        .collect();

    // Three collects are exactly n - f, which is enough for `unbound` but not for `binds`.
    let collects = leader_change.select_collects_from(&signed, ExecutionId::new(9));
    assert!(leader_change.predicates().unbound(&collects));
    assert!(leader_change.sound(Some(&collects)));
    assert_eq!(leader_change.bind_value(Some(&collects)), None);

    // Two collects are too few to say anything.
    let collects = leader_change.select_collects_from(&signed[..2], ExecutionId::new(9));
    assert!(!leader_change.sound(Some(&collects)));

    assert!(leader_change.select_collects(regency, ExecutionId::new(9)).is_none());
    leader_change.set_collects(regency, signed);
    assert_eq!(
        leader_change
            .select_collects(regency, ExecutionId::new(9))
            .map(|collects| collects.len()),
        Some(3)
    );
}

#[test]
fn last_eid_evidence_is_scoped_to_its_regency() {
    let group = Group::new(4);
    let replica = ReplicaSpec::builder()
        .verifier(group.verifier())
        .digester(Sha256Digester)
        .view(StaticView::with_n(4))
        .configuration(
            Configuration::builder()
                .checkpoint_period(CheckpointPeriod::new(10))
                .log_events(false)
                .build(),
        )
        .build()
        .start()
        .unwrap();
    let leader_change = replica.leader_change();

    leader_change.add_last_eid(Regency::new(1), last_eid(0, 12, b"old"));
    leader_change.add_last_eid(Regency::new(2), last_eid(1, 10, b"a"));
    leader_change.add_last_eid(Regency::new(2), last_eid(2, 11, b"b"));
    leader_change.add_last_eid(Regency::new(2), last_eid(3, 11, b"c"));

    let highest = leader_change.highest_last_eid(Regency::new(2)).unwrap();
    assert_eq!(highest.sender, ReplicaId::new(2));
    assert_eq!(
        leader_change.last_eid_value(Regency::new(2), ExecutionId::new(11)),
        Some(b"b".to_vec())
    );
    assert_eq!(
        leader_change.last_eid_value(Regency::new(2), ExecutionId::new(12)),
        None
    );
    assert_eq!(
        leader_change.last_eid_value(Regency::new(1), ExecutionId::new(12)),
        Some(b"old".to_vec())
    );

    leader_change.install_regency(Regency::new(2)).unwrap();
    assert!(leader_change.highest_last_eid(Regency::new(1)).is_none());
    assert_eq!(leader_change.count_last_eids(Regency::new(2)), 3);
}

#[test]
fn evidence_can_be_added_concurrently() {
    let group = Arc::new(Group::new(7));
    let replica = ReplicaSpec::builder()
        .verifier(group.verifier())
        .digester(Sha256Digester)
        .view(StaticView::with_n(7))
        .configuration(
            Configuration::builder()
                .checkpoint_period(CheckpointPeriod::new(10))
                .log_events(false)
                .build(),
        )
        .build()
        .start()
        .unwrap();
    let regency = Regency::new(1);

    let handles: Vec<_> = (0..7)
        .map(|sender| {
            let leader_change = Arc::clone(replica.leader_change());
            let group = Arc::clone(&group);
            thread::spawn(move || {
                leader_change.add_stop(regency, ReplicaId::new(sender));
                leader_change.add_collect(regency, group.signed_collect(sender, 3, (0, b""), &[]));
                leader_change.add_last_eid(regency, last_eid(sender, 2, b"d"));
            })
        })
        .collect();
    handles
        .into_iter()
        .for_each(|handle| handle.join().unwrap());

    let leader_change = replica.leader_change();
    assert_eq!(leader_change.count_stops(regency), 7);
    assert_eq!(leader_change.count_collects(regency), 7);
    assert_eq!(leader_change.count_last_eids(regency), 7);
    assert_eq!(leader_change.stop_senders(regency).len(), 7);

    // (7 + 2) / 2 = 4, and all 7 report round 0.
    let collects = leader_change
        .select_collects(regency, ExecutionId::new(3))
        .unwrap();
    assert!(leader_change.sound(Some(&collects)));
}
