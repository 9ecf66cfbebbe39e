//! End-to-end scenarios that cross module boundaries: the connection state machine driving into
//! `S_UPDATE`, followed by a `put` against the now-forced-reinstall flag, and the installed table
//! staying consistent when one of two sources sharing a key is withdrawn.

use ovs::{FlowKey, FlowModCommand, FlowValue, InMessage, Match, OutMessage, Transport};
use reconcile::engine::{put, ReconcileCore};
use reconcile::fsm::ConnFsm;
use reconcile::interfaces::MeterCatalog;
use reconcile::interfaces::MeterSpec;
use reconcile::testutil::FakeTransport;
use uuid::Uuid;

struct NoMeters;
impl MeterCatalog for NoMeters {
    fn lookup(&self, _name: &str) -> Option<MeterSpec> {
        None
    }
}

fn key(priority: u16) -> FlowKey {
    FlowKey::new(0, priority, Match::new(vec![priority as u8]))
}

fn drive_to_update(fsm: &mut ConnFsm, t: &mut FakeTransport) {
    let mut scratch = ReconcileCore::new();

    // S_NEW -> S_TLV_REQ
    fsm.tick(t);
    // Switch reports no existing mapping and plenty of free slots: S_TLV_REQ -> S_TLV_MOD.
    let req_xid = t.last_xid();
    t.push_reply(InMessage::TlvTableReply { xid: req_xid, mappings: vec![] });
    let reply = t.inbox.pop_front().unwrap();
    fsm.handle_message(t, &mut scratch.cfg, &mut scratch.ct_zones, reply);

    // Ack the mod's barrier: S_TLV_MOD -> S_CLEAR.
    let barrier_xid = t.last_xid();
    fsm.handle_message(t, &mut scratch.cfg, &mut scratch.ct_zones, InMessage::BarrierReply { xid: barrier_xid });
    assert!(fsm.is_clear());

    // S_CLEAR -> S_UPDATE, emitting the delete-all trio.
    t.sent.clear();
    fsm.tick(t);
    assert!(fsm.is_update());
    assert!(fsm.forced_reinstall());
}

#[test]
fn reconnect_forces_full_reinstall_of_every_desired_flow() {
    let mut core = ReconcileCore::new();
    let mut fsm = ConnFsm::new();
    let mut t = FakeTransport::new();

    core.desired.add(key(10), FlowValue::new(vec![0xaa], 1), Uuid::new_v4(), false);
    core.desired.add(key(20), FlowValue::new(vec![0xbb], 2), Uuid::new_v4(), false);

    drive_to_update(&mut fsm, &mut t);

    t.sent.clear();
    let emitted = put(&mut core, &mut fsm, &mut t, &NoMeters, 1);

    // Two adds (one per desired flow, no installed state survived the reconnect) plus a barrier.
    assert_eq!(emitted, 2);
    assert_eq!(t.sent.len(), 3);
    let adds: Vec<_> = t.sent.iter().filter(|m| matches!(m, OutMessage::FlowMod(fm) if fm.command == FlowModCommand::Add)).collect();
    assert_eq!(adds.len(), 2);
    assert!(matches!(t.sent.last(), Some(OutMessage::Barrier)));
    assert!(!fsm.forced_reinstall());
    assert!(core.installed.get(&key(10)).is_some());
    assert!(core.installed.get(&key(20)).is_some());
}

#[test]
fn withdrawing_one_of_two_sources_sharing_a_key_keeps_installed_flow() {
    let mut core = ReconcileCore::new();
    let mut fsm = ConnFsm::new();
    let mut t = FakeTransport::new();

    let sb1 = Uuid::new_v4();
    let sb2 = Uuid::new_v4();
    core.desired.add(key(10), FlowValue::new(vec![0xaa], 1), sb1, false);
    core.desired.add(key(10), FlowValue::new(vec![0xaa], 1), sb2, false);
    put(&mut core, &mut fsm, &mut t, &NoMeters, 1);
    assert!(core.installed.get(&key(10)).is_some());

    core.desired.remove_by_source(sb1);
    t.sent.clear();
    let emitted = put(&mut core, &mut fsm, &mut t, &NoMeters, 2);

    // The sb2-backed desired flow still covers the key: no delete, no change in actions.
    assert_eq!(emitted, 0);
    let installed = core.installed.get(&key(10)).expect("installed flow survives");
    assert_eq!(installed.desired_refs().len(), 1);
}

#[test]
fn nb_cfg_advances_only_once_every_outstanding_barrier_is_acked() {
    let mut core = ReconcileCore::new();
    let mut fsm = ConnFsm::new();
    let mut t = FakeTransport::new();

    drive_to_update(&mut fsm, &mut t);

    core.desired.add(key(10), FlowValue::new(vec![0xaa], 1), Uuid::new_v4(), false);
    t.sent.clear();
    put(&mut core, &mut fsm, &mut t, &NoMeters, 5);
    let first_barrier = t.last_xid();

    core.desired.add(key(20), FlowValue::new(vec![0xbb], 1), Uuid::new_v4(), false);
    put(&mut core, &mut fsm, &mut t, &NoMeters, 5);
    let second_barrier = t.last_xid();
    assert_ne!(first_barrier, second_barrier);

    // Both batches target the same nb_cfg, so the tracker collapsed them into a single
    // in-flight entry retagged to the second barrier's xid. The first (superseded) reply isn't
    // recognized and nb_cfg doesn't move yet.
    fsm.handle_message(&mut t, &mut core.cfg, &mut core.ct_zones, InMessage::BarrierReply { xid: first_barrier });
    assert_eq!(core.cfg.cur_cfg(), 0);

    // The second (live) barrier's reply resolves the retagged entry.
    fsm.handle_message(&mut t, &mut core.cfg, &mut core.ct_zones, InMessage::BarrierReply { xid: second_barrier });
    assert_eq!(core.cfg.cur_cfg(), 5);
}
