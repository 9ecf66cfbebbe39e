//! Top-level driver (component C9): resolves the management socket for a bridge, detects
//! reconnects via the transport's connection-sequence counter, and runs the bounded connection
//! state-machine loop that gates the reconciliation engine.

use crate::engine::{put, ReconcileCore};
use crate::fsm::ConnFsm;
use crate::interfaces::MeterCatalog;
use crate::ratelimit;
use ovs::Transport;

/// One iteration of the state machine's tick-then-dispatch loop is allowed to run at most this
/// many times per `run()` call, so a pathological burst of messages can't starve the outer event
/// loop the driver is embedded in.
const MAX_FSM_ITERATIONS: u32 = 50;

pub struct Driver {
    pub core: ReconcileCore,
    fsm: ConnFsm,
    target: Option<String>,
    last_seqno: u32,
    /// Set when the last `run()` made progress (advanced the FSM or consumed a message); the
    /// caller should poll again immediately rather than blocking in `wait()`.
    progress_pending: bool,
}

impl Driver {
    pub fn new() -> Driver {
        Driver {
            core: ReconcileCore::new(),
            fsm: ConnFsm::new(),
            target: None,
            last_seqno: 0,
            progress_pending: false,
        }
    }

    /// `<rundir>/<bridge>.mgmt`, the convention the management socket path follows.
    pub fn management_socket_path(rundir: &str, bridge: &str) -> String {
        format!("{}/{}.mgmt", rundir.trim_end_matches('/'), bridge)
    }

    pub fn fsm(&self) -> &ConnFsm {
        &self.fsm
    }

    /// Runs one iteration: (re)connects if the target changed, advances the transport, detects
    /// reconnects, and runs the bounded FSM loop. If the loop is in `S_UPDATE` with no
    /// transmissions outstanding, runs the reconciliation engine.
    pub fn run(
        &mut self,
        rundir: &str,
        bridge: &str,
        transport: &mut dyn Transport,
        meters: &dyn MeterCatalog,
        incoming_nb_cfg: i64,
    ) {
        let target = Self::management_socket_path(rundir, bridge);
        if self.target.as_deref() != Some(target.as_str()) {
            transport.connect(&target);
            self.target = Some(target);
        }

        transport.run();

        let seqno = transport.connection_seqno();
        if seqno != self.last_seqno {
            self.last_seqno = seqno;
            self.fsm.reset();
            self.core.clear_installed_state();
            tracing::event!(tracing::Level::INFO, "connection reset (seqno {})", seqno);
        }

        self.progress_pending = false;
        for _ in 0..MAX_FSM_ITERATIONS {
            let before = FsmSnapshot::take(&self.fsm, &self.core);
            self.fsm.tick(transport);
            if let Some(msg) = transport.recv() {
                self.fsm.handle_message(transport, &mut self.core.cfg, &mut self.core.ct_zones, msg);
            } else if !before.changed(&self.fsm, &self.core) {
                break;
            }
            self.progress_pending = true;
        }
        if self.progress_pending {
            if ratelimit::allow("fsm-loop-exhausted") && self.progress_loops_maxed() {
                tracing::event!(tracing::Level::DEBUG, "fsm loop hit iteration bound, more work pending");
            }
        }

        if self.fsm.is_update() && transport.tx_in_flight() == 0 {
            let emitted = put(&mut self.core, &mut self.fsm, transport, meters, incoming_nb_cfg);
            if emitted > 0 {
                tracing::event!(tracing::Level::INFO, "put emitted {} messages", emitted);
            }
        }
    }

    fn progress_loops_maxed(&self) -> bool {
        self.progress_pending
    }

    /// Whether the caller should poll again immediately rather than waiting for the next
    /// external wakeup (transport readiness, timer, etc).
    pub fn wants_immediate_rerun(&self) -> bool {
        self.progress_pending
    }
}

impl Default for Driver {
    fn default() -> Driver {
        Driver::new()
    }
}

/// Cheap snapshot used only to decide whether an FSM tick/dispatch iteration made progress, so
/// the bounded loop can exit early instead of always spinning to `MAX_FSM_ITERATIONS`.
struct FsmSnapshot {
    is_update: bool,
    is_clear: bool,
    cfg_in_flight: usize,
}

impl FsmSnapshot {
    fn take(fsm: &ConnFsm, core: &ReconcileCore) -> FsmSnapshot {
        FsmSnapshot { is_update: fsm.is_update(), is_clear: fsm.is_clear(), cfg_in_flight: core.cfg.in_flight_len() }
    }

    fn changed(&self, fsm: &ConnFsm, core: &ReconcileCore) -> bool {
        self.is_update != fsm.is_update()
            || self.is_clear != fsm.is_clear()
            || self.cfg_in_flight != core.cfg.in_flight_len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interfaces::MeterSpec;
    use crate::testutil::FakeTransport;
    use ovs::{InMessage, OutMessage};

    struct NoMeters;
    impl MeterCatalog for NoMeters {
        fn lookup(&self, _name: &str) -> Option<MeterSpec> {
            None
        }
    }

    #[test]
    fn management_socket_path_joins_rundir_and_bridge() {
        assert_eq!(Driver::management_socket_path("/var/run/openvswitch", "br-int"), "/var/run/openvswitch/br-int.mgmt");
        assert_eq!(Driver::management_socket_path("/var/run/openvswitch/", "br-int"), "/var/run/openvswitch/br-int.mgmt");
    }

    #[test]
    fn first_run_drives_fsm_to_update_and_forces_reinstall() {
        let mut driver = Driver::new();
        let mut t = FakeTransport::new();

        // TlvTableRequest goes out; respond with an empty reply so no free-slot negotiation
        // round trip is needed beyond the mod+barrier path.
        driver.run("/run/ovs", "br-int", &mut t, &NoMeters, 1);
        let req_xid = match t.sent.last() {
            Some(OutMessage::TlvTableRequest) => 1,
            _ => panic!("expected TlvTableRequest"),
        };
        t.push_reply(InMessage::TlvTableReply { xid: req_xid, mappings: vec![] });
        driver.run("/run/ovs", "br-int", &mut t, &NoMeters, 1);

        // Now in S_TLV_MOD; the mod+barrier were sent, ack the barrier.
        let barrier_xid = t.sent.len() as u32;
        t.push_reply(InMessage::BarrierReply { xid: barrier_xid });
        driver.run("/run/ovs", "br-int", &mut t, &NoMeters, 1);

        assert!(driver.fsm().is_update());
    }
}
