//! Connection state machine (component C5): negotiates the tunnel-metadata option, clears stale
//! state after (re)connecting, and gates when the reconciliation engine is allowed to run.

use crate::cfg_tracker::CfgTracker;
use crate::ctzone::CtZoneMap;
use crate::error::FsmError;
use crate::ratelimit;
use ovs::{ErrorKind, InMessage, OutMessage, Transport, Xid};

/// `(class, type, length)` of the tunnel-metadata option this controller negotiates.
pub const TLV_OPTION_CLASS: u16 = 0x0102;
pub const TLV_OPTION_TYPE: u8 = 0x80;
pub const TLV_OPTION_LEN: u8 = 32;
pub const TLV_SLOT_COUNT: u16 = 64;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum State {
    New,
    TlvReq { req_xid: Xid },
    TlvMod { mod_xid: Xid, barrier_xid: Xid },
    Clear,
    Update,
}

pub struct ConnFsm {
    state: State,
    /// Field id reported to callers (`MFF_TUN_METADATA0 + index`), 0 when unusable.
    mf_field_id: u32,
    /// Set on every entry to `Clear`; cleared by the engine after its first successful `put`.
    forced_reinstall: bool,
}

impl ConnFsm {
    pub fn new() -> ConnFsm {
        ConnFsm { state: State::New, mf_field_id: 0, forced_reinstall: false }
    }

    pub fn is_update(&self) -> bool {
        matches!(self.state, State::Update)
    }

    pub fn is_clear(&self) -> bool {
        matches!(self.state, State::Clear)
    }

    pub fn forced_reinstall(&self) -> bool {
        self.forced_reinstall
    }

    pub fn clear_forced_reinstall(&mut self) {
        self.forced_reinstall = false;
    }

    /// `get_mf_field_id`: 0 unless the connection has finished clearing/negotiating.
    pub fn mf_field_id(&self) -> u32 {
        match self.state {
            State::Clear | State::Update => self.mf_field_id,
            _ => 0,
        }
    }

    /// Resets to `S_NEW`, as required whenever the transport's `connection_seqno` advances.
    pub fn reset(&mut self) {
        self.state = State::New;
        self.mf_field_id = 0;
    }

    fn enter_clear(&mut self) {
        self.state = State::Clear;
        self.forced_reinstall = true;
    }

    /// Advances the state machine by one step, sending whatever message is owed for the current
    /// state. No-op in states that only react to messages.
    pub fn tick(&mut self, transport: &mut dyn Transport) {
        match self.state {
            State::New => {
                let xid = transport.send(OutMessage::TlvTableRequest);
                self.state = State::TlvReq { req_xid: xid };
            }
            State::Clear => {
                transport.send(OutMessage::FlowDeleteAll);
                transport.send(OutMessage::GroupDeleteAll);
                transport.send(OutMessage::MeterDeleteAll);
                self.state = State::Update;
            }
            State::TlvReq { .. } | State::TlvMod { .. } | State::Update => {}
        }
    }

    /// Handles one received message, given mutable access to the config tracker and
    /// conntrack-zone map so barrier replies in `S_UPDATE` can be resolved inline.
    pub fn handle_message(
        &mut self,
        transport: &mut dyn Transport,
        cfg: &mut CfgTracker,
        ct_zones: &mut CtZoneMap,
        msg: InMessage,
    ) {
        match &msg {
            InMessage::EchoRequest { xid: _, data } => {
                transport.send(OutMessage::EchoReply { data: data.clone() });
                return;
            }
            InMessage::Error { kind, .. } => {
                if !self.handle_error_for_state(transport, *kind, &msg) {
                    if ratelimit::allow("ofp-error") {
                        tracing::event!(tracing::Level::WARN, "switch reported error: {}", kind);
                    }
                }
                return;
            }
            _ => {}
        }

        match self.state {
            State::TlvReq { req_xid } => {
                if let InMessage::TlvTableReply { xid, mappings } = &msg {
                    if *xid == req_xid {
                        self.on_tlv_table_reply(transport, mappings);
                    }
                }
            }
            State::TlvMod { barrier_xid, .. } => {
                if let InMessage::BarrierReply { xid } = &msg {
                    if *xid == barrier_xid {
                        self.enter_clear();
                    }
                }
            }
            State::Update => {
                if let InMessage::BarrierReply { xid } = &msg {
                    if cfg.ack_barrier(*xid) {
                        ct_zones.ack_barrier(*xid);
                    }
                }
            }
            State::New | State::Clear => {}
        }
    }

    /// Returns `true` if the error was handled as part of the negotiation protocol (so the
    /// generic rate-limited log should be skipped).
    fn handle_error_for_state(
        &mut self,
        _transport: &mut dyn Transport,
        kind: ErrorKind,
        msg: &InMessage,
    ) -> bool {
        let xid = match msg {
            InMessage::Error { xid, .. } => *xid,
            _ => return false,
        };
        match self.state {
            State::TlvMod { mod_xid, .. } if mod_xid == xid => {
                if kind.is_tlv_negotiation_race() {
                    self.state = State::New;
                } else {
                    let err = FsmError::TlvNegotiationFailed(kind.to_string());
                    tracing::event!(tracing::Level::ERROR, %err, "disabling tunnel-metadata option");
                    self.mf_field_id = 0;
                    self.enter_clear();
                }
                true
            }
            _ => false,
        }
    }

    fn on_tlv_table_reply(
        &mut self,
        transport: &mut dyn Transport,
        mappings: &[ovs::message::TlvTableMapping],
    ) {
        let existing = mappings
            .iter()
            .find(|m| m.option_class == TLV_OPTION_CLASS && m.option_type == TLV_OPTION_TYPE && m.option_len == TLV_OPTION_LEN);
        if let Some(m) = existing {
            self.mf_field_id = mf_tun_metadata0() + m.index as u32;
            self.enter_clear();
            return;
        }

        let used: std::collections::HashSet<u16> = mappings.iter().map(|m| m.index).collect();
        let free = (0..TLV_SLOT_COUNT).find(|i| !used.contains(i));
        match free {
            Some(index) => {
                let mod_xid = transport.send(OutMessage::TlvTableMod {
                    adds: vec![ovs::message::TlvTableModAdd {
                        option: ovs::message::TlvOption {
                            option_class: TLV_OPTION_CLASS,
                            option_type: TLV_OPTION_TYPE,
                            option_len: TLV_OPTION_LEN,
                        },
                        index,
                    }],
                });
                let barrier_xid = transport.send(OutMessage::Barrier);
                self.state = State::TlvMod { mod_xid, barrier_xid };
            }
            None => {
                let err = FsmError::TlvNegotiationFailed("option table is full".to_string());
                tracing::event!(tracing::Level::ERROR, %err, "disabling tunnel-metadata option");
                self.mf_field_id = 0;
                self.enter_clear();
            }
        }
    }
}

impl Default for ConnFsm {
    fn default() -> ConnFsm {
        ConnFsm::new()
    }
}

/// `MFF_TUN_METADATA0`. Kept as a function rather than a `const` only because in a full OpenFlow
/// field-id table this would be looked up, not hardcoded; here it's the single base value the
/// negotiation ever needs.
fn mf_tun_metadata0() -> u32 {
    ovs::message::MFF_TUN_METADATA0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::FakeTransport;

    #[test]
    fn new_sends_tlv_table_request() {
        let mut t = FakeTransport::new();
        let mut fsm = ConnFsm::new();
        fsm.tick(&mut t);
        assert!(matches!(fsm_state(&fsm), State::TlvReq { .. }));
        assert_eq!(t.sent.len(), 1);
    }

    fn fsm_state(fsm: &ConnFsm) -> State {
        fsm.state
    }

    #[test]
    fn reply_with_no_mapping_and_free_slot_sends_mod_and_barrier() {
        let mut t = FakeTransport::new();
        let mut fsm = ConnFsm::new();
        fsm.tick(&mut t);
        let req_xid = match fsm.state {
            State::TlvReq { req_xid } => req_xid,
            _ => panic!("expected TlvReq"),
        };
        let mut cfg = CfgTracker::new();
        let mut ct = CtZoneMap::new();
        fsm.handle_message(&mut t, &mut cfg, &mut ct, InMessage::TlvTableReply { xid: req_xid, mappings: vec![] });
        assert!(matches!(fsm.state, State::TlvMod { .. }));
        assert_eq!(t.sent.len(), 3);
    }

    #[test]
    fn clear_then_update_resets_tables_and_forces_reinstall() {
        let mut t = FakeTransport::new();
        let mut fsm = ConnFsm::new();
        fsm.enter_clear();
        fsm.tick(&mut t);
        assert!(fsm.is_update());
        assert!(fsm.forced_reinstall());
        assert_eq!(t.sent.len(), 3);
    }
}
