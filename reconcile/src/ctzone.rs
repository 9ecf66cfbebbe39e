//! The conntrack-zone map: an externally-owned collection of zones pending a flush, each
//! carrying a tiny state machine of its own so the engine can back-patch the barrier xid once
//! the flush has actually been queued for transmission.

use ovs::Xid;
use std::collections::HashMap;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CtZoneState {
    /// Waiting for the engine to emit a flush.
    Queued,
    /// Flush emitted; `of_xid` names the barrier that will confirm it (0 until back-patched).
    Sent(Xid),
    /// The flush has been confirmed by a barrier reply; waiting for the caller to persist that
    /// fact externally (e.g. in a database row) before the entry is dropped from this map.
    DbQueued,
}

#[derive(Default)]
pub struct CtZoneMap {
    zones: HashMap<u16, CtZoneState>,
}

impl CtZoneMap {
    pub fn new() -> CtZoneMap {
        CtZoneMap::default()
    }

    pub fn queue(&mut self, zone: u16) {
        self.zones.entry(zone).or_insert(CtZoneState::Queued);
    }

    pub fn state(&self, zone: u16) -> Option<CtZoneState> {
        self.zones.get(&zone).copied()
    }

    pub fn queued_zones(&self) -> Vec<u16> {
        self.zones
            .iter()
            .filter(|(_, s)| **s == CtZoneState::Queued)
            .map(|(z, _)| *z)
            .collect()
    }

    pub fn mark_sent(&mut self, zone: u16, xid: Xid) {
        self.zones.insert(zone, CtZoneState::Sent(xid));
    }

    /// Back-patches every zone still at `Sent(0)` to the just-assigned barrier xid.
    pub fn backpatch_sent_xid(&mut self, xid: Xid) {
        for state in self.zones.values_mut() {
            if *state == CtZoneState::Sent(0) {
                *state = CtZoneState::Sent(xid);
            }
        }
    }

    /// Promotes every zone whose `Sent` xid matches the acknowledged barrier to `DbQueued`.
    pub fn ack_barrier(&mut self, xid: Xid) {
        for state in self.zones.values_mut() {
            if *state == CtZoneState::Sent(xid) {
                *state = CtZoneState::DbQueued;
            }
        }
    }

    /// On reconnect, demote any in-flight flush back to `Queued` since the switch's state is
    /// unknown again.
    pub fn demote_sent_to_queued(&mut self) {
        for state in self.zones.values_mut() {
            if matches!(state, CtZoneState::Sent(_)) {
                *state = CtZoneState::Queued;
            }
        }
    }

    pub fn remove(&mut self, zone: u16) {
        self.zones.remove(&zone);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifecycle() {
        let mut m = CtZoneMap::new();
        m.queue(5);
        assert_eq!(m.queued_zones(), vec![5]);
        m.mark_sent(5, 0);
        m.backpatch_sent_xid(42);
        assert_eq!(m.state(5), Some(CtZoneState::Sent(42)));
        m.ack_barrier(42);
        assert_eq!(m.state(5), Some(CtZoneState::DbQueued));
    }

    #[test]
    fn reconnect_demotes_sent() {
        let mut m = CtZoneMap::new();
        m.queue(1);
        m.mark_sent(1, 7);
        m.demote_sent_to_queued();
        assert_eq!(m.state(1), Some(CtZoneState::Queued));
    }
}
