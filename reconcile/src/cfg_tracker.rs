//! Config-generation tracker (component C7): a FIFO of in-flight barrier transactions tagged
//! with the upstream configuration number they correspond to, and the `cur_cfg` watermark that
//! advances as barrier replies come back.

use ovs::Xid;
use std::collections::VecDeque;

pub struct CfgTracker {
    cur_cfg: i64,
    in_flight: VecDeque<(Xid, i64)>,
}

impl CfgTracker {
    pub fn new() -> CfgTracker {
        CfgTracker { cur_cfg: 0, in_flight: VecDeque::new() }
    }

    pub fn cur_cfg(&self) -> i64 {
        self.cur_cfg
    }

    /// Called after a `put` that produced at least one message: `xid` is the trailing barrier's
    /// transaction id, `nb_cfg` the configuration generation it corresponds to.
    pub fn record_batch(&mut self, xid: Xid, nb_cfg: i64) {
        match self.in_flight.back_mut() {
            Some((last_xid, last_cfg)) if *last_cfg > nb_cfg => {
                tracing::event!(
                    tracing::Level::WARN,
                    "nb_cfg regressed from {} to {}, dropping stale in-flight entry",
                    last_cfg,
                    nb_cfg
                );
                *last_xid = xid;
                *last_cfg = nb_cfg;
            }
            Some((last_xid, last_cfg)) if *last_cfg == nb_cfg => {
                // Needed another round of messages to reach the same generation; only the xid
                // that will actually be acknowledged changes.
                *last_xid = xid;
            }
            _ => self.in_flight.push_back((xid, nb_cfg)),
        }
    }

    /// Called after a `put` that produced no messages. If nothing is in flight, the generation
    /// is trivially already reached. If something is in flight, retag its target generation so
    /// the next barrier reply resolves both.
    pub fn record_no_op(&mut self, nb_cfg: i64) {
        match self.in_flight.back_mut() {
            Some((_, last_cfg)) => *last_cfg = nb_cfg,
            None => self.cur_cfg = self.cur_cfg.max(nb_cfg),
        }
    }

    /// A barrier reply arrived with `xid`. If it matches the head of the queue, pop it and
    /// advance `cur_cfg`. Returns whether the xid was recognized.
    pub fn ack_barrier(&mut self, xid: Xid) -> bool {
        if matches!(self.in_flight.front(), Some((front_xid, _)) if *front_xid == xid) {
            let (_, cfg) = self.in_flight.pop_front().unwrap();
            self.cur_cfg = self.cur_cfg.max(cfg);
            true
        } else {
            false
        }
    }

    /// On reconnect: all in-flight updates are void, since the switch's actual state is unknown.
    pub fn reset(&mut self) {
        self.in_flight.clear();
    }

    pub fn in_flight_len(&self) -> usize {
        self.in_flight.len()
    }
}

impl Default for CfgTracker {
    fn default() -> CfgTracker {
        CfgTracker::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_batches_two_barriers() {
        let mut t = CfgTracker::new();
        t.record_batch(1, 5);
        t.record_batch(2, 5);
        // same nb_cfg as the trailing entry: xid retagged, not appended
        assert_eq!(t.in_flight_len(), 1);
        assert!(t.ack_barrier(2));
        assert_eq!(t.cur_cfg(), 5);
    }

    #[test]
    fn noop_jump_waits_for_outstanding_barrier() {
        let mut t = CfgTracker::new();
        t.record_batch(1, 5);
        t.record_no_op(6);
        assert_eq!(t.cur_cfg(), 0);
        assert!(t.ack_barrier(1));
        assert_eq!(t.cur_cfg(), 6);
    }

    #[test]
    fn noop_with_empty_queue_jumps_immediately() {
        let mut t = CfgTracker::new();
        t.record_no_op(3);
        assert_eq!(t.cur_cfg(), 3);
    }

    #[test]
    fn regression_is_dropped_and_warned() {
        let mut t = CfgTracker::new();
        t.record_batch(1, 10);
        t.record_batch(2, 3);
        assert_eq!(t.in_flight_len(), 1);
        assert!(t.ack_barrier(2));
        assert_eq!(t.cur_cfg(), 3);
    }
}
