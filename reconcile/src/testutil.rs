//! An in-memory fake [`Transport`], used by this crate's own unit tests and by its `tests/`
//! integration tests. Not behind `#[cfg(test)]` so integration tests (which compile against this
//! crate as an external dependency) can use it too.

use ovs::{InMessage, OutMessage, Transport, Version, Xid};
use std::collections::VecDeque;

pub struct FakeTransport {
    pub sent: Vec<OutMessage>,
    pub inbox: VecDeque<InMessage>,
    pub connected: bool,
    pub version: Option<Version>,
    pub seqno: u32,
    pub tx_in_flight: u32,
    next_xid: Xid,
}

impl FakeTransport {
    pub fn new() -> FakeTransport {
        FakeTransport {
            sent: Vec::new(),
            inbox: VecDeque::new(),
            connected: true,
            version: Some(Version::Ofp13),
            seqno: 1,
            tx_in_flight: 0,
            next_xid: 1,
        }
    }

    pub fn push_reply(&mut self, msg: InMessage) {
        self.inbox.push_back(msg);
    }

    /// The xid assigned to the most recently sent message. Unlike `sent.len()`, stays correct
    /// across `sent.clear()` calls, since xids keep counting up from the transport's whole
    /// lifetime rather than from the last clear.
    pub fn last_xid(&self) -> Xid {
        self.next_xid - 1
    }

    pub fn reconnect(&mut self) {
        self.seqno += 1;
        self.sent.clear();
    }

    /// Pops the xid assigned to the most recently sent message matching `pred`, for tests that
    /// need to synthesize a reply.
    pub fn last_xid_matching(&self, mut pred: impl FnMut(&OutMessage) -> bool) -> Option<Xid> {
        self.sent.iter().enumerate().rev().find(|(_, m)| pred(m)).map(|(i, _)| i as Xid + 1)
    }
}

impl Default for FakeTransport {
    fn default() -> FakeTransport {
        FakeTransport::new()
    }
}

impl Transport for FakeTransport {
    fn connect(&mut self, _target: &str) {
        self.connected = true;
    }

    fn run(&mut self) {}

    fn recv(&mut self) -> Option<InMessage> {
        self.inbox.pop_front()
    }

    fn send(&mut self, msg: OutMessage) -> Xid {
        let xid = self.next_xid;
        self.next_xid += 1;
        self.sent.push(msg);
        xid
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn version(&self) -> Option<Version> {
        self.version
    }

    fn connection_seqno(&self) -> u32 {
        self.seqno
    }

    fn tx_in_flight(&self) -> u32 {
        self.tx_in_flight
    }
}
