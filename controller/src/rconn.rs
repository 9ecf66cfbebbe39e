//! A concrete, reconnecting [`ovs::Transport`] over a Unix-domain management socket.
//!
//! Mirrors upstream OVS's `struct rconn`: own the socket, reconnect with backoff on failure, and
//! expose a `connection_seqno` that bumps on every reconnect so a driver can notice without the
//! transport having to push an explicit event. Wire encoding is delegated to an injected
//! [`ovs::Codec`] rather than baked in here, since that's the seam the core was built against.

use std::collections::VecDeque;
use std::io::{ErrorKind as IoErrorKind, Read, Write};
use std::os::unix::net::UnixStream;
use std::time::{Duration, Instant};

use ovs::{Codec, InMessage, OutMessage, Transport, Version, Xid};
use tracing::{event, Level};

const MIN_BACKOFF: Duration = Duration::from_millis(1000);
const MAX_BACKOFF: Duration = Duration::from_secs(8);

enum Conn {
    Idle,
    Connected(UnixStream),
    Backoff { until: Instant },
}

pub struct UnixRconn {
    target: Option<String>,
    conn: Conn,
    codec: Box<dyn Codec>,
    backoff: Duration,
    next_xid: Xid,
    seqno: u32,
    tx_in_flight: u32,
    read_buf: Vec<u8>,
    inbox: VecDeque<InMessage>,
}

impl UnixRconn {
    pub fn new(codec: Box<dyn Codec>) -> UnixRconn {
        UnixRconn {
            target: None,
            conn: Conn::Idle,
            codec,
            backoff: MIN_BACKOFF,
            next_xid: 1,
            seqno: 0,
            tx_in_flight: 0,
            read_buf: Vec::new(),
            inbox: VecDeque::new(),
        }
    }

    fn alloc_xid(&mut self) -> Xid {
        let xid = self.next_xid;
        self.next_xid = self.next_xid.wrapping_add(1).max(1);
        xid
    }

    fn try_connect(&mut self, target: &str) {
        let path = target.strip_prefix("unix:").unwrap_or(target);
        match UnixStream::connect(path) {
            Ok(stream) => {
                if let Err(err) = stream.set_nonblocking(true) {
                    event!(Level::WARN, %err, "failed to set management socket nonblocking");
                }
                self.conn = Conn::Connected(stream);
                self.seqno = self.seqno.wrapping_add(1);
                self.backoff = MIN_BACKOFF;
                self.tx_in_flight = 0;
                self.read_buf.clear();
                self.inbox.clear();
                event!(Level::INFO, target, "connected to management socket");
            }
            Err(err) => {
                event!(Level::WARN, target, %err, "management socket connect failed, backing off");
                self.conn = Conn::Backoff { until: Instant::now() + self.backoff };
                self.backoff = (self.backoff * 2).min(MAX_BACKOFF);
            }
        }
    }

    fn drain_socket(&mut self) {
        let stream = match &mut self.conn {
            Conn::Connected(stream) => stream,
            _ => return,
        };
        let mut chunk = [0u8; 4096];
        loop {
            match stream.read(&mut chunk) {
                Ok(0) => {
                    event!(Level::WARN, "management socket closed by peer");
                    self.conn = Conn::Backoff { until: Instant::now() + self.backoff };
                    self.backoff = (self.backoff * 2).min(MAX_BACKOFF);
                    return;
                }
                Ok(n) => self.read_buf.extend_from_slice(&chunk[..n]),
                Err(err) if err.kind() == IoErrorKind::WouldBlock => break,
                Err(err) => {
                    event!(Level::WARN, %err, "management socket read failed");
                    self.conn = Conn::Backoff { until: Instant::now() + self.backoff };
                    self.backoff = (self.backoff * 2).min(MAX_BACKOFF);
                    return;
                }
            }
        }
        loop {
            match self.codec.decode(&self.read_buf) {
                Ok(Some((msg, consumed))) => {
                    self.read_buf.drain(..consumed);
                    self.inbox.push_back(msg);
                }
                Ok(None) => break,
                Err(err) => {
                    event!(Level::WARN, %err, "discarding unparseable management-socket data");
                    self.read_buf.clear();
                    break;
                }
            }
        }
    }
}

impl Transport for UnixRconn {
    fn connect(&mut self, target: &str) {
        if self.target.as_deref() != Some(target) {
            self.target = Some(target.to_string());
            self.conn = Conn::Idle;
            self.backoff = MIN_BACKOFF;
        }
    }

    fn run(&mut self) {
        let target = match self.target.clone() {
            Some(t) => t,
            None => return,
        };
        let should_connect = match &self.conn {
            Conn::Idle => true,
            Conn::Backoff { until } => Instant::now() >= *until,
            Conn::Connected(_) => false,
        };
        if should_connect {
            self.try_connect(&target);
        } else if self.is_connected() {
            self.drain_socket();
        }
    }

    fn recv(&mut self) -> Option<InMessage> {
        self.inbox.pop_front()
    }

    fn send(&mut self, msg: OutMessage) -> Xid {
        let xid = self.alloc_xid();
        let frame = self.codec.encode(xid, &msg);
        if let Conn::Connected(stream) = &mut self.conn {
            self.tx_in_flight += 1;
            match stream.write_all(&frame) {
                // A Unix-domain socket write that completes synchronously has already handed the
                // bytes to the kernel; there's no further async queue to track.
                Ok(()) => self.tx_in_flight -= 1,
                Err(err) => {
                    event!(Level::WARN, %err, "management socket write failed");
                    self.conn = Conn::Backoff { until: Instant::now() + self.backoff };
                    self.backoff = (self.backoff * 2).min(MAX_BACKOFF);
                }
            }
        }
        xid
    }

    fn is_connected(&self) -> bool {
        matches!(self.conn, Conn::Connected(_))
    }

    fn version(&self) -> Option<Version> {
        if self.is_connected() {
            Some(Version::FLOW_MOD)
        } else {
            None
        }
    }

    fn connection_seqno(&self) -> u32 {
        self.seqno
    }

    fn tx_in_flight(&self) -> u32 {
        self.tx_in_flight
    }
}
