/*
Copyright (c) 2022 VMware, Inc.
SPDX-License-Identifier: MIT
Permission is hereby granted, free of charge, to any person obtaining a copy
of this software and associated documentation files (the "Software"), to deal
in the Software without restriction, including without limitation the rights
to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
copies of the Software, and to permit persons to whom the Software is
furnished to do so, subject to the following conditions:
The above copyright notice and this permission notice shall be included in all
copies or substantial portions of the Software.
THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
SOFTWARE.
 */

//! The reconnecting OpenFlow message channel the core is driven over.
//!
//! Upstream OVS implements this as `struct rconn`, a C object owning a socket, a backoff timer
//! and a transmit queue. The core never needs those details: it only needs the handful of
//! observations `rconn_*` exposes (is it connected? what version did we negotiate? has it
//! silently reconnected since we last looked? how many of our sends are still buffered?), so
//! [`Transport`] narrows that down to a trait the core can be driven against without linking
//! against OVS at all. Production code implements this over a real `rconn`-equivalent; tests
//! implement it with an in-memory fake.

use crate::message::{InMessage, OutMessage, Xid};
use crate::protocol::Version;

/// An OpenFlow connection that reconnects itself on failure and exposes just enough state for
/// the core to notice when that happened.
pub trait Transport {
    /// (Re)point the connection at `target` (e.g. `unix:/run/openvswitch/br0.mgmt`).
    fn connect(&mut self, target: &str);

    /// Advance the connection's internal state machine (socket I/O, backoff). Must be called
    /// once per driver tick before `recv`/`send` are meaningful.
    fn run(&mut self);

    /// Non-blocking receive of the next already-decoded message, if any is queued.
    fn recv(&mut self) -> Option<InMessage>;

    /// Encode and enqueue `msg` for transmission, returning the transaction id assigned to it.
    fn send(&mut self, msg: OutMessage) -> Xid;

    fn is_connected(&self) -> bool;

    /// Negotiated OpenFlow version, meaningful only once `is_connected()`.
    fn version(&self) -> Option<Version>;

    /// Monotonically increasing counter that advances every time the underlying connection is
    /// replaced (reconnects, including the very first connect). The driver compares this against
    /// its last-observed value to notice reconnects without the transport having to push an
    /// explicit event.
    fn connection_seqno(&self) -> u32;

    /// Number of messages handed to `send` that the transport has not yet confirmed delivered.
    /// The reconciliation engine's preconditions require this to be zero before starting a new
    /// `put`, per the relaxed gating rule in the design notes.
    fn tx_in_flight(&self) -> u32;
}
