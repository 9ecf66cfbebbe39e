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

//! The wire codec boundary.
//!
//! Everything in [`crate::message`] and [`crate::flow_mod`] is already at the level of decoded
//! fields; turning that into (and out of) actual OpenFlow bytes belongs to a codec, which is
//! free to be anything from a hand-rolled encoder to a binding against a C library. [`Codec`] is
//! the seam: a [`crate::Transport`] implementation owns one and calls through it rather than
//! knowing the wire format itself.

use crate::error::CodecError;
use crate::message::{InMessage, OutMessage, Xid};

/// Encodes outbound messages and decodes inbound ones. A `Transport` implementation is generic
/// over this so the reconciliation core never has to know which concrete wire format is in use.
pub trait Codec {
    /// Encodes `msg` as a complete on-wire frame, assigning it transaction id `xid`.
    fn encode(&self, xid: Xid, msg: &OutMessage) -> Vec<u8>;

    /// Attempts to decode one complete frame from the front of `buf`. `Ok(None)` means `buf`
    /// doesn't yet hold a full frame (the caller should read more and retry); `Err` means what's
    /// there can never be completed into one (the caller should log and discard).
    fn decode(&self, buf: &[u8]) -> Result<Option<(InMessage, usize)>, CodecError>;
}
