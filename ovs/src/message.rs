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

//! Message classification and the outbound message vocabulary the core emits.
//!
//! Encoding and decoding of the actual wire bytes is the job of an external codec
//! (`crate::codec::Codec`); this module carries only what the reconciliation core needs to
//! decide what to send next and how to interpret what came back.

use crate::error::ErrorKind;
use crate::flow_mod::FlowMod;

/// OpenFlow transaction id.
pub type Xid = u32;

/// `MFF_TUN_METADATA0`, the base field id of the tunnel-metadata register block. A negotiated
/// option at slot `index` is addressed as `MFF_TUN_METADATA0 + index`.
pub const MFF_TUN_METADATA0: u32 = 0x7014;

/// The dispatch tag a codec's `decode_type` hands back for a received message. Mirrors
/// `enum ofptype` closely enough for the handful of cases the core branches on; everything else
/// collapses to `Other`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum OfpType {
    EchoRequest,
    EchoReply,
    Error,
    Barrier,
    NxtTlvTableReply,
    Other,
}

/// A message received from the switch, already classified and partially decoded by the codec.
#[derive(Clone, Debug)]
pub enum InMessage {
    EchoRequest { xid: Xid, data: Vec<u8> },
    Error { xid: Xid, kind: ErrorKind },
    BarrierReply { xid: Xid },
    TlvTableReply { xid: Xid, mappings: Vec<TlvTableMapping> },
    Other { xid: Xid, type_: OfpType },
}

/// One `(option_class, option_type, option_len) -> index` mapping reported by
/// `OFPMP_TLV_TABLE_REPLY` / `NXT_TLV_TABLE_REPLY`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct TlvTableMapping {
    pub option_class: u16,
    pub option_type: u8,
    pub option_len: u8,
    pub index: u16,
}

/// A single `(class, type, len)` tunnel-metadata option, as negotiated in
/// [`crate::tlv`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct TlvOption {
    pub option_class: u16,
    pub option_type: u8,
    pub option_len: u8,
}

/// One slot add requested in an `NXT_TLV_TABLE_MOD`.
#[derive(Clone, Copy, Debug)]
pub struct TlvTableModAdd {
    pub option: TlvOption,
    pub index: u16,
}

/// A message the core wants to send. The transport hands this to the codec for encoding.
#[derive(Clone, Debug)]
pub enum OutMessage {
    FlowMod(FlowMod),
    GroupAdd { table_id: u32, name: String },
    GroupDelete { table_id: u32 },
    MeterAdd { table_id: u32, name: String, unit: String, bands: Vec<MeterBand> },
    MeterDelete { table_id: u32 },
    FlowDeleteAll,
    GroupDeleteAll,
    MeterDeleteAll,
    ConntrackFlush { zone: u16 },
    PacketOut { in_port: u32, packet: Vec<u8> },
    Barrier,
    EchoReply { data: Vec<u8> },
    TlvTableRequest,
    TlvTableMod { adds: Vec<TlvTableModAdd> },
}

#[derive(Clone, Debug, PartialEq)]
pub struct MeterBand {
    pub type_: String,
    pub rate: u32,
    pub burst: u32,
}
