//! A minimal wire codec for the agent's own management-socket traffic.
//!
//! This is intentionally narrow: it frames the common 8-byte OpenFlow header (version, type,
//! length, xid) faithfully, but the message bodies for anything beyond echo/barrier/hello are
//! just the already-opaque match/action byte blobs the reconciliation core carries around
//! (see `ovs::key::Match`), concatenated with a small fixed prefix. A deployment that needs full
//! OXM/group/meter wire conformance links a real codec crate against [`ovs::Codec`] instead of
//! this one.

use ovs::message::{MeterBand, TlvTableMapping};
use ovs::{Codec, CodecError, ErrorKind, FlowMod, FlowModCommand, InMessage, OutMessage, Xid};

const OFP_VERSION: u8 = 0x04;

const T_HELLO: u8 = 0;
const T_ECHO_REQUEST: u8 = 2;
const T_ECHO_REPLY: u8 = 3;
const T_ERROR: u8 = 1;
const T_FLOW_MOD: u8 = 14;
const T_GROUP_MOD: u8 = 15;
const T_PACKET_OUT: u8 = 13;
const T_BARRIER_REQUEST: u8 = 20;
const T_BARRIER_REPLY: u8 = 21;
const T_METER_MOD: u8 = 29;
const T_NXT_TLV_TABLE_MOD: u8 = 200;
const T_NXT_TLV_TABLE_REPLY: u8 = 201;
const T_CT_FLUSH: u8 = 202;

const HEADER_LEN: usize = 8;

pub struct BasicCodec;

impl BasicCodec {
    pub fn new() -> BasicCodec {
        BasicCodec
    }

    fn header(type_: u8, xid: Xid, body_len: usize) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_LEN + body_len);
        out.push(OFP_VERSION);
        out.push(type_);
        out.extend_from_slice(&((HEADER_LEN + body_len) as u16).to_be_bytes());
        out.extend_from_slice(&xid.to_be_bytes());
        out
    }
}

impl Default for BasicCodec {
    fn default() -> BasicCodec {
        BasicCodec::new()
    }
}

impl Codec for BasicCodec {
    fn encode(&self, xid: Xid, msg: &OutMessage) -> Vec<u8> {
        match msg {
            OutMessage::EchoReply { data } => {
                let mut out = Self::header(T_ECHO_REPLY, xid, data.len());
                out.extend_from_slice(data);
                out
            }
            OutMessage::Barrier => Self::header(T_BARRIER_REQUEST, xid, 0),
            OutMessage::TlvTableRequest => {
                Self::header(T_NXT_TLV_TABLE_MOD, xid, 0)
            }
            OutMessage::TlvTableMod { adds } => {
                let mut body = Vec::new();
                for add in adds {
                    body.extend_from_slice(&add.option.option_class.to_be_bytes());
                    body.push(add.option.option_type);
                    body.push(add.option.option_len);
                    body.extend_from_slice(&add.index.to_be_bytes());
                }
                let mut out = Self::header(T_NXT_TLV_TABLE_MOD, xid, body.len());
                out.extend_from_slice(&body);
                out
            }
            OutMessage::FlowMod(fm) => {
                let body = encode_flow_mod(fm);
                let mut out = Self::header(T_FLOW_MOD, xid, body.len());
                out.extend_from_slice(&body);
                out
            }
            OutMessage::FlowDeleteAll => {
                let fm = FlowMod { key: ovs::FlowKey::new(0xff, 0, ovs::Match::new(Vec::new())), command: FlowModCommand::DeleteStrict, actions: None, cookie: 0 };
                let body = encode_flow_mod(&fm);
                let mut out = Self::header(T_FLOW_MOD, xid, body.len());
                out.extend_from_slice(&body);
                out
            }
            OutMessage::GroupAdd { table_id, name } => {
                let mut body = table_id.to_be_bytes().to_vec();
                body.extend_from_slice(name.as_bytes());
                let mut out = Self::header(T_GROUP_MOD, xid, body.len());
                out.extend_from_slice(&body);
                out
            }
            OutMessage::GroupDelete { table_id } => {
                let mut out = Self::header(T_GROUP_MOD, xid, 4);
                out.extend_from_slice(&table_id.to_be_bytes());
                out
            }
            OutMessage::GroupDeleteAll => Self::header(T_GROUP_MOD, xid, 0),
            OutMessage::MeterAdd { table_id, name, unit, bands } => {
                let mut body = table_id.to_be_bytes().to_vec();
                body.extend_from_slice(unit.as_bytes());
                body.push(0);
                body.extend_from_slice(name.as_bytes());
                body.push(0);
                for band in bands {
                    encode_meter_band(&mut body, band);
                }
                let mut out = Self::header(T_METER_MOD, xid, body.len());
                out.extend_from_slice(&body);
                out
            }
            OutMessage::MeterDelete { table_id } => {
                let mut out = Self::header(T_METER_MOD, xid, 4);
                out.extend_from_slice(&table_id.to_be_bytes());
                out
            }
            OutMessage::MeterDeleteAll => Self::header(T_METER_MOD, xid, 0),
            OutMessage::ConntrackFlush { zone } => {
                let mut out = Self::header(T_CT_FLUSH, xid, 2);
                out.extend_from_slice(&zone.to_be_bytes());
                out
            }
            OutMessage::PacketOut { in_port, packet } => {
                let mut body = in_port.to_be_bytes().to_vec();
                body.extend_from_slice(packet);
                let mut out = Self::header(T_PACKET_OUT, xid, body.len());
                out.extend_from_slice(&body);
                out
            }
        }
    }

    fn decode(&self, buf: &[u8]) -> Result<Option<(InMessage, usize)>, CodecError> {
        if buf.len() < HEADER_LEN {
            return Ok(None);
        }
        let type_ = buf[1];
        let len = u16::from_be_bytes([buf[2], buf[3]]) as usize;
        if len < HEADER_LEN {
            return Err(CodecError(format!("frame claims length {len}, shorter than the header itself")));
        }
        if buf.len() < len {
            return Ok(None);
        }
        let xid = u32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]);
        let body = &buf[HEADER_LEN..len];

        let msg = match type_ {
            T_ECHO_REQUEST => InMessage::EchoRequest { xid, data: body.to_vec() },
            T_ERROR => {
                if body.len() >= 4 {
                    let kind = ErrorKind {
                        type_: u16::from_be_bytes([body[0], body[1]]),
                        code: u16::from_be_bytes([body[2], body[3]]),
                    };
                    InMessage::Error { xid, kind }
                } else {
                    InMessage::Other { xid, type_: ovs::OfpType::Error }
                }
            }
            T_BARRIER_REPLY => InMessage::BarrierReply { xid },
            T_NXT_TLV_TABLE_REPLY => {
                let mut mappings = Vec::new();
                let mut i = 0;
                while i + 6 <= body.len() {
                    mappings.push(TlvTableMapping {
                        option_class: u16::from_be_bytes([body[i], body[i + 1]]),
                        option_type: body[i + 2],
                        option_len: body[i + 3],
                        index: u16::from_be_bytes([body[i + 4], body[i + 5]]),
                    });
                    i += 6;
                }
                InMessage::TlvTableReply { xid, mappings }
            }
            T_HELLO => InMessage::Other { xid, type_: ovs::OfpType::Other },
            _ => InMessage::Other { xid, type_: ovs::OfpType::Other },
        };
        Ok(Some((msg, len)))
    }
}

fn encode_flow_mod(fm: &FlowMod) -> Vec<u8> {
    let mut body = Vec::new();
    body.push(match fm.command {
        FlowModCommand::Add => 0,
        FlowModCommand::ModifyStrict => 1,
        FlowModCommand::DeleteStrict => 2,
    });
    body.push(fm.key.table_id);
    body.extend_from_slice(&fm.key.priority.to_be_bytes());
    body.extend_from_slice(&fm.cookie.to_be_bytes());
    body.extend_from_slice(&(fm.key.match_.0.len() as u16).to_be_bytes());
    body.extend_from_slice(&fm.key.match_.0);
    if let Some(actions) = &fm.actions {
        body.extend_from_slice(&(actions.len() as u16).to_be_bytes());
        body.extend_from_slice(actions);
    }
    body
}

fn encode_meter_band(body: &mut Vec<u8>, band: &MeterBand) {
    body.extend_from_slice(band.type_.as_bytes());
    body.push(0);
    body.extend_from_slice(&band.rate.to_be_bytes());
    body.extend_from_slice(&band.burst.to_be_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn barrier_round_trips_xid() {
        let codec = BasicCodec::new();
        let frame = codec.encode(42, &OutMessage::Barrier);
        assert_eq!(frame[1], T_BARRIER_REQUEST);
        assert_eq!(u32::from_be_bytes([frame[4], frame[5], frame[6], frame[7]]), 42);
    }

    #[test]
    fn decode_needs_full_frame() {
        let codec = BasicCodec::new();
        let frame = codec.encode(1, &OutMessage::Barrier);
        assert!(codec.decode(&frame[..4]).unwrap().is_none());
    }

    #[test]
    fn echo_request_decodes_with_payload() {
        let codec = BasicCodec::new();
        let mut frame = vec![OFP_VERSION, T_ECHO_REQUEST, 0, 0, 0, 0, 0, 7];
        frame.extend_from_slice(b"ab");
        let len = frame.len() as u16;
        frame[2] = (len >> 8) as u8;
        frame[3] = (len & 0xff) as u8;
        let (msg, consumed) = codec.decode(&frame).unwrap().unwrap();
        assert_eq!(consumed, frame.len());
        assert!(matches!(msg, InMessage::EchoRequest { xid: 7, .. }));
    }

    #[test]
    fn frame_claiming_length_shorter_than_header_is_a_codec_error() {
        let codec = BasicCodec::new();
        let frame = vec![OFP_VERSION, T_ECHO_REQUEST, 0, 3, 0, 0, 0, 7];
        assert!(codec.decode(&frame).is_err());
    }
}
