//! Packet injector (component C8): parses a human-readable microflow expression against a symbol
//! table, resolves its logical ingress port, and sends the resulting packet-out.

use std::collections::HashMap;

use crate::error::PacketInjectError;
use crate::interfaces::Bridge;
use ovs::{OutMessage, Transport};

/// A fully-parsed microflow: the logical ingress interface and the raw packet bytes to inject.
pub struct Microflow {
    pub iface_id: String,
    pub packet: Vec<u8>,
}

/// Named byte strings a microflow expression's `payload` field can reference by `$name` instead
/// of spelling out hex bytes inline — the address/port-group tables the expression is evaluated
/// against.
#[derive(Default)]
pub struct SymbolTable(HashMap<String, Vec<u8>>);

impl SymbolTable {
    pub fn new() -> SymbolTable {
        SymbolTable::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Vec<u8>) {
        self.0.insert(name.into(), value);
    }

    pub fn resolve(&self, name: &str) -> Option<&[u8]> {
        self.0.get(name).map(Vec::as_slice)
    }
}

/// Parses a `key=value,key=value` microflow expression into a [`Microflow`]. Recognized keys:
/// `inport` (a logical `iface-id`) and `payload` (either colon-separated hex bytes, or `$name`
/// looked up in `symbols`). Both must appear exactly once.
pub fn parse_microflow(expr: &str, symbols: &SymbolTable) -> Result<Microflow, PacketInjectError> {
    let bad = || PacketInjectError::BadExpression(expr.to_string());
    let mut iface_id: Option<String> = None;
    let mut packet: Option<Vec<u8>> = None;
    for field in expr.split(',') {
        let field = field.trim();
        if field.is_empty() {
            continue;
        }
        let (key, value) = field.split_once('=').ok_or_else(bad)?;
        match key.trim() {
            "inport" => iface_id = Some(value.trim().to_string()),
            "payload" => packet = Some(parse_payload(value.trim(), symbols).ok_or_else(bad)?),
            _ => return Err(bad()),
        }
    }
    Ok(Microflow { iface_id: iface_id.ok_or_else(bad)?, packet: packet.ok_or_else(bad)? })
}

fn parse_payload(value: &str, symbols: &SymbolTable) -> Option<Vec<u8>> {
    if let Some(name) = value.strip_prefix('$') {
        return symbols.resolve(name).map(|b| b.to_vec());
    }
    value.split(':').map(|b| u8::from_str_radix(b, 16).ok()).collect()
}

const PACKET_LEN: usize = 64;

/// Composes a packet-out from `flow` and sends it with a single resubmit-to-table-0 action.
/// Fails if the interface can't be resolved to an `ofport` or the connection isn't up.
pub fn inject(
    bridge: &dyn Bridge,
    transport: &mut dyn Transport,
    flow: &Microflow,
) -> Result<(), PacketInjectError> {
    if !transport.is_connected() {
        return Err(PacketInjectError::NotConnected);
    }
    let in_port = bridge.ofport_for_iface_id(&flow.iface_id)?;
    let packet = pad_to_packet_len(&flow.packet);
    transport.send(OutMessage::PacketOut { in_port, packet });
    Ok(())
}

fn pad_to_packet_len(packet: &[u8]) -> Vec<u8> {
    let mut v = packet.to_vec();
    v.resize(PACKET_LEN, 0);
    v.truncate(PACKET_LEN);
    v
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interfaces::Interface;
    use crate::testutil::FakeTransport;

    struct FixedIfaces(Vec<Interface>);
    impl Bridge for FixedIfaces {
        fn interfaces(&self) -> &[Interface] {
            &self.0
        }
    }

    #[test]
    fn resolves_iface_and_sends_packet_out() {
        let bridge = FixedIfaces(vec![Interface { iface_id: "lsp1".to_string(), ofport: Some(3) }]);
        let mut t = FakeTransport::new();
        let flow = Microflow { iface_id: "lsp1".to_string(), packet: vec![1, 2, 3] };
        inject(&bridge, &mut t, &flow).unwrap();
        match &t.sent[0] {
            OutMessage::PacketOut { in_port, packet } => {
                assert_eq!(*in_port, 3);
                assert_eq!(packet.len(), PACKET_LEN);
            }
            _ => panic!("expected PacketOut"),
        }
    }

    #[test]
    fn expression_with_inline_hex_payload_parses() {
        let symbols = SymbolTable::new();
        let flow = parse_microflow("inport=lsp1, payload=01:02:03", &symbols).unwrap();
        assert_eq!(flow.iface_id, "lsp1");
        assert_eq!(flow.packet, vec![1, 2, 3]);
    }

    #[test]
    fn expression_with_symbol_reference_resolves_through_table() {
        let mut symbols = SymbolTable::new();
        symbols.insert("arp_probe", vec![0xaa, 0xbb]);
        let flow = parse_microflow("inport=lsp1,payload=$arp_probe", &symbols).unwrap();
        assert_eq!(flow.packet, vec![0xaa, 0xbb]);
    }

    #[test]
    fn expression_missing_inport_is_a_bad_expression() {
        let symbols = SymbolTable::new();
        assert!(matches!(
            parse_microflow("payload=01", &symbols),
            Err(PacketInjectError::BadExpression(_))
        ));
    }

    #[test]
    fn expression_with_unresolvable_symbol_is_a_bad_expression() {
        let symbols = SymbolTable::new();
        assert!(matches!(
            parse_microflow("inport=lsp1,payload=$missing", &symbols),
            Err(PacketInjectError::BadExpression(_))
        ));
    }

    #[test]
    fn not_connected_errors_before_resolving_the_interface() {
        let bridge = FixedIfaces(vec![]);
        let mut t = FakeTransport::new();
        t.connected = false;
        let flow = Microflow { iface_id: "lsp1".to_string(), packet: vec![] };
        assert!(matches!(inject(&bridge, &mut t, &flow), Err(PacketInjectError::NotConnected)));
    }

    #[test]
    fn unknown_iface_id_errors() {
        let bridge = FixedIfaces(vec![]);
        let mut t = FakeTransport::new();
        let flow = Microflow { iface_id: "missing".to_string(), packet: vec![] };
        assert!(matches!(inject(&bridge, &mut t, &flow), Err(PacketInjectError::UnknownIfaceId(_))));
    }

    #[test]
    fn ofport_at_or_above_ofpp_max_is_out_of_range() {
        let bridge = FixedIfaces(vec![Interface {
            iface_id: "lsp1".to_string(),
            ofport: Some(crate::interfaces::OFPP_MAX),
        }]);
        let mut t = FakeTransport::new();
        let flow = Microflow { iface_id: "lsp1".to_string(), packet: vec![] };
        assert!(matches!(inject(&bridge, &mut t, &flow), Err(PacketInjectError::OfportOutOfRange(_, _))));
    }
}
