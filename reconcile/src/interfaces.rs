//! External collaborators the engine and packet injector read from but never own: the meter
//! catalog and the bridge's port/interface list. Production wires these to whatever holds the
//! logical network state; tests provide trivial in-memory implementations.

use ovs::message::MeterBand;

pub struct MeterSpec {
    pub unit: String,
    pub bands: Vec<MeterBand>,
}

/// Resolves a meter name to its spec, for meter names that aren't an inline `"__string: "`
/// sentinel spec.
pub trait MeterCatalog {
    fn lookup(&self, name: &str) -> Option<MeterSpec>;
}

/// One bridge interface, as needed to resolve a logical `iface-id` to a physical ingress port.
pub struct Interface {
    pub iface_id: String,
    pub ofport: Option<u32>,
}

/// `OFPP_MAX`: the first of OpenFlow's reserved port numbers (`OFPP_IN_PORT`, `OFPP_CONTROLLER`,
/// etc. all sit at or above this). A real physical or internal ofport is always below it.
pub const OFPP_MAX: u32 = 0xffffff00;

pub trait Bridge {
    fn interfaces(&self) -> &[Interface];

    fn ofport_for_iface_id(&self, iface_id: &str) -> Result<u32, crate::error::PacketInjectError> {
        let iface = self
            .interfaces()
            .iter()
            .find(|i| i.iface_id == iface_id)
            .ok_or_else(|| crate::error::PacketInjectError::UnknownIfaceId(iface_id.to_string()))?;
        let ofport = iface.ofport.ok_or_else(|| crate::error::PacketInjectError::NoOfport(iface_id.to_string()))?;
        if ofport >= OFPP_MAX {
            return Err(crate::error::PacketInjectError::OfportOutOfRange(iface_id.to_string(), ofport));
        }
        Ok(ofport)
    }
}

/// The reserved prefix marking an inline meter spec rather than a catalog name, and the byte
/// offset into the name at which the encoded spec begins.
pub const METER_INLINE_SENTINEL: &str = "__string: ";
