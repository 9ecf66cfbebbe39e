//! Typed errors for the reconciliation core's fallible leaf operations.
//!
//! The driver and engine wrap these in `anyhow::Result` with `.context(...)` at the call sites
//! that need a human-readable chain; callers that only care whether something is retryable can
//! still match on the concrete variant.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExtTableError {
    #[error("meter spec '{0}' has no '__string: ' sentinel and is not in the meter catalog")]
    UnknownMeter(String),
    #[error("group spec '{0}' could not be parsed")]
    BadGroupSpec(String),
}

#[derive(Error, Debug)]
pub enum PacketInjectError {
    #[error("no interface with iface-id '{0}' on this bridge")]
    UnknownIfaceId(String),
    #[error("interface '{0}' has no assigned ofport")]
    NoOfport(String),
    #[error("interface '{0}' resolved to out-of-range ofport {1} (>= OFPP_MAX)")]
    OfportOutOfRange(String, u32),
    #[error("microflow expression could not be parsed: {0}")]
    BadExpression(String),
    #[error("not connected to the switch")]
    NotConnected,
}

#[derive(Error, Debug)]
pub enum FsmError {
    #[error("tunnel-metadata negotiation failed: {0}")]
    TlvNegotiationFailed(String),
}
