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

//! Decoded OpenFlow `OFPT_ERROR` payloads.
//!
//! The wire-level `(type, code)` pair is supplied by the codec; this module only classifies it
//! for the handful of cases the core cares about (the TLV-table negotiation race, and generic
//! logging).

use std::fmt;

/// A decoded `OFPET_*` / `OFPxxxC_*` error pair, carried by `InMessage::Error`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ErrorKind {
    pub type_: u16,
    pub code: u16,
}

/// `OFPET_TLV_TABLE_MOD_FAILED`.
pub const OFPET_TLV_TABLE_MOD_FAILED: u16 = 0x0018;
/// `OFPTLVTMFC_ALREADY_MAPPED`: the requested (class, type) is already mapped to an index.
pub const OFPTLVTMFC_ALREADY_MAPPED: u16 = 5;
/// `OFPTLVTMFC_DUP_ENTRY`: another controller raced us to the same index.
pub const OFPTLVTMFC_DUP_ENTRY: u16 = 6;

impl ErrorKind {
    /// True for the transient "another controller already claimed this option" races that the
    /// TLV-table negotiation state machine retries rather than treating as fatal.
    pub fn is_tlv_negotiation_race(&self) -> bool {
        self.type_ == OFPET_TLV_TABLE_MOD_FAILED
            && (self.code == OFPTLVTMFC_ALREADY_MAPPED || self.code == OFPTLVTMFC_DUP_ENTRY)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "OpenFlow error type {} code {}", self.type_, self.code)
    }
}

impl std::error::Error for ErrorKind {}

/// A frame a [`crate::Codec`] could not make sense of: the length it claimed doesn't square with
/// the header it sits behind. The caller's job is to log it and discard, not to retry — there's
/// no well-defined amount of buffer to wait for more of.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CodecError(pub String);

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "codec error: {}", self.0)
    }
}

impl std::error::Error for CodecError {}
