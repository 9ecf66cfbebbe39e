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

//! OpenFlow protocol version negotiated with a switch connection.
//!
//! The wire encoding of the messages in [`crate::message`] is the job of an external codec
//! (see [`crate::codec::Codec`]); this module only tracks which version has been negotiated,
//! since flow-mods are always emitted using OpenFlow 1.3 OXM per the reconciliation contract.

use bitflags::bitflags;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Version {
    Ofp10 = 0,
    Ofp11 = 1,
    Ofp12 = 2,
    Ofp13 = 3,
    Ofp14 = 4,
    Ofp15 = 5,
}

impl Version {
    /// Flow-mods, group-mods and meter-mods are always OpenFlow 1.3 OXM.
    pub const FLOW_MOD: Version = Version::Ofp13;
}

bitflags! {
    /// Bitmap of OpenFlow versions a transport may negotiate.
    pub struct Versions: u32 {
        const OFP10 = 1 << (Version::Ofp10 as u32);
        const OFP11 = 1 << (Version::Ofp11 as u32);
        const OFP12 = 1 << (Version::Ofp12 as u32);
        const OFP13 = 1 << (Version::Ofp13 as u32);
        const OFP14 = 1 << (Version::Ofp14 as u32);
        const OFP15 = 1 << (Version::Ofp15 as u32);

        const SUPPORTED = Self::OFP13.bits | Self::OFP14.bits | Self::OFP15.bits;
        const DEFAULT = Self::SUPPORTED.bits;
    }
}

impl From<Version> for Versions {
    fn from(v: Version) -> Versions {
        Versions { bits: 1 << (v as u32) }
    }
}
