/*
Copyright (c) 2021, 2022 VMware, Inc.
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

//! `ovs` provides the OpenFlow vocabulary the reconciliation core is built on: flow keys,
//! flow-mod construction, the message types exchanged with a switch, and the [`Transport`]
//! trait a connection must implement. It intentionally knows nothing about wire encoding —
//! that's an external codec's job — and nothing about desired/installed-flow bookkeeping, which
//! lives in the `reconcile` crate.

pub mod codec;
pub mod error;
pub mod flow_mod;
pub mod key;
pub mod message;
pub mod protocol;
pub mod transport;

pub use codec::Codec;
pub use error::{CodecError, ErrorKind};
pub use flow_mod::{FlowMod, FlowModCommand};
pub use key::{FlowKey, FlowValue, Match};
pub use message::{InMessage, OfpType, OutMessage, Xid};
pub use protocol::Version;
pub use transport::Transport;
