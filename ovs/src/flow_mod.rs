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

//! `OFPT_FLOW_MOD` construction.
//!
//! Unlike the upstream OVS wrapper, this doesn't parse a textual flow description (that's the
//! external match/action parser's job); it builds a flow-mod directly from a [`FlowKey`] and
//! the command the reconciliation engine has already decided on.

use crate::key::FlowKey;

/// Restricted to the commands the reconciliation engine actually emits. `Add` has no
/// strict/non-strict distinction. `ModifyStrict`/`DeleteStrict` address exactly the flow whose
/// key matches, never a wildcard superset, which is what lets the engine reason about the
/// installed table one key at a time.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FlowModCommand {
    Add,
    ModifyStrict,
    DeleteStrict,
}

#[derive(Clone, Debug)]
pub struct FlowMod {
    pub key: FlowKey,
    pub command: FlowModCommand,
    /// Action blob and cookie to install. `None` for `DeleteStrict`, which needs only the key.
    pub actions: Option<Vec<u8>>,
    pub cookie: u64,
}

impl FlowMod {
    pub fn add(key: FlowKey, actions: Vec<u8>, cookie: u64) -> FlowMod {
        FlowMod { key, command: FlowModCommand::Add, actions: Some(actions), cookie }
    }

    pub fn modify_strict(key: FlowKey, actions: Vec<u8>, cookie: u64) -> FlowMod {
        FlowMod { key, command: FlowModCommand::ModifyStrict, actions: Some(actions), cookie }
    }

    pub fn delete_strict(key: FlowKey) -> FlowMod {
        FlowMod { key, command: FlowModCommand::DeleteStrict, actions: None, cookie: 0 }
    }
}
