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

//! The canonical flow-table key: `(table_id, priority, match)`.
//!
//! `Match` is kept abstract (hashable, equality-comparable, otherwise opaque) because parsing
//! and wildcard semantics for match expressions belong to the external match-expression parser,
//! not to the reconciliation core.

use std::hash::{Hash, Hasher};
use std::collections::hash_map::DefaultHasher;

/// An opaque, hashable, equality-comparable wildcarded match. The reconciliation core never
/// interprets the contents; it only stores, hashes and compares them.
///
/// In production this wraps whatever the match-expression parser produces (e.g. a bitmap of
/// OXM fields and masks); the core only needs `Hash`/`Eq`/`Clone`, so that representation is
/// injected by the caller rather than defined here.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct Match(pub Vec<u8>);

impl Match {
    pub fn new(canonical_bytes: Vec<u8>) -> Match {
        Match(canonical_bytes)
    }
}

/// `(table_id, priority, match)`. Two keys are equal iff all three components are equal.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct FlowKey {
    pub table_id: u8,
    pub priority: u16,
    pub match_: Match,
}

impl FlowKey {
    pub fn new(table_id: u8, priority: u16, match_: Match) -> FlowKey {
        FlowKey { table_id, priority, match_ }
    }

    /// Combines `(table_id << 16 | priority)` with the match's hash into a 32-bit digest.
    /// Only used where a caller wants a 32-bit surrogate (e.g. a stable iteration order); the
    /// table itself is keyed on the full `FlowKey` via `Hash`/`Eq`.
    pub fn hash32(&self) -> u32 {
        let mut hasher = DefaultHasher::new();
        self.match_.hash(&mut hasher);
        let match_hash = hasher.finish() as u32;
        let prefix = ((self.table_id as u32) << 16) | self.priority as u32;
        combine32(prefix, match_hash)
    }
}

fn combine32(a: u32, b: u32) -> u32 {
    // Same mixing shape OVS's `hash_2words` uses: fold the second word through a multiplicative
    // constant so that `combine32(x, y) != combine32(y, x)` in general.
    a.wrapping_mul(0x9e3779b1).wrapping_add(b)
}

/// Action byte blob plus cookie. Actions are compared for *semantic* equality by the codec
/// (which normalizes encodings); absent a real codec the core treats byte-wise equality as the
/// stand-in, which is what `ActionsEq` below documents and callers may override.
#[derive(Clone, Debug)]
pub struct FlowValue {
    pub actions: Vec<u8>,
    pub cookie: u64,
}

impl FlowValue {
    pub fn new(actions: Vec<u8>, cookie: u64) -> FlowValue {
        FlowValue { actions, cookie }
    }

    /// Semantic action equality. Cookie is compared separately since a cookie-only difference
    /// is handled specially by the reconciliation engine (it forces an `ADD`, not a
    /// `MODIFY_STRICT`, because strict modify cannot change the cookie).
    pub fn actions_eq(&self, other: &FlowValue) -> bool {
        self.actions == other.actions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_keys_hash_equal() {
        let a = FlowKey::new(0, 100, Match::new(vec![1, 2, 3]));
        let b = FlowKey::new(0, 100, Match::new(vec![1, 2, 3]));
        assert_eq!(a, b);
        assert_eq!(a.hash32(), b.hash32());
    }

    #[test]
    fn table_id_or_priority_change_the_key() {
        let base = FlowKey::new(0, 100, Match::new(vec![1, 2, 3]));
        let other_table = FlowKey::new(1, 100, Match::new(vec![1, 2, 3]));
        let other_priority = FlowKey::new(0, 101, Match::new(vec![1, 2, 3]));
        assert_ne!(base, other_table);
        assert_ne!(base, other_priority);
    }

    #[test]
    fn cookie_only_difference_is_not_action_difference() {
        let a = FlowValue::new(vec![9, 9], 1);
        let b = FlowValue::new(vec![9, 9], 2);
        assert!(a.actions_eq(&b));
        assert_ne!(a.cookie, b.cookie);
    }
}
