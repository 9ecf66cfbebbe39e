//! The desired flow table (component C2): what the controller wants installed, and the
//! many-to-many linkage back to the logical records that asked for it.
//!
//! Desired flows are stored in an arena (`HashMap<FlowId, DesiredFlow>`) rather than referenced
//! by raw pointer, so the source index and the installed table's back-references are plain
//! integers that stay valid across insert/remove without any manual pointer bookkeeping.

use crate::ratelimit;
use ovs::{FlowKey, FlowValue};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

/// Arena handle for a desired flow. Stable for the lifetime of the flow.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct FlowId(u64);

pub struct DesiredFlow {
    pub key: FlowKey,
    pub value: FlowValue,
    sources: HashSet<Uuid>,
}

impl DesiredFlow {
    pub fn sources(&self) -> &HashSet<Uuid> {
        &self.sources
    }
}

#[derive(Default)]
pub struct DesiredTable {
    flows: HashMap<FlowId, DesiredFlow>,
    /// All desired flows sharing a key, in insertion order — used by `add_or_append` to find the
    /// first match regardless of which source created it, and by the reconciliation engine to
    /// enumerate every desired flow for a key.
    by_key: HashMap<FlowKey, Vec<FlowId>>,
    by_source: HashMap<Uuid, HashSet<FlowId>>,
    next_id: u64,
}

impl DesiredTable {
    pub fn new() -> DesiredTable {
        DesiredTable::default()
    }

    pub fn get(&self, id: FlowId) -> Option<&DesiredFlow> {
        self.flows.get(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (FlowId, &DesiredFlow)> {
        self.flows.iter().map(|(id, f)| (*id, f))
    }

    pub fn flows_for_key(&self, key: &FlowKey) -> &[FlowId] {
        self.by_key.get(key).map(|v| v.as_slice()).unwrap_or(&[])
    }

    fn alloc(&mut self) -> FlowId {
        let id = FlowId(self.next_id);
        self.next_id += 1;
        id
    }

    fn link(&mut self, id: FlowId, key: &FlowKey, source: Uuid) {
        self.by_key.entry(key.clone()).or_default().push(id);
        self.by_source.entry(source).or_default().insert(id);
    }

    /// `add_flow`: inserts a desired flow for `source`. If a flow with the exact same
    /// `(key, source)` already exists this is a silent (optionally logged) no-op — P7.
    /// A flow with the same key but a *different* source is inserted as a distinct desired flow,
    /// forming the covering set the reconciliation engine picks a primary from.
    pub fn add(
        &mut self,
        key: FlowKey,
        value: FlowValue,
        source: Uuid,
        log_duplicate: bool,
    ) -> FlowId {
        for &id in self.by_key.get(&key).map(|v| v.as_slice()).unwrap_or(&[]) {
            if self.flows[&id].sources.contains(&source) {
                if log_duplicate && ratelimit::allow("desired-flow-duplicate") {
                    tracing::event!(
                        tracing::Level::DEBUG,
                        "duplicate add_flow for table {} priority {} source {}",
                        key.table_id,
                        key.priority,
                        source
                    );
                }
                return id;
            }
        }
        let id = self.alloc();
        let mut sources = HashSet::new();
        sources.insert(source);
        self.link(id, &key, source);
        self.flows.insert(id, DesiredFlow { key, value, sources });
        id
    }

    /// `add_or_append_flow`: if a desired flow already exists for `key` (from any source), its
    /// actions are extended with `value.actions` (existing actions first) and `source` is added
    /// to its reference set; otherwise behaves like `add`. When multiple desired flows already
    /// share `key` from different sources, the first one found in `by_key` order is extended —
    /// this follows upstream's observable behavior rather than imposing a new tiebreak.
    pub fn add_or_append(&mut self, key: FlowKey, value: FlowValue, source: Uuid) -> FlowId {
        if let Some(&id) = self.by_key.get(&key).and_then(|v| v.first()) {
            let flow = self.flows.get_mut(&id).expect("by_key entries are always live");
            flow.value.actions.extend_from_slice(&value.actions);
            flow.value.cookie = value.cookie;
            if flow.sources.insert(source) {
                self.by_source.entry(source).or_default().insert(id);
            }
            return id;
        }
        self.add(key, value, source, false)
    }

    /// Drops `id`'s reference to `source`; destroys the flow if that was its last reference.
    /// Returns `true` if the flow was destroyed.
    fn unref(&mut self, id: FlowId, source: Uuid) -> bool {
        let destroy = match self.flows.get_mut(&id) {
            Some(flow) => {
                flow.sources.remove(&source);
                flow.sources.is_empty()
            }
            None => return false,
        };
        if destroy {
            let flow = self.flows.remove(&id).expect("checked above");
            if let Some(ids) = self.by_key.get_mut(&flow.key) {
                ids.retain(|&x| x != id);
                if ids.is_empty() {
                    self.by_key.remove(&flow.key);
                }
            }
        }
        destroy
    }

    /// `remove_flows(source)`: drops every desired flow's reference to `source`, destroying any
    /// flow left with no remaining references. Returns the ids of destroyed flows so the caller
    /// (the engine) can unlink them from the installed table.
    pub fn remove_by_source(&mut self, source: Uuid) -> Vec<FlowId> {
        let ids = match self.by_source.remove(&source) {
            Some(ids) => ids,
            None => return Vec::new(),
        };
        let mut destroyed = Vec::new();
        for id in ids {
            if self.unref(id, source) {
                destroyed.push(id);
            }
        }
        destroyed
    }

    /// `flood_remove_flows(seeds)`: transitively removes every desired flow reachable through a
    /// shared source, starting from `seeds`. Implemented as an explicit worklist over a visited
    /// set rather than recursion, so there is no re-entrant traversal of a flow whose reference
    /// set was already drained. Returns the ids of every flow actually destroyed.
    pub fn flood_remove(&mut self, seeds: impl IntoIterator<Item = Uuid>) -> Vec<FlowId> {
        let mut worklist: Vec<Uuid> = seeds.into_iter().collect();
        let mut seen_sources: HashSet<Uuid> = worklist.iter().copied().collect();
        let mut destroyed = Vec::new();
        let mut seen_flows: HashSet<FlowId> = HashSet::new();

        while let Some(source) = worklist.pop() {
            let ids: Vec<FlowId> = match self.by_source.get(&source) {
                Some(ids) => ids.iter().copied().collect(),
                None => continue,
            };
            for id in ids {
                if !seen_flows.insert(id) {
                    continue;
                }
                // Every other source referencing this flow will also have it removed, so queue
                // them before we destroy the flow and lose the reference set.
                if let Some(flow) = self.flows.get(&id) {
                    for &other in &flow.sources {
                        if seen_sources.insert(other) {
                            worklist.push(other);
                        }
                    }
                }
                // Remove this flow from every source's perspective.
                let flow_sources: Vec<Uuid> =
                    self.flows.get(&id).map(|f| f.sources.iter().copied().collect()).unwrap_or_default();
                for s in flow_sources {
                    if let Some(set) = self.by_source.get_mut(&s) {
                        set.remove(&id);
                        if set.is_empty() {
                            self.by_source.remove(&s);
                        }
                    }
                }
                if let Some(flow) = self.flows.remove(&id) {
                    if let Some(ids) = self.by_key.get_mut(&flow.key) {
                        ids.retain(|&x| x != id);
                        if ids.is_empty() {
                            self.by_key.remove(&flow.key);
                        }
                    }
                    destroyed.push(id);
                }
            }
        }
        destroyed
    }

    /// Destroys every desired flow, as if every known source had called `remove_by_source`.
    pub fn clear(&mut self) -> Vec<FlowId> {
        let sources: Vec<Uuid> = self.by_source.keys().copied().collect();
        let mut destroyed = Vec::new();
        for s in sources {
            destroyed.extend(self.remove_by_source(s));
        }
        destroyed
    }

    pub fn is_empty(&self) -> bool {
        self.flows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.flows.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ovs::Match;

    fn key(priority: u16) -> FlowKey {
        FlowKey::new(0, priority, Match::new(vec![1, 2, 3]))
    }

    #[test]
    fn duplicate_add_is_idempotent() {
        let mut t = DesiredTable::new();
        let sb = Uuid::new_v4();
        let a = t.add(key(10), FlowValue::new(vec![1], 0), sb, false);
        let b = t.add(key(10), FlowValue::new(vec![1], 0), sb, false);
        assert_eq!(a, b);
        assert_eq!(t.len(), 1);
    }

    #[test]
    fn shared_key_distinct_sources() {
        let mut t = DesiredTable::new();
        let sb1 = Uuid::new_v4();
        let sb2 = Uuid::new_v4();
        let a = t.add(key(10), FlowValue::new(vec![1], 0), sb1, false);
        let b = t.add(key(10), FlowValue::new(vec![1], 0), sb2, false);
        assert_ne!(a, b);
        assert_eq!(t.flows_for_key(&key(10)).len(), 2);

        let destroyed = t.remove_by_source(sb1);
        assert_eq!(destroyed, vec![a]);
        assert!(t.get(b).is_some());
        assert_eq!(t.flows_for_key(&key(10)).len(), 1);
    }

    #[test]
    fn add_or_append_concatenates_in_order() {
        let mut t = DesiredTable::new();
        let sb1 = Uuid::new_v4();
        let sb2 = Uuid::new_v4();
        let id = t.add_or_append(key(10), FlowValue::new(vec![1, 2], 0), sb1);
        let id2 = t.add_or_append(key(10), FlowValue::new(vec![3, 4], 0), sb2);
        assert_eq!(id, id2);
        assert_eq!(t.get(id).unwrap().value.actions, vec![1, 2, 3, 4]);
        assert_eq!(t.get(id).unwrap().sources().len(), 2);
    }

    #[test]
    fn flood_remove_cascades_through_shared_sources() {
        let mut t = DesiredTable::new();
        let sb_a = Uuid::new_v4();
        let sb_b = Uuid::new_v4();
        let sb_c = Uuid::new_v4();

        let f1 = t.add(key(1), FlowValue::new(vec![1], 0), sb_a, false);
        t.flows.get_mut(&f1).unwrap().sources.insert(sb_b);
        t.by_source.entry(sb_b).or_default().insert(f1);

        let f2 = t.add(key(2), FlowValue::new(vec![2], 0), sb_b, false);
        let f3 = t.add(key(3), FlowValue::new(vec![3], 0), sb_c, false);

        let destroyed = t.flood_remove(vec![sb_a]);
        assert!(destroyed.contains(&f1));
        assert!(destroyed.contains(&f2));
        assert!(!destroyed.contains(&f3));
        assert!(t.get(f3).is_some());
    }
}
