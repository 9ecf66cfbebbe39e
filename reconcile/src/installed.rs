//! The installed flow table (component C3): what the controller believes is currently present
//! on the switch, and the one-to-many back-link to the desired flows covering each entry.

use crate::desired::FlowId;
use ovs::{FlowKey, FlowValue};
use std::collections::HashMap;

pub struct InstalledFlow {
    pub value: FlowValue,
    /// Every desired flow whose key matches this installed entry, in discovery order.
    desired_refs: Vec<FlowId>,
    /// Index into `desired_refs` of the flow whose actions are actually on the switch. `None`
    /// only transiently, between unlinking and relinking during a sweep.
    primary: Option<usize>,
}

impl InstalledFlow {
    pub fn desired_refs(&self) -> &[FlowId] {
        &self.desired_refs
    }

    pub fn primary(&self) -> Option<FlowId> {
        self.primary.map(|i| self.desired_refs[i])
    }
}

#[derive(Default)]
pub struct InstalledTable {
    flows: HashMap<FlowKey, InstalledFlow>,
}

impl InstalledTable {
    pub fn new() -> InstalledTable {
        InstalledTable::default()
    }

    pub fn get(&self, key: &FlowKey) -> Option<&InstalledFlow> {
        self.flows.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&FlowKey, &InstalledFlow)> {
        self.flows.iter()
    }

    pub fn keys(&self) -> Vec<FlowKey> {
        self.flows.keys().cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.flows.is_empty()
    }

    /// Clears every `desired_refs` link in preparation for the installed-flow sweep relinking
    /// them from scratch. Does not remove installed entries themselves — the sweep deletes
    /// entries that end up with no desired partner.
    pub fn unlink_all_refs(&mut self) {
        for flow in self.flows.values_mut() {
            flow.desired_refs.clear();
            flow.primary = None;
        }
    }

    /// Links `desired` as a (possibly additional) reference to the installed entry for `key`,
    /// creating the entry (cloned from `value`/`cookie`) if it doesn't exist yet. The first link
    /// after `unlink_all_refs` becomes the primary.
    pub fn link(&mut self, key: FlowKey, value: FlowValue, desired: FlowId) {
        let entry = self.flows.entry(key).or_insert_with(|| InstalledFlow {
            value,
            desired_refs: Vec::new(),
            primary: None,
        });
        entry.desired_refs.push(desired);
        if entry.primary.is_none() {
            entry.primary = Some(entry.desired_refs.len() - 1);
        }
    }

    /// Updates the installed value in place (used when the engine emits a `MODIFY_STRICT`/`ADD`
    /// rather than deleting and re-adding).
    pub fn set_value(&mut self, key: &FlowKey, value: FlowValue) {
        if let Some(flow) = self.flows.get_mut(key) {
            flow.value = value;
        }
    }

    /// Deletes the installed entry for `key` unconditionally (invariant I1: only called once
    /// `desired_refs` is empty).
    pub fn delete(&mut self, key: &FlowKey) {
        self.flows.remove(key);
    }

    pub fn clear(&mut self) {
        self.flows.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::desired::DesiredTable;
    use ovs::Match;
    use uuid::Uuid;

    #[test]
    fn first_link_after_unlink_is_primary() {
        let mut installed = InstalledTable::new();
        let key = FlowKey::new(0, 10, Match::new(vec![1]));
        let mut desired = DesiredTable::new();
        let sb = Uuid::new_v4();
        let id = desired.add(key.clone(), FlowValue::new(vec![9], 0), sb, false);

        installed.link(key.clone(), FlowValue::new(vec![9], 0), id);
        assert_eq!(installed.get(&key).unwrap().primary(), Some(id));
    }
}
