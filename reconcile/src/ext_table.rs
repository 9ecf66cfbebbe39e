//! Extension tables (component C4): the same desired/installed duality as the flow table,
//! generalized for groups and meters, which are referenced by small allocated table ids rather
//! than by match key.

use std::collections::{HashMap, HashSet};
use uuid::Uuid;

/// An opaque spec string for a group or meter. Groups and meters use the same desired/installed
/// machinery; only how their `OutMessage`s get built (in the engine) differs.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct ExtSpec(pub String);

struct DesiredEntry {
    sources: HashSet<Uuid>,
}

#[derive(Default)]
pub struct ExtTable {
    next_id: u32,
    ids: HashMap<ExtSpec, u32>,
    desired: HashMap<ExtSpec, DesiredEntry>,
    by_source: HashMap<Uuid, HashSet<ExtSpec>>,
    existing: HashSet<ExtSpec>,
}

impl ExtTable {
    pub fn new() -> ExtTable {
        ExtTable::default()
    }

    fn id_for(&mut self, spec: &ExtSpec) -> u32 {
        if let Some(&id) = self.ids.get(spec) {
            return id;
        }
        let id = self.next_id;
        self.next_id += 1;
        self.ids.insert(spec.clone(), id);
        id
    }

    /// Marks `spec` desired on behalf of `source`. Idempotent per `(spec, source)`.
    pub fn add_desired(&mut self, spec: ExtSpec, source: Uuid) -> u32 {
        let id = self.id_for(&spec);
        self.desired.entry(spec.clone()).or_insert_with(|| DesiredEntry { sources: HashSet::new() }).sources.insert(source);
        self.by_source.entry(source).or_default().insert(spec);
        id
    }

    pub fn table_id(&self, spec: &ExtSpec) -> Option<u32> {
        self.ids.get(spec).copied()
    }

    /// Drops `source`'s reference to every spec it desired; specs left with no remaining
    /// reference are no longer desired (but stay in `existing` until the engine deletes them).
    pub fn remove_desired_by_source(&mut self, source: Uuid) {
        let specs = match self.by_source.remove(&source) {
            Some(s) => s,
            None => return,
        };
        for spec in specs {
            if let Some(entry) = self.desired.get_mut(&spec) {
                entry.sources.remove(&source);
                if entry.sources.is_empty() {
                    self.desired.remove(&spec);
                }
            }
        }
    }

    /// Specs desired but not yet reflected in `existing` — need an add.
    pub fn uninstalled(&self) -> Vec<ExtSpec> {
        self.desired.keys().filter(|s| !self.existing.contains(*s)).cloned().collect()
    }

    /// Specs in `existing` no longer desired by anyone — need a delete.
    pub fn stale(&self) -> Vec<ExtSpec> {
        self.existing.iter().filter(|s| !self.desired.contains_key(*s)).cloned().collect()
    }

    pub fn mark_deleted(&mut self, spec: &ExtSpec) {
        self.existing.remove(spec);
        self.ids.remove(spec);
    }

    /// Copies `desired` into `existing` after the switch has been brought up to date, except for
    /// `skip`, specs whose add was not actually sent this round (e.g. an unresolvable meter
    /// spec) and so must stay in `uninstalled()` for the next `put` to retry.
    pub fn sync(&mut self, skip: &HashSet<ExtSpec>) {
        self.existing = self.desired.keys().filter(|s| !skip.contains(*s)).cloned().collect();
    }

    pub fn clear(&mut self) {
        self.ids.clear();
        self.desired.clear();
        self.by_source.clear();
        self.existing.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uninstalled_then_synced() {
        let mut t = ExtTable::new();
        let sb = Uuid::new_v4();
        t.add_desired(ExtSpec("grp-a".into()), sb);
        assert_eq!(t.uninstalled(), vec![ExtSpec("grp-a".into())]);
        t.sync(&HashSet::new());
        assert!(t.uninstalled().is_empty());

        t.remove_desired_by_source(sb);
        assert_eq!(t.stale(), vec![ExtSpec("grp-a".into())]);
    }
}
