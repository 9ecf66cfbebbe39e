//! The reconciliation engine (component C6): the `put` operation that diffs desired state
//! against installed state and emits the minimum batch of flow-mods to converge them.

use crate::cfg_tracker::CfgTracker;
use crate::ctzone::CtZoneMap;
use crate::desired::{DesiredTable, FlowId};
use crate::error::ExtTableError;
use crate::ext_table::{ExtSpec, ExtTable};
use crate::fsm::ConnFsm;
use crate::installed::InstalledTable;
use crate::interfaces::{MeterCatalog, METER_INLINE_SENTINEL};
use crate::ratelimit;
use ovs::message::MeterBand;
use ovs::{FlowMod, OutMessage, Transport};

/// Bundles components C2–C4 and C7, the state a `put` reads and mutates. The connection state
/// machine (C5) and transport are passed in separately since the driver (C9) also needs them for
/// message dispatch outside of `put`.
pub struct ReconcileCore {
    pub desired: DesiredTable,
    pub installed: InstalledTable,
    pub groups: ExtTable,
    pub meters: ExtTable,
    pub ct_zones: CtZoneMap,
    pub cfg: CfgTracker,
}

impl ReconcileCore {
    pub fn new() -> ReconcileCore {
        ReconcileCore {
            desired: DesiredTable::new(),
            installed: InstalledTable::new(),
            groups: ExtTable::new(),
            meters: ExtTable::new(),
            ct_zones: CtZoneMap::new(),
            cfg: CfgTracker::new(),
        }
    }

    /// Resets everything a reconnect invalidates: installed state, extension-table `existing`
    /// sets, and in-flight config-tracker entries. Desired state survives — it's still wanted.
    pub fn clear_installed_state(&mut self) {
        self.installed.clear();
        self.groups.clear();
        self.meters.clear();
        self.cfg.reset();
        self.ct_zones.demote_sent_to_queued();
    }

    /// Registers `group` as desired on behalf of `source`, allocating a table id if this is the
    /// first time it's been seen. Mirrors [`DesiredTable::add`] for groups.
    pub fn add_desired_group(&mut self, group: ExtSpec, source: uuid::Uuid) -> u32 {
        self.groups.add_desired(group, source)
    }

    /// Registers `meter` as desired on behalf of `source`. Mirrors [`DesiredTable::add`] for
    /// meters; `meter` is either a catalog name or `METER_INLINE_SENTINEL`-prefixed inline spec.
    pub fn add_desired_meter(&mut self, meter: ExtSpec, source: uuid::Uuid) -> u32 {
        self.meters.add_desired(meter, source)
    }

    /// Drops `source`'s references to every group and meter it desired, the C4 counterpart of
    /// [`DesiredTable::remove_by_source`].
    pub fn remove_desired_ext_by_source(&mut self, source: uuid::Uuid) {
        self.groups.remove_desired_by_source(source);
        self.meters.remove_desired_by_source(source);
    }
}

impl Default for ReconcileCore {
    fn default() -> ReconcileCore {
        ReconcileCore::new()
    }
}

/// Runs one `put`: diffs desired vs installed and installed vs existing extension entries,
/// emits the batch, and updates config tracking. Returns the number of messages emitted
/// (excluding the trailing barrier), mostly useful for tests and logging.
///
/// Preconditions (checked by the caller, the driver's tick loop): `fsm.is_update()` and
/// `transport.tx_in_flight() == 0`.
pub fn put(
    core: &mut ReconcileCore,
    fsm: &mut ConnFsm,
    transport: &mut dyn Transport,
    meters: &dyn MeterCatalog,
    incoming_nb_cfg: i64,
) -> usize {
    // Elision: if nothing would change, the reconnect-forced full reinstall isn't pending, and
    // the configuration number didn't move, there's nothing to do at all. If only the
    // configuration number advanced, `record_no_op` bumps `cur_cfg` without issuing any traffic.
    if !fsm.forced_reinstall() && !pending_changes(core) {
        core.cfg.record_no_op(incoming_nb_cfg);
        fsm.clear_forced_reinstall();
        return 0;
    }

    let mut batch: Vec<OutMessage> = Vec::new();

    // Step 1: conntrack flushes.
    for zone in core.ct_zones.queued_zones() {
        batch.push(OutMessage::ConntrackFlush { zone });
        core.ct_zones.mark_sent(zone, 0);
    }

    // Step 2: new groups / meters.
    for spec in core.groups.uninstalled() {
        let table_id = core.groups.table_id(&spec).expect("uninstalled implies allocated");
        batch.push(OutMessage::GroupAdd { table_id, name: spec.0 });
    }
    let mut unresolved_meters: std::collections::HashSet<ExtSpec> = std::collections::HashSet::new();
    for spec in core.meters.uninstalled() {
        let table_id = core.meters.table_id(&spec).expect("uninstalled implies allocated");
        match resolve_meter(&spec, meters) {
            Ok((unit, bands)) => batch.push(OutMessage::MeterAdd { table_id, name: spec.0.clone(), unit, bands }),
            Err(e) => {
                if ratelimit::allow("bad-meter-spec") {
                    tracing::event!(tracing::Level::WARN, "skipping meter: {}", e);
                }
                unresolved_meters.insert(spec);
            }
        }
    }

    // Step 3: installed-flow sweep.
    core.installed.unlink_all_refs();
    let installed_keys = core.installed.keys();
    for key in &installed_keys {
        let candidates: Vec<FlowId> = core.desired.flows_for_key(key).to_vec();
        if candidates.is_empty() {
            batch.push(FlowMod::delete_strict(key.clone()).into_message());
            core.installed.delete(key);
            continue;
        }
        let primary = pick_primary(&candidates);
        let desired_value = core.desired.get(primary).unwrap().value.clone();
        let installed_value = core.installed.get(key).unwrap().value.clone();
        if desired_value.cookie != installed_value.cookie {
            // Strict modify cannot change the cookie, so a cookie change is emitted as an ADD.
            batch.push(FlowMod::add(key.clone(), desired_value.actions.clone(), desired_value.cookie).into_message());
        } else if !desired_value.actions_eq(&installed_value) {
            batch.push(FlowMod::modify_strict(key.clone(), desired_value.actions.clone(), desired_value.cookie).into_message());
        }
        core.installed.set_value(key, desired_value);
        for id in candidates {
            let value = core.desired.get(id).unwrap().value.clone();
            core.installed.link(key.clone(), value, id);
        }
    }

    // Step 4: desired-flow sweep (flows with no installed partner yet).
    let mut seen_keys: std::collections::HashSet<ovs::FlowKey> =
        installed_keys.into_iter().collect();
    let desired_ids: Vec<FlowId> = core.desired.iter().map(|(id, _)| id).collect();
    for id in desired_ids {
        let flow = core.desired.get(id).unwrap();
        if seen_keys.contains(&flow.key) {
            continue;
        }
        seen_keys.insert(flow.key.clone());
        let candidates = core.desired.flows_for_key(&flow.key).to_vec();
        let primary = pick_primary(&candidates);
        let value = core.desired.get(primary).unwrap().value.clone();
        batch.push(FlowMod::add(flow.key.clone(), value.actions.clone(), value.cookie).into_message());
        for &cid in &candidates {
            core.installed.link(flow.key.clone(), core.desired.get(cid).unwrap().value.clone(), cid);
        }
    }

    // Step 5: stale extension entries.
    for spec in core.groups.stale() {
        let table_id = core.groups.table_id(&spec).unwrap_or(0);
        batch.push(OutMessage::GroupDelete { table_id });
        core.groups.mark_deleted(&spec);
    }
    for spec in core.meters.stale() {
        let table_id = core.meters.table_id(&spec).unwrap_or(0);
        batch.push(OutMessage::MeterDelete { table_id });
        core.meters.mark_deleted(&spec);
    }
    core.groups.sync(&std::collections::HashSet::new());
    core.meters.sync(&unresolved_meters);

    // Step 6: trailer.
    let emitted = batch.len();
    if emitted > 0 {
        for msg in batch {
            transport.send(msg);
        }
        let barrier_xid = transport.send(OutMessage::Barrier);
        core.ct_zones.backpatch_sent_xid(barrier_xid);
        // Step 7: configuration tracking.
        core.cfg.record_batch(barrier_xid, incoming_nb_cfg);
    } else {
        core.cfg.record_no_op(incoming_nb_cfg);
    }

    fsm.clear_forced_reinstall();
    emitted
}

/// Read-only mirror of steps 1–5's diff: true if a real `put` would emit at least one message.
/// Lets the elision gate decide whether to bother before touching link tables or building a
/// batch.
fn pending_changes(core: &ReconcileCore) -> bool {
    if !core.ct_zones.queued_zones().is_empty() {
        return true;
    }
    if !core.groups.uninstalled().is_empty() || !core.groups.stale().is_empty() {
        return true;
    }
    if !core.meters.uninstalled().is_empty() || !core.meters.stale().is_empty() {
        return true;
    }
    let installed_keys = core.installed.keys();
    for key in &installed_keys {
        let candidates = core.desired.flows_for_key(key);
        if candidates.is_empty() {
            return true;
        }
        let installed_flow = core.installed.get(key).unwrap();
        let refs = installed_flow.desired_refs();
        if refs.len() != candidates.len() || !candidates.iter().all(|c| refs.contains(c)) {
            // Covering set changed even if the primary's actions didn't; still needs a relink
            // pass so desired_refs stays accurate for the next withdrawal.
            return true;
        }
        let primary = *candidates.first().expect("candidates non-empty");
        let desired_value = &core.desired.get(primary).unwrap().value;
        if desired_value.cookie != installed_flow.value.cookie || !desired_value.actions_eq(&installed_flow.value) {
            return true;
        }
    }
    let seen_keys: std::collections::HashSet<ovs::FlowKey> = installed_keys.into_iter().collect();
    core.desired.iter().any(|(_, flow)| !seen_keys.contains(&flow.key))
}

/// Picks the desired flow whose actions become the installed primary: the first candidate in
/// `flows_for_key` order, matching [`DesiredTable::add_or_append`]'s own first-found policy so
/// the two stay consistent about what "first" means for a shared key.
fn pick_primary(candidates: &[FlowId]) -> FlowId {
    *candidates.first().expect("candidates non-empty")
}

fn resolve_meter(spec: &ExtSpec, catalog: &dyn MeterCatalog) -> Result<(String, Vec<MeterBand>), ExtTableError> {
    if let Some(inline) = spec.0.strip_prefix(METER_INLINE_SENTINEL) {
        return parse_inline_meter(inline).ok_or_else(|| ExtTableError::BadGroupSpec(spec.0.clone()));
    }
    let resolved = catalog.lookup(&spec.0).ok_or_else(|| ExtTableError::UnknownMeter(spec.0.clone()))?;
    Ok((resolved.unit, resolved.bands))
}

/// Parses `"<unit>:<type>,<rate>,<burst>"`, the inline encoding used for sentinel meter specs.
fn parse_inline_meter(s: &str) -> Option<(String, Vec<MeterBand>)> {
    let (unit, rest) = s.split_once(':')?;
    let mut parts = rest.split(',');
    let type_ = parts.next()?.to_string();
    let rate: u32 = parts.next()?.parse().ok()?;
    let burst: u32 = parts.next()?.parse().ok()?;
    Some((unit.to_string(), vec![MeterBand { type_, rate, burst }]))
}

trait IntoMessage {
    fn into_message(self) -> OutMessage;
}

impl IntoMessage for FlowMod {
    fn into_message(self) -> OutMessage {
        OutMessage::FlowMod(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interfaces::MeterSpec;
    use crate::testutil::FakeTransport;
    use ovs::{FlowValue, InMessage, Match};
    use uuid::Uuid;

    struct NoMeters;
    impl MeterCatalog for NoMeters {
        fn lookup(&self, _name: &str) -> Option<MeterSpec> {
            None
        }
    }

    fn key(priority: u16) -> ovs::FlowKey {
        ovs::FlowKey::new(0, priority, Match::new(vec![1]))
    }

    /// Drives a fresh FSM through negotiation and into `S_UPDATE`, leaving `forced_reinstall()`
    /// set. Uses a throwaway cfg/ct_zones pair since nothing before `S_UPDATE` touches either.
    fn drive_to_update(fsm: &mut ConnFsm, t: &mut FakeTransport) {
        let mut scratch_cfg = CfgTracker::new();
        let mut scratch_ct_zones = crate::ctzone::CtZoneMap::new();

        fsm.tick(t);
        let req_xid = t.last_xid();
        fsm.handle_message(t, &mut scratch_cfg, &mut scratch_ct_zones, InMessage::TlvTableReply { xid: req_xid, mappings: vec![] });

        let barrier_xid = t.last_xid();
        fsm.handle_message(t, &mut scratch_cfg, &mut scratch_ct_zones, InMessage::BarrierReply { xid: barrier_xid });
        assert!(fsm.is_clear());

        t.sent.clear();
        fsm.tick(t);
        assert!(fsm.is_update());
        assert!(fsm.forced_reinstall());
    }

    #[test]
    fn desired_flow_with_no_installed_partner_is_added() {
        let mut core = ReconcileCore::new();
        let mut fsm = ConnFsm::new();
        let mut t = FakeTransport::new();
        core.desired.add(key(10), FlowValue::new(vec![1, 2], 7), Uuid::new_v4(), false);

        let emitted = put(&mut core, &mut fsm, &mut t, &NoMeters, 1);

        assert_eq!(emitted, 1);
        assert!(matches!(t.sent[0], OutMessage::FlowMod(_)));
        assert!(matches!(t.sent[1], OutMessage::Barrier));
        assert!(core.installed.get(&key(10)).is_some());
    }

    #[test]
    fn action_change_without_cookie_change_is_modify_strict() {
        let mut core = ReconcileCore::new();
        let mut fsm = ConnFsm::new();
        let mut t = FakeTransport::new();
        let sb = Uuid::new_v4();
        core.desired.add(key(10), FlowValue::new(vec![1], 5), sb, false);
        put(&mut core, &mut fsm, &mut t, &NoMeters, 1);

        core.desired.remove_by_source(sb);
        core.desired.add(key(10), FlowValue::new(vec![9], 5), sb, false);
        t.sent.clear();
        put(&mut core, &mut fsm, &mut t, &NoMeters, 2);

        assert!(matches!(
            &t.sent[0],
            OutMessage::FlowMod(fm) if fm.command == ovs::FlowModCommand::ModifyStrict
        ));
    }

    #[test]
    fn cookie_change_is_add_not_modify() {
        let mut core = ReconcileCore::new();
        let mut fsm = ConnFsm::new();
        let mut t = FakeTransport::new();
        let sb = Uuid::new_v4();
        core.desired.add(key(10), FlowValue::new(vec![1], 5), sb, false);
        put(&mut core, &mut fsm, &mut t, &NoMeters, 1);

        core.desired.remove_by_source(sb);
        core.desired.add(key(10), FlowValue::new(vec![1], 6), sb, false);
        t.sent.clear();
        put(&mut core, &mut fsm, &mut t, &NoMeters, 2);

        assert!(matches!(
            &t.sent[0],
            OutMessage::FlowMod(fm) if fm.command == ovs::FlowModCommand::Add
        ));
    }

    #[test]
    fn installed_flow_with_no_desired_partner_is_deleted() {
        let mut core = ReconcileCore::new();
        let mut fsm = ConnFsm::new();
        let mut t = FakeTransport::new();
        let sb = Uuid::new_v4();
        core.desired.add(key(10), FlowValue::new(vec![1], 0), sb, false);
        put(&mut core, &mut fsm, &mut t, &NoMeters, 1);

        core.desired.remove_by_source(sb);
        t.sent.clear();
        put(&mut core, &mut fsm, &mut t, &NoMeters, 2);

        assert!(matches!(
            &t.sent[0],
            OutMessage::FlowMod(fm) if fm.command == ovs::FlowModCommand::DeleteStrict
        ));
        assert!(core.installed.get(&key(10)).is_none());
    }

    #[test]
    fn desired_group_is_added_then_deleted_once_unreferenced() {
        let mut core = ReconcileCore::new();
        let mut fsm = ConnFsm::new();
        let mut t = FakeTransport::new();
        let sb = Uuid::new_v4();
        core.add_desired_group(ExtSpec("group:bucket=output:1".into()), sb);

        let emitted = put(&mut core, &mut fsm, &mut t, &NoMeters, 1);
        assert_eq!(emitted, 1);
        assert!(matches!(t.sent[0], OutMessage::GroupAdd { .. }));

        core.remove_desired_ext_by_source(sb);
        t.sent.clear();
        let emitted = put(&mut core, &mut fsm, &mut t, &NoMeters, 2);
        assert_eq!(emitted, 1);
        assert!(matches!(t.sent[0], OutMessage::GroupDelete { .. }));
    }

    #[test]
    fn desired_meter_with_bad_catalog_name_is_skipped_and_retried_next_put() {
        let mut core = ReconcileCore::new();
        let mut fsm = ConnFsm::new();
        let mut t = FakeTransport::new();
        let sb = Uuid::new_v4();
        core.add_desired_meter(ExtSpec("no-such-meter".into()), sb);

        let emitted = put(&mut core, &mut fsm, &mut t, &NoMeters, 1);
        assert_eq!(emitted, 0);
        assert!(t.sent.is_empty());

        // Still unresolved on the next put: sync() must not have marked it existing.
        let emitted = put(&mut core, &mut fsm, &mut t, &NoMeters, 2);
        assert_eq!(emitted, 0);
        assert!(t.sent.is_empty());
    }

    #[test]
    fn no_changes_records_no_op_and_advances_cfg_immediately() {
        let mut core = ReconcileCore::new();
        let mut fsm = ConnFsm::new();
        let mut t = FakeTransport::new();
        let emitted = put(&mut core, &mut fsm, &mut t, &NoMeters, 4);
        assert_eq!(emitted, 0);
        assert_eq!(core.cfg.cur_cfg(), 4);
    }

    #[test]
    fn second_put_with_nothing_changed_is_elided_but_cfg_still_advances() {
        let mut core = ReconcileCore::new();
        let mut fsm = ConnFsm::new();
        let mut t = FakeTransport::new();
        drive_to_update(&mut fsm, &mut t);

        core.desired.add(key(10), FlowValue::new(vec![1], 0), Uuid::new_v4(), false);
        t.sent.clear();
        put(&mut core, &mut fsm, &mut t, &NoMeters, 1);
        let barrier_xid = t.last_xid();
        fsm.handle_message(&mut t, &mut core.cfg, &mut core.ct_zones, InMessage::BarrierReply { xid: barrier_xid });
        assert_eq!(core.cfg.cur_cfg(), 1);

        t.sent.clear();
        let emitted = put(&mut core, &mut fsm, &mut t, &NoMeters, 2);

        assert_eq!(emitted, 0);
        assert!(t.sent.is_empty(), "elided put must not even send a barrier");
        assert_eq!(core.cfg.cur_cfg(), 2);
    }

    #[test]
    fn forced_reinstall_bypasses_the_elision_gate_even_with_nothing_outstanding() {
        let mut core = ReconcileCore::new();
        let mut fsm = ConnFsm::new();
        let mut t = FakeTransport::new();
        core.desired.add(key(10), FlowValue::new(vec![1], 0), Uuid::new_v4(), false);
        put(&mut core, &mut fsm, &mut t, &NoMeters, 1);

        // Drive the connection through a reconnect: forced_reinstall ends up set without `core`
        // ever being told to clear its installed state.
        t.sent.clear();
        drive_to_update(&mut fsm, &mut t);

        t.sent.clear();
        let emitted = put(&mut core, &mut fsm, &mut t, &NoMeters, 2);

        // Nothing actually changed, but forced_reinstall forces the full diff (which, here, still
        // finds the installed flow already matching and emits nothing) and clears the flag.
        assert_eq!(emitted, 0);
        assert!(!fsm.forced_reinstall());
    }
}
