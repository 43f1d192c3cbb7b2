//! Flow and group lookup for one device.
//!
//! [`DeviceFlows`] reads a device's installed entries and groups once per
//! device visit and answers table lookups from that copy.

use std::collections::{BTreeMap, HashMap};

use flowtrace_core::{
    DeviceId, Driver, Field, FlowEntry, FlowState, Group, GroupId, HeaderState, MatchStrategy,
    PortNumber, TableId,
};
use flowtrace_store::NetworkView;

/// Installed state of one device, indexed by table and group id.
#[derive(Debug, Clone)]
pub struct DeviceFlows {
    device: DeviceId,
    driver: Driver,
    /// Entries per table, ordered by priority descending then flow id.
    tables: BTreeMap<TableId, Vec<FlowEntry>>,
    groups: HashMap<GroupId, Group>,
}

impl DeviceFlows {
    /// Reads the `Added` entries and the groups of `device`.
    pub fn load<V: NetworkView + ?Sized>(view: &V, device: &DeviceId) -> Self {
        let mut tables: BTreeMap<TableId, Vec<FlowEntry>> = BTreeMap::new();
        for entry in view.entries_in_state(device, FlowState::Added) {
            tables.entry(entry.table).or_default().push(entry);
        }
        for entries in tables.values_mut() {
            entries.sort_by(|a, b| b.priority.cmp(&a.priority).then(a.id.cmp(&b.id)));
        }
        let groups = view
            .groups_on(device)
            .into_iter()
            .map(|g| (g.id, g))
            .collect();
        DeviceFlows {
            device: device.clone(),
            driver: view.driver_of(device),
            tables,
            groups,
        }
    }

    pub fn device(&self) -> &DeviceId {
        &self.device
    }

    pub fn driver(&self) -> &Driver {
        &self.driver
    }

    /// `true` if the device has no installed entry at all.
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn entries_for(&self, table: TableId) -> &[FlowEntry] {
        self.tables.get(&table).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Highest priority entry of `table` matching the packet; lowest flow id
    /// wins a priority tie.
    pub fn best_match(
        &self,
        table: TableId,
        header: &HeaderState,
        in_port: PortNumber,
    ) -> Option<&FlowEntry> {
        self.entries_for(table)
            .iter()
            .find(|entry| entry_matches(entry, header, in_port))
    }

    /// Every matching entry of `table`, in [`best_match`](Self::best_match)
    /// order.
    pub fn all_matches(
        &self,
        table: TableId,
        header: &HeaderState,
        in_port: PortNumber,
    ) -> Vec<&FlowEntry> {
        self.entries_for(table)
            .iter()
            .filter(|entry| entry_matches(entry, header, in_port))
            .collect()
    }

    /// Matches according to the driver's strategy for `table`.
    pub fn lookup(
        &self,
        table: TableId,
        header: &HeaderState,
        in_port: PortNumber,
    ) -> Vec<&FlowEntry> {
        match self.driver.match_strategy(table) {
            MatchStrategy::All => self.all_matches(table, header, in_port),
            MatchStrategy::Single => self
                .best_match(table, header, in_port)
                .into_iter()
                .collect(),
        }
    }

    /// Smallest populated table id greater than `table`.
    pub fn next_populated_after(&self, table: TableId) -> Option<TableId> {
        self.tables
            .range(TableId(table.0.saturating_add(1))..)
            .next()
            .map(|(id, _)| *id)
            .filter(|id| *id > table)
    }

    pub fn group_of(&self, id: GroupId) -> Option<&Group> {
        self.groups.get(&id)
    }
}

/// An entry matches when its in-port constraint (if any) equals the visit's
/// ingress port and every other selector field accepts the header value.
fn entry_matches(entry: &FlowEntry, header: &HeaderState, in_port: PortNumber) -> bool {
    entry.selector.fields().all(|wanted| match wanted {
        Field::InPort(port) => *port == in_port,
        _ => header
            .get(wanted.field_type())
            .is_some_and(|actual| wanted.covers(actual)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowtrace_core::{
        ConnectPoint, Device, EthType, FlowId, GroupType, PipelineProfile, Treatment, VlanId,
    };
    use flowtrace_store::NetworkSnapshot;

    fn header() -> HeaderState {
        HeaderState::new()
            .with(Field::InPort(PortNumber::Physical(1)))
            .with(Field::EthType(EthType::IPV4))
            .with(Field::VlanId(VlanId::NONE))
    }

    fn load(snapshot: &NetworkSnapshot) -> DeviceFlows {
        DeviceFlows::load(snapshot, &DeviceId::new("leaf1"))
    }

    #[test]
    fn best_match_prefers_priority_then_lowest_id() {
        let snapshot = NetworkSnapshot::builder()
            .device(Device::new("leaf1"))
            .flow(FlowEntry::builder(9, "leaf1").priority(10).build())
            .flow(FlowEntry::builder(5, "leaf1").priority(20).build())
            .flow(FlowEntry::builder(3, "leaf1").priority(20).build())
            .build()
            .unwrap();
        let flows = load(&snapshot);
        let hit = flows
            .best_match(TableId(0), &header(), PortNumber::Physical(1))
            .unwrap();
        assert_eq!(hit.id, FlowId(3));
    }

    #[test]
    fn in_port_is_checked_against_visit_port() {
        let snapshot = NetworkSnapshot::builder()
            .device(Device::new("leaf1"))
            .flow(FlowEntry::builder(1, "leaf1").priority(50).in_port(2).build())
            .flow(FlowEntry::builder(2, "leaf1").priority(10).in_port(1).build())
            .build()
            .unwrap();
        let flows = load(&snapshot);
        let hit = flows
            .best_match(TableId(0), &header(), PortNumber::Physical(1))
            .unwrap();
        assert_eq!(hit.id, FlowId(2));
        assert!(flows
            .best_match(TableId(0), &header(), PortNumber::Physical(7))
            .is_none());
    }

    #[test]
    fn only_added_entries_participate() {
        let snapshot = NetworkSnapshot::builder()
            .device(Device::new("leaf1"))
            .flow(
                FlowEntry::builder(1, "leaf1")
                    .state(FlowState::PendingAdd)
                    .build(),
            )
            .build()
            .unwrap();
        assert!(load(&snapshot).is_empty());
    }

    #[test]
    fn hardware_multi_entry_table_returns_all() {
        let snapshot = NetworkSnapshot::builder()
            .device(
                Device::new("leaf1")
                    .with_driver(Driver::software("hw").with_pipeline(PipelineProfile::ofdpa())),
            )
            .flow(FlowEntry::builder(1, "leaf1").table(10).priority(5).build())
            .flow(FlowEntry::builder(2, "leaf1").table(10).priority(1).build())
            .flow(FlowEntry::builder(3, "leaf1").table(20).priority(5).build())
            .flow(FlowEntry::builder(4, "leaf1").table(20).priority(1).build())
            .build()
            .unwrap();
        let flows = load(&snapshot);
        let h = header();
        let ids = |v: Vec<&FlowEntry>| v.into_iter().map(|e| e.id).collect::<Vec<_>>();
        assert_eq!(
            ids(flows.lookup(TableId(10), &h, PortNumber::Physical(1))),
            vec![FlowId(1), FlowId(2)]
        );
        assert_eq!(
            ids(flows.lookup(TableId(20), &h, PortNumber::Physical(1))),
            vec![FlowId(3)]
        );
    }

    #[test]
    fn next_populated_table() {
        let snapshot = NetworkSnapshot::builder()
            .device(Device::new("leaf1"))
            .flow(FlowEntry::builder(1, "leaf1").table(10).build())
            .flow(FlowEntry::builder(2, "leaf1").table(30).build())
            .build()
            .unwrap();
        let flows = load(&snapshot);
        assert_eq!(flows.next_populated_after(TableId(0)), Some(TableId(10)));
        assert_eq!(flows.next_populated_after(TableId(10)), Some(TableId(30)));
        assert_eq!(flows.next_populated_after(TableId(30)), None);
        assert_eq!(flows.next_populated_after(TableId(u32::MAX)), None);
    }

    #[test]
    fn group_lookup() {
        let snapshot = NetworkSnapshot::builder()
            .device(Device::new("leaf1"))
            .group(
                Group::new(7, "leaf1", GroupType::Indirect)
                    .with_bucket(Treatment::builder().output(2).build()),
            )
            .edge_port(ConnectPoint::new("leaf1", 2))
            .build()
            .unwrap();
        let flows = load(&snapshot);
        assert!(flows.group_of(GroupId(7)).is_some());
        assert!(flows.group_of(GroupId(8)).is_none());
    }
}
