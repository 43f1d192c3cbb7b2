//! In-memory network snapshot implementing every reader trait.
//!
//! [`NetworkSnapshot`] is a first-class backend for tests and for callers
//! that trace against a captured network state. Devices are nodes and links
//! are directed edges of a petgraph [`StableGraph`]; flows, groups and hosts
//! are indexed by device or id when the snapshot is built.
//!
//! The serialized form is [`SnapshotData`], a flat list per record kind, so a
//! snapshot file reads like an inventory dump.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::io::Read;
use std::net::IpAddr;

use indexmap::IndexMap;
use petgraph::stable_graph::{NodeIndex, StableGraph};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use flowtrace_core::{
    ConnectPoint, Device, DeviceId, FlowEntry, FlowState, Group, Host, HostId, Link, MacAddr,
    NodeId, Route,
};

use crate::error::StoreError;
use crate::traits::{
    DeviceReader, EdgePortReader, FlowReader, GroupReader, HostReader, MastershipReader,
    RouteReader, RouterConfigReader, TopologyReader,
};

/// Serialized form of a snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SnapshotData {
    #[serde(default)]
    pub devices: Vec<Device>,
    #[serde(default)]
    pub links: Vec<Link>,
    #[serde(default)]
    pub hosts: Vec<Host>,
    #[serde(default)]
    pub flows: Vec<FlowEntry>,
    #[serde(default)]
    pub groups: Vec<Group>,
    #[serde(default)]
    pub edge_ports: Vec<ConnectPoint>,
    #[serde(default)]
    pub masters: BTreeMap<DeviceId, NodeId>,
    #[serde(default)]
    pub routes: Vec<Route>,
    #[serde(default)]
    pub router_macs: BTreeMap<DeviceId, MacAddr>,
}

/// Immutable, indexed network state.
#[derive(Debug, Clone)]
pub struct NetworkSnapshot {
    devices: IndexMap<DeviceId, Device>,
    /// Device graph. Nodes also exist for link endpoints without a device
    /// record, so a trace can cross into them and report the device unknown.
    topology: StableGraph<DeviceId, Link>,
    node_index: HashMap<DeviceId, NodeIndex>,
    flows: HashMap<DeviceId, Vec<FlowEntry>>,
    groups: HashMap<DeviceId, Vec<Group>>,
    hosts: IndexMap<HostId, Host>,
    edge_ports: BTreeSet<ConnectPoint>,
    masters: BTreeMap<DeviceId, NodeId>,
    routes: Vec<Route>,
    router_macs: BTreeMap<DeviceId, MacAddr>,
}

impl NetworkSnapshot {
    pub fn builder() -> SnapshotBuilder {
        SnapshotBuilder::default()
    }

    /// Validates and indexes `data`.
    pub fn from_data(data: SnapshotData) -> Result<Self, StoreError> {
        let mut devices = IndexMap::with_capacity(data.devices.len());
        let mut topology = StableGraph::new();
        let mut node_index = HashMap::new();

        for device in data.devices {
            if devices.contains_key(&device.id) {
                return Err(StoreError::DuplicateDevice { device: device.id });
            }
            let idx = topology.add_node(device.id.clone());
            node_index.insert(device.id.clone(), idx);
            devices.insert(device.id.clone(), device);
        }

        for link in data.links {
            for end in [&link.src, &link.dst] {
                if !node_index.contains_key(&end.device) {
                    warn!(device = %end.device, link = %format!("{} -> {}", link.src, link.dst),
                        "link endpoint is not a known device");
                    let idx = topology.add_node(end.device.clone());
                    node_index.insert(end.device.clone(), idx);
                }
            }
            let (src, dst) = (node_index[&link.src.device], node_index[&link.dst.device]);
            topology.add_edge(src, dst, link);
        }

        let known = |device: &DeviceId, context: String| {
            if devices.contains_key(device) {
                Ok(())
            } else {
                Err(StoreError::UnknownDevice {
                    device: device.clone(),
                    context,
                })
            }
        };

        let mut flows: HashMap<DeviceId, Vec<FlowEntry>> = HashMap::new();
        let mut flow_ids = HashSet::new();
        for flow in data.flows {
            known(&flow.device, format!("flow {}", flow.id))?;
            if !flow_ids.insert((flow.device.clone(), flow.id)) {
                return Err(StoreError::DuplicateFlow {
                    device: flow.device,
                    flow: flow.id,
                });
            }
            flows.entry(flow.device.clone()).or_default().push(flow);
        }

        let mut groups: HashMap<DeviceId, Vec<Group>> = HashMap::new();
        for group in data.groups {
            known(&group.device, format!("group {}", group.id))?;
            groups.entry(group.device.clone()).or_default().push(group);
        }

        let mut hosts = IndexMap::with_capacity(data.hosts.len());
        for host in data.hosts {
            for location in &host.locations {
                known(&location.device, format!("host {}", host.id))?;
            }
            if hosts.contains_key(&host.id) {
                return Err(StoreError::DuplicateHost { host: host.id });
            }
            hosts.insert(host.id.clone(), host);
        }

        debug!(
            devices = devices.len(),
            links = topology.edge_count(),
            hosts = hosts.len(),
            "network snapshot built"
        );

        Ok(NetworkSnapshot {
            devices,
            topology,
            node_index,
            flows,
            groups,
            hosts,
            edge_ports: data.edge_ports.into_iter().collect(),
            masters: data.masters,
            routes: data.routes,
            router_macs: data.router_macs,
        })
    }

    pub fn from_json_str(json: &str) -> Result<Self, StoreError> {
        let data: SnapshotData = serde_json::from_str(json)?;
        Self::from_data(data)
    }

    pub fn from_json_reader<R: Read>(reader: R) -> Result<Self, StoreError> {
        let data: SnapshotData = serde_json::from_reader(reader)?;
        Self::from_data(data)
    }

    /// Flattens the snapshot back into its serialized form.
    pub fn to_data(&self) -> SnapshotData {
        let mut flows: Vec<FlowEntry> = Vec::new();
        let mut groups: Vec<Group> = Vec::new();
        for id in self.devices.keys() {
            flows.extend(self.flows.get(id).into_iter().flatten().cloned());
            groups.extend(self.groups.get(id).into_iter().flatten().cloned());
        }
        SnapshotData {
            devices: self.devices.values().cloned().collect(),
            links: self.topology.edge_weights().cloned().collect(),
            hosts: self.hosts.values().cloned().collect(),
            flows,
            groups,
            edge_ports: self.edge_ports.iter().cloned().collect(),
            masters: self.masters.clone(),
            routes: self.routes.clone(),
            router_macs: self.router_macs.clone(),
        }
    }

    pub fn to_json_string(&self) -> Result<String, StoreError> {
        Ok(serde_json::to_string_pretty(&self.to_data())?)
    }

    pub fn devices(&self) -> impl Iterator<Item = &Device> {
        self.devices.values()
    }

    pub fn device_count(&self) -> usize {
        self.devices.len()
    }

    pub fn link_count(&self) -> usize {
        self.topology.edge_count()
    }

    /// The device graph.
    pub fn topology(&self) -> &StableGraph<DeviceId, Link> {
        &self.topology
    }
}

// ---------------------------------------------------------------------------
// Reader implementations
// ---------------------------------------------------------------------------

impl FlowReader for NetworkSnapshot {
    fn entries_in_state(&self, device: &DeviceId, state: FlowState) -> Vec<FlowEntry> {
        self.flows
            .get(device)
            .into_iter()
            .flatten()
            .filter(|f| f.state == state)
            .cloned()
            .collect()
    }
}

impl GroupReader for NetworkSnapshot {
    fn groups_on(&self, device: &DeviceId) -> Vec<Group> {
        self.groups.get(device).cloned().unwrap_or_default()
    }
}

impl TopologyReader for NetworkSnapshot {
    fn egress_links(&self, cp: &ConnectPoint) -> Vec<Link> {
        let Some(&node) = self.node_index.get(&cp.device) else {
            return Vec::new();
        };
        let mut links: Vec<Link> = self
            .topology
            .edges_directed(node, Direction::Outgoing)
            .map(|edge| edge.weight())
            .filter(|link| link.src == *cp && link.is_usable())
            .cloned()
            .collect();
        links.sort_by(|a, b| a.dst.cmp(&b.dst));
        links
    }
}

impl HostReader for NetworkSnapshot {
    fn hosts(&self) -> Vec<Host> {
        self.hosts.values().cloned().collect()
    }

    fn host(&self, id: &HostId) -> Option<Host> {
        self.hosts.get(id).cloned()
    }
}

impl DeviceReader for NetworkSnapshot {
    fn device(&self, id: &DeviceId) -> Option<Device> {
        self.devices.get(id).cloned()
    }
}

impl EdgePortReader for NetworkSnapshot {
    fn is_edge_point(&self, cp: &ConnectPoint) -> bool {
        self.edge_ports.contains(cp)
    }
}

impl MastershipReader for NetworkSnapshot {
    fn master_for(&self, device: &DeviceId) -> Option<NodeId> {
        self.masters.get(device).cloned()
    }
}

impl RouteReader for NetworkSnapshot {
    fn longest_prefix_lookup(&self, ip: &IpAddr) -> Option<Route> {
        self.routes
            .iter()
            .filter(|route| route.prefix.contains(ip))
            .max_by_key(|route| route.prefix.prefix_len())
            .cloned()
    }
}

impl RouterConfigReader for NetworkSnapshot {
    fn router_mac(&self, device: &DeviceId) -> Option<MacAddr> {
        self.router_macs.get(device).copied()
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Incremental construction of a [`NetworkSnapshot`]. Validation happens in
/// [`SnapshotBuilder::build`].
#[derive(Debug, Clone, Default)]
pub struct SnapshotBuilder {
    data: SnapshotData,
}

impl SnapshotBuilder {
    pub fn device(mut self, device: Device) -> Self {
        self.data.devices.push(device);
        self
    }

    /// One directed, active link.
    pub fn link(mut self, src: ConnectPoint, dst: ConnectPoint) -> Self {
        self.data.links.push(Link::new(src, dst));
        self
    }

    /// Active links in both directions.
    pub fn bidi_link(self, a: ConnectPoint, b: ConnectPoint) -> Self {
        self.link(a.clone(), b.clone()).link(b, a)
    }

    pub fn add_link(mut self, link: Link) -> Self {
        self.data.links.push(link);
        self
    }

    pub fn host(mut self, host: Host) -> Self {
        self.data.hosts.push(host);
        self
    }

    pub fn flow(mut self, flow: FlowEntry) -> Self {
        self.data.flows.push(flow);
        self
    }

    pub fn group(mut self, group: Group) -> Self {
        self.data.groups.push(group);
        self
    }

    pub fn edge_port(mut self, cp: ConnectPoint) -> Self {
        self.data.edge_ports.push(cp);
        self
    }

    pub fn master(mut self, device: impl Into<DeviceId>, node: impl Into<String>) -> Self {
        self.data
            .masters
            .insert(device.into(), NodeId::new(node.into()));
        self
    }

    pub fn route(mut self, route: Route) -> Self {
        self.data.routes.push(route);
        self
    }

    pub fn router_mac(mut self, device: impl Into<DeviceId>, mac: MacAddr) -> Self {
        self.data.router_macs.insert(device.into(), mac);
        self
    }

    pub fn build(self) -> Result<NetworkSnapshot, StoreError> {
        NetworkSnapshot::from_data(self.data)
    }
}
