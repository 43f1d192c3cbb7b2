//! Read-only contracts of the network state consumed by the trace engine.
//!
//! Each trait covers one collaborator: flow rules, groups, topology, hosts,
//! devices and drivers, edge ports, mastership, routes and router config.
//! Reads are synchronous and infallible; an unknown key yields an empty
//! result. [`NetworkView`] bundles all of them and is implemented for any
//! type that implements every reader.

use std::net::IpAddr;

use flowtrace_core::{
    ConnectPoint, Device, DeviceId, Driver, FlowEntry, FlowState, Group, Host, HostId, Link,
    MacAddr, NodeId, Port, Route,
};

/// Installed flow rules.
pub trait FlowReader {
    /// Flow entries of `device` in lifecycle `state`, in store order.
    fn entries_in_state(&self, device: &DeviceId, state: FlowState) -> Vec<FlowEntry>;
}

/// Group tables.
pub trait GroupReader {
    fn groups_on(&self, device: &DeviceId) -> Vec<Group>;
}

/// Discovered infrastructure links.
pub trait TopologyReader {
    /// Usable links departing from `cp`, ordered by destination.
    fn egress_links(&self, cp: &ConnectPoint) -> Vec<Link>;
}

/// Discovered end stations.
pub trait HostReader {
    fn hosts(&self) -> Vec<Host>;

    fn host(&self, id: &HostId) -> Option<Host>;

    /// Hosts with a location at `cp`.
    fn hosts_at(&self, cp: &ConnectPoint) -> Vec<Host> {
        self.hosts().into_iter().filter(|h| h.is_at(cp)).collect()
    }

    fn hosts_by_ip(&self, ip: &IpAddr) -> Vec<Host> {
        self.hosts()
            .into_iter()
            .filter(|h| h.ips.contains(ip))
            .collect()
    }

    fn hosts_by_mac(&self, mac: &MacAddr) -> Vec<Host> {
        self.hosts().into_iter().filter(|h| h.mac == *mac).collect()
    }
}

/// Device inventory and drivers.
pub trait DeviceReader {
    fn device(&self, id: &DeviceId) -> Option<Device>;

    fn is_available(&self, id: &DeviceId) -> bool {
        self.device(id).is_some_and(|d| d.available)
    }

    /// Driver of `id`; the default software driver for unknown devices.
    fn driver_of(&self, id: &DeviceId) -> Driver {
        self.device(id).map(|d| d.driver).unwrap_or_default()
    }

    fn ports(&self, id: &DeviceId) -> Vec<Port> {
        self.device(id).map(|d| d.ports).unwrap_or_default()
    }
}

/// Ports facing outside the controlled topology.
pub trait EdgePortReader {
    fn is_edge_point(&self, cp: &ConnectPoint) -> bool;
}

/// Controller cluster mastership.
pub trait MastershipReader {
    fn master_for(&self, device: &DeviceId) -> Option<NodeId>;
}

/// Resolved unicast routes.
pub trait RouteReader {
    fn longest_prefix_lookup(&self, ip: &IpAddr) -> Option<Route>;
}

/// Per-device routing configuration.
pub trait RouterConfigReader {
    /// MAC address the device uses as L3 gateway.
    fn router_mac(&self, device: &DeviceId) -> Option<MacAddr>;
}

/// Everything the trace engine reads.
pub trait NetworkView:
    FlowReader
    + GroupReader
    + TopologyReader
    + HostReader
    + DeviceReader
    + EdgePortReader
    + MastershipReader
    + RouteReader
    + RouterConfigReader
{
}

impl<T> NetworkView for T where
    T: FlowReader
        + GroupReader
        + TopologyReader
        + HostReader
        + DeviceReader
        + EdgePortReader
        + MastershipReader
        + RouteReader
        + RouterConfigReader
{
}
