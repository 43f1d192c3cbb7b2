//! Network inventory records: devices, ports, links, hosts and routes.

use std::net::IpAddr;

use serde::{Deserialize, Serialize};

use crate::driver::Driver;
use crate::id::{ConnectPoint, DeviceId, HostId, IpPrefix, MacAddr, PortNumber, VlanId};

/// A device port and its administrative state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Port {
    pub number: PortNumber,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
}

fn enabled_by_default() -> bool {
    true
}

impl Port {
    pub fn enabled(number: u64) -> Self {
        Port {
            number: PortNumber::Physical(number),
            enabled: true,
        }
    }

    pub fn disabled(number: u64) -> Self {
        Port {
            number: PortNumber::Physical(number),
            enabled: false,
        }
    }
}

/// An infrastructure device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub id: DeviceId,
    #[serde(default = "enabled_by_default")]
    pub available: bool,
    #[serde(default)]
    pub driver: Driver,
    #[serde(default)]
    pub ports: Vec<Port>,
}

impl Device {
    /// An available device running a software driver with no ports.
    pub fn new(id: impl Into<DeviceId>) -> Self {
        Device {
            id: id.into(),
            available: true,
            driver: Driver::default(),
            ports: Vec::new(),
        }
    }

    pub fn with_driver(mut self, driver: Driver) -> Self {
        self.driver = driver;
        self
    }

    pub fn with_ports(mut self, ports: impl IntoIterator<Item = Port>) -> Self {
        self.ports.extend(ports);
        self
    }

    pub fn offline(mut self) -> Self {
        self.available = false;
        self
    }

    pub fn enabled_ports(&self) -> impl Iterator<Item = &Port> {
        self.ports.iter().filter(|p| p.enabled)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LinkState {
    #[default]
    Active,
    Inactive,
}

/// Directed link between two connect points.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Link {
    pub src: ConnectPoint,
    pub dst: ConnectPoint,
    #[serde(default)]
    pub state: LinkState,
}

impl Link {
    pub fn new(src: ConnectPoint, dst: ConnectPoint) -> Self {
        Link {
            src,
            dst,
            state: LinkState::Active,
        }
    }

    pub fn is_usable(&self) -> bool {
        self.state == LinkState::Active
    }
}

/// An end station attached at one or more locations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Host {
    pub id: HostId,
    pub mac: MacAddr,
    #[serde(default = "untagged")]
    pub vlan: VlanId,
    #[serde(default)]
    pub ips: Vec<IpAddr>,
    pub locations: Vec<ConnectPoint>,
}

fn untagged() -> VlanId {
    VlanId::NONE
}

impl Host {
    /// A host identified as `MAC/VLAN`.
    pub fn new(mac: MacAddr, vlan: VlanId, location: ConnectPoint) -> Self {
        Host {
            id: HostId::new(format!("{mac}/{vlan}")),
            mac,
            vlan,
            ips: Vec::new(),
            locations: vec![location],
        }
    }

    pub fn with_ip(mut self, ip: IpAddr) -> Self {
        self.ips.push(ip);
        self
    }

    pub fn with_location(mut self, location: ConnectPoint) -> Self {
        self.locations.push(location);
        self
    }

    pub fn is_dual_homed(&self) -> bool {
        self.locations.len() > 1
    }

    pub fn is_at(&self, cp: &ConnectPoint) -> bool {
        self.locations.contains(cp)
    }

    /// Addresses of one family, optionally without link-local ones.
    pub fn addresses(&self, ipv4: bool, skip_link_local: bool) -> impl Iterator<Item = &IpAddr> {
        self.ips
            .iter()
            .filter(move |ip| ip.is_ipv4() == ipv4)
            .filter(move |ip| !(skip_link_local && is_link_local(ip)))
    }

    pub fn shares_location_with(&self, other: &Host) -> bool {
        self.locations.iter().any(|cp| other.is_at(cp))
    }
}

/// Link-local unicast (`169.254.0.0/16`, `fe80::/10`).
pub fn is_link_local(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => v4.is_link_local(),
        IpAddr::V6(v6) => v6.segments()[0] & 0xffc0 == 0xfe80,
    }
}

/// A resolved unicast route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    pub prefix: IpPrefix,
    pub next_hop: IpAddr,
    #[serde(default)]
    pub location: Option<ConnectPoint>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn host() -> Host {
        Host::new(
            "00:00:00:00:00:01".parse().unwrap(),
            VlanId::NONE,
            ConnectPoint::new("leaf1", 1),
        )
    }

    #[test]
    fn host_id_and_locations() {
        let h = host().with_location(ConnectPoint::new("leaf2", 1));
        assert_eq!(h.id.as_str(), "00:00:00:00:00:01/None");
        assert!(h.is_dual_homed());
        assert!(h.is_at(&ConnectPoint::new("leaf2", 1)));
        assert!(!h.is_at(&ConnectPoint::new("leaf2", 2)));
    }

    #[test]
    fn address_filtering() {
        let h = host()
            .with_ip("169.254.0.7".parse().unwrap())
            .with_ip("10.0.1.1".parse().unwrap())
            .with_ip("fe80::1".parse().unwrap())
            .with_ip("2000::1".parse().unwrap());

        let v4: Vec<_> = h.addresses(true, true).collect();
        assert_eq!(v4, vec![&"10.0.1.1".parse::<IpAddr>().unwrap()]);
        assert_eq!(h.addresses(true, false).count(), 2);

        let v6: Vec<_> = h.addresses(false, true).collect();
        assert_eq!(v6, vec![&"2000::1".parse::<IpAddr>().unwrap()]);
    }

    #[test]
    fn enabled_ports_filter() {
        let d = Device::new("leaf1").with_ports([Port::enabled(1), Port::disabled(2), Port::enabled(3)]);
        assert_eq!(d.enabled_ports().count(), 2);
    }

    #[test]
    fn device_defaults_from_json() {
        let d: Device = serde_json::from_str(r#"{"id": "leaf1"}"#).unwrap();
        assert!(d.available);
        assert!(!d.driver.is_hardware());
    }
}
