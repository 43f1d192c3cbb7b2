//! Identifier and address newtypes used throughout the trace model.
//!
//! Every identifier is a distinct newtype so that a `GroupId` cannot be
//! passed where a `TableId` is expected. Location types ([`PortNumber`],
//! [`ConnectPoint`]) and address types ([`MacAddr`], [`IpPrefix`]) serialize
//! as their canonical string form so that captured network snapshots stay
//! readable.

use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Identity of an infrastructure device (switch), e.g. `of:0000000000000001`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(String);

impl DeviceId {
    pub fn new(id: impl Into<String>) -> Self {
        DeviceId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for DeviceId {
    fn from(id: &str) -> Self {
        DeviceId(id.to_string())
    }
}

/// A port on a device. `Controller` is the reserved logical port used to
/// punt packets to the control plane (and to inject packets from it).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "String", into = "String")]
pub enum PortNumber {
    Physical(u64),
    Controller,
}

impl PortNumber {
    pub fn is_controller(&self) -> bool {
        matches!(self, PortNumber::Controller)
    }
}

impl From<u64> for PortNumber {
    fn from(n: u64) -> Self {
        PortNumber::Physical(n)
    }
}

/// Stable flow entry identifier, also used as the same-priority tie-break.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct FlowId(pub u64);

/// Flow table identifier within a device pipeline. Table 0 is the first.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct TableId(pub u32);

/// Group identifier, unique per device.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct GroupId(pub u32);

/// End-station identity, conventionally `MAC/VLAN`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HostId(String);

impl HostId {
    pub fn new(id: impl Into<String>) -> Self {
        HostId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Identity of a controller cluster member.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        NodeId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// A `(device, port)` location in the network.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ConnectPoint {
    pub device: DeviceId,
    pub port: PortNumber,
}

impl ConnectPoint {
    /// Location of a physical port.
    pub fn new(device: impl Into<DeviceId>, port: u64) -> Self {
        Self::at(device, PortNumber::Physical(port))
    }

    pub fn at(device: impl Into<DeviceId>, port: PortNumber) -> Self {
        ConnectPoint {
            device: device.into(),
            port,
        }
    }

    /// The controller port of `device`.
    pub fn controller(device: impl Into<DeviceId>) -> Self {
        Self::at(device, PortNumber::Controller)
    }
}

/// Ethernet frame type.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct EthType(pub u16);

impl EthType {
    pub const IPV4: EthType = EthType(0x0800);
    pub const ARP: EthType = EthType(0x0806);
    pub const VLAN: EthType = EthType(0x8100);
    pub const IPV6: EthType = EthType(0x86dd);
    pub const MPLS_UNICAST: EthType = EthType(0x8847);
    pub const MPLS_MULTICAST: EthType = EthType(0x8848);
    pub const LLDP: EthType = EthType(0x88cc);
    pub const BDDP: EthType = EthType(0x8942);

    pub fn is_mpls(&self) -> bool {
        *self == EthType::MPLS_UNICAST || *self == EthType::MPLS_MULTICAST
    }

    /// LLDP and BDDP are the link discovery frame types.
    pub fn is_discovery(&self) -> bool {
        *self == EthType::LLDP || *self == EthType::BDDP
    }
}

/// VLAN identifier. [`VlanId::NONE`] marks an untagged packet.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(from = "Option<u16>", into = "Option<u16>")]
pub struct VlanId(u16);

impl VlanId {
    pub const NONE: VlanId = VlanId(u16::MAX);

    /// Largest valid 802.1Q VLAN id.
    pub const MAX_VID: u16 = 4095;

    pub fn new(vid: u16) -> Result<Self, CoreError> {
        if vid > Self::MAX_VID {
            return Err(CoreError::InvalidVlan { vid });
        }
        Ok(VlanId(vid))
    }

    pub fn is_none(&self) -> bool {
        *self == VlanId::NONE
    }

    pub fn vid(&self) -> Option<u16> {
        if self.is_none() {
            None
        } else {
            Some(self.0)
        }
    }
}

impl From<Option<u16>> for VlanId {
    fn from(vid: Option<u16>) -> Self {
        match vid {
            Some(v) if v <= VlanId::MAX_VID => VlanId(v),
            _ => VlanId::NONE,
        }
    }
}

impl From<VlanId> for Option<u16> {
    fn from(vlan: VlanId) -> Self {
        vlan.vid()
    }
}

/// 48-bit Ethernet address.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "String", into = "String")]
pub struct MacAddr(pub [u8; 6]);

impl MacAddr {
    /// Group (multicast or broadcast) bit of the first octet.
    pub fn is_multicast(&self) -> bool {
        self.0[0] & 0x01 == 0x01
    }
}

/// An IP network: address plus prefix length. A host address is a prefix of
/// full length (`/32` or `/128`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct IpPrefix {
    addr: IpAddr,
    len: u8,
}

impl IpPrefix {
    pub fn new(addr: IpAddr, len: u8) -> Result<Self, CoreError> {
        let max = max_prefix_len(&addr);
        if len > max {
            return Err(CoreError::InvalidPrefix {
                input: format!("{addr}/{len}"),
            });
        }
        Ok(IpPrefix { addr, len })
    }

    /// Full-length prefix holding a single address.
    pub fn host(addr: IpAddr) -> Self {
        IpPrefix {
            addr,
            len: max_prefix_len(&addr),
        }
    }

    pub fn addr(&self) -> IpAddr {
        self.addr
    }

    pub fn prefix_len(&self) -> u8 {
        self.len
    }

    pub fn is_ipv4(&self) -> bool {
        self.addr.is_ipv4()
    }

    /// Returns `true` if `addr` lies inside this prefix.
    pub fn contains(&self, addr: &IpAddr) -> bool {
        match (self.addr, addr) {
            (IpAddr::V4(net), IpAddr::V4(a)) => {
                let mask = mask_u32(self.len);
                u32::from(net) & mask == u32::from(*a) & mask
            }
            (IpAddr::V6(net), IpAddr::V6(a)) => {
                let mask = mask_u128(self.len);
                u128::from(net) & mask == u128::from(*a) & mask
            }
            _ => false,
        }
    }

    /// Returns `true` if every address of `other` lies inside this prefix.
    pub fn covers(&self, other: &IpPrefix) -> bool {
        other.len >= self.len && self.contains(&other.addr)
    }
}

fn max_prefix_len(addr: &IpAddr) -> u8 {
    match addr {
        IpAddr::V4(_) => 32,
        IpAddr::V6(_) => 128,
    }
}

fn mask_u32(len: u8) -> u32 {
    if len == 0 {
        0
    } else {
        u32::MAX << (32 - u32::from(len))
    }
}

fn mask_u128(len: u8) -> u128 {
    if len == 0 {
        0
    } else {
        u128::MAX << (128 - u32::from(len))
    }
}

// ---------------------------------------------------------------------------
// Display
// ---------------------------------------------------------------------------

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for HostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for PortNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PortNumber::Physical(n) => write!(f, "{n}"),
            PortNumber::Controller => f.write_str("CONTROLLER"),
        }
    }
}

impl fmt::Display for ConnectPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.device, self.port)
    }
}

impl fmt::Display for FlowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:x}", self.0)
    }
}

impl fmt::Display for EthType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            EthType::IPV4 => f.write_str("ipv4"),
            EthType::ARP => f.write_str("arp"),
            EthType::VLAN => f.write_str("vlan"),
            EthType::IPV6 => f.write_str("ipv6"),
            EthType::MPLS_UNICAST => f.write_str("mpls_unicast"),
            EthType::MPLS_MULTICAST => f.write_str("mpls_multicast"),
            EthType::LLDP => f.write_str("lldp"),
            EthType::BDDP => f.write_str("bddp"),
            EthType(other) => write!(f, "0x{other:04x}"),
        }
    }
}

impl fmt::Display for VlanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.vid() {
            Some(v) => write!(f, "{v}"),
            None => f.write_str("None"),
        }
    }
}

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = self.0;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            b[0], b[1], b[2], b[3], b[4], b[5]
        )
    }
}

impl fmt::Display for IpPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.addr, self.len)
    }
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

impl FromStr for PortNumber {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("controller") {
            return Ok(PortNumber::Controller);
        }
        s.parse::<u64>()
            .map(PortNumber::Physical)
            .map_err(|_| CoreError::InvalidPort {
                input: s.to_string(),
            })
    }
}

impl FromStr for ConnectPoint {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (device, port) = s
            .rsplit_once('/')
            .filter(|(device, _)| !device.is_empty())
            .ok_or_else(|| CoreError::InvalidConnectPoint {
                input: s.to_string(),
            })?;
        Ok(ConnectPoint {
            device: DeviceId::new(device),
            port: port.parse()?,
        })
    }
}

impl FromStr for MacAddr {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || CoreError::InvalidMac {
            input: s.to_string(),
        };
        let mut octets = [0u8; 6];
        let mut parts = s.split(':');
        for octet in octets.iter_mut() {
            let part = parts.next().ok_or_else(invalid)?;
            if part.len() != 2 {
                return Err(invalid());
            }
            *octet = u8::from_str_radix(part, 16).map_err(|_| invalid())?;
        }
        if parts.next().is_some() {
            return Err(invalid());
        }
        Ok(MacAddr(octets))
    }
}

impl FromStr for IpPrefix {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || CoreError::InvalidPrefix {
            input: s.to_string(),
        };
        match s.split_once('/') {
            Some((addr, len)) => {
                let addr: IpAddr = addr.parse().map_err(|_| invalid())?;
                let len: u8 = len.parse().map_err(|_| invalid())?;
                IpPrefix::new(addr, len)
            }
            None => s.parse::<IpAddr>().map(IpPrefix::host).map_err(|_| invalid()),
        }
    }
}

// String bridges for serde.

impl TryFrom<String> for PortNumber {
    type Error = CoreError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<PortNumber> for String {
    fn from(port: PortNumber) -> Self {
        port.to_string()
    }
}

impl TryFrom<String> for ConnectPoint {
    type Error = CoreError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<ConnectPoint> for String {
    fn from(cp: ConnectPoint) -> Self {
        cp.to_string()
    }
}

impl TryFrom<String> for MacAddr {
    type Error = CoreError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<MacAddr> for String {
    fn from(mac: MacAddr) -> Self {
        mac.to_string()
    }
}

impl TryFrom<String> for IpPrefix {
    type Error = CoreError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<IpPrefix> for String {
    fn from(prefix: IpPrefix) -> Self {
        prefix.to_string()
    }
}
