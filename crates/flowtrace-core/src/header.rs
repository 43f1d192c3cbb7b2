//! Symbolic packet header: a map from field type to value.
//!
//! [`HeaderState`] is the packet the trace engine pushes through device
//! pipelines. It is also used as a flow entry's match selector, where it only
//! constrains the fields it lists. Each field type holds at most one value;
//! writing a field replaces the previous value.
//!
//! The map lives behind an `Arc`, so cloning a header (every branch fork does)
//! is a reference-count bump and the first write after a fork copies the map.
//! Sibling branches therefore never observe each other's field changes.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::id::{EthType, IpPrefix, MacAddr, PortNumber, VlanId};

/// Header field kinds understood by the engine.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum FieldType {
    InPort,
    EthType,
    EthSrc,
    EthDst,
    VlanId,
    IpProto,
    Ipv4Src,
    Ipv4Dst,
    Ipv6Src,
    Ipv6Dst,
    L4Src,
    L4Dst,
    MplsLabel,
    MplsBos,
}

impl FieldType {
    /// Field types matched by prefix containment instead of equality.
    pub fn is_ip(&self) -> bool {
        matches!(
            self,
            FieldType::Ipv4Src | FieldType::Ipv4Dst | FieldType::Ipv6Src | FieldType::Ipv6Dst
        )
    }
}

/// A header field together with its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Field {
    InPort(PortNumber),
    EthType(EthType),
    EthSrc(MacAddr),
    EthDst(MacAddr),
    VlanId(VlanId),
    IpProto(u8),
    Ipv4Src(IpPrefix),
    Ipv4Dst(IpPrefix),
    Ipv6Src(IpPrefix),
    Ipv6Dst(IpPrefix),
    L4Src(u16),
    L4Dst(u16),
    MplsLabel(u32),
    MplsBos(bool),
}

impl Field {
    pub fn field_type(&self) -> FieldType {
        match self {
            Field::InPort(_) => FieldType::InPort,
            Field::EthType(_) => FieldType::EthType,
            Field::EthSrc(_) => FieldType::EthSrc,
            Field::EthDst(_) => FieldType::EthDst,
            Field::VlanId(_) => FieldType::VlanId,
            Field::IpProto(_) => FieldType::IpProto,
            Field::Ipv4Src(_) => FieldType::Ipv4Src,
            Field::Ipv4Dst(_) => FieldType::Ipv4Dst,
            Field::Ipv6Src(_) => FieldType::Ipv6Src,
            Field::Ipv6Dst(_) => FieldType::Ipv6Dst,
            Field::L4Src(_) => FieldType::L4Src,
            Field::L4Dst(_) => FieldType::L4Dst,
            Field::MplsLabel(_) => FieldType::MplsLabel,
            Field::MplsBos(_) => FieldType::MplsBos,
        }
    }

    /// Returns `true` if this selector value accepts the packet value `actual`.
    ///
    /// IP fields match when the packet's address lies in the selector prefix;
    /// every other field requires equality.
    pub fn covers(&self, actual: &Field) -> bool {
        match (self, actual) {
            (Field::Ipv4Src(net), Field::Ipv4Src(a))
            | (Field::Ipv4Dst(net), Field::Ipv4Dst(a))
            | (Field::Ipv6Src(net), Field::Ipv6Src(a))
            | (Field::Ipv6Dst(net), Field::Ipv6Dst(a)) => net.covers(a),
            _ => self == actual,
        }
    }
}

/// Immutable-per-step packet header with copy-on-write forking.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "Vec<Field>", into = "Vec<Field>")]
pub struct HeaderState {
    fields: Arc<BTreeMap<FieldType, Field>>,
}

impl HeaderState {
    pub fn new() -> Self {
        HeaderState::default()
    }

    /// Builder form of [`insert`](Self::insert).
    pub fn with(mut self, field: Field) -> Self {
        self.insert(field);
        self
    }

    /// Returns a new header with `field` overwritten; `self` is unchanged.
    pub fn set(&self, field: Field) -> Self {
        self.clone().with(field)
    }

    /// Returns a new header without any value for `field_type`.
    pub fn without(&self, field_type: FieldType) -> Self {
        let mut next = self.clone();
        next.remove(field_type);
        next
    }

    /// Overwrites `field` in place, copying the map first if it is shared.
    pub fn insert(&mut self, field: Field) {
        Arc::make_mut(&mut self.fields).insert(field.field_type(), field);
    }

    /// Removes `field_type` in place. Does not copy when the field is absent.
    pub fn remove(&mut self, field_type: FieldType) {
        if self.fields.contains_key(&field_type) {
            Arc::make_mut(&mut self.fields).remove(&field_type);
        }
    }

    pub fn get(&self, field_type: FieldType) -> Option<&Field> {
        self.fields.get(&field_type)
    }

    pub fn contains(&self, field_type: FieldType) -> bool {
        self.fields.contains_key(&field_type)
    }

    /// Returns `true` iff every field constrained by `selector` is present in
    /// this header with an accepted value. Fields the selector does not
    /// mention are "don't care".
    pub fn matches(&self, selector: &HeaderState) -> bool {
        selector.fields().all(|wanted| {
            self.get(wanted.field_type())
                .is_some_and(|actual| wanted.covers(actual))
        })
    }

    /// Fields in field-type order.
    pub fn fields(&self) -> impl Iterator<Item = &Field> {
        self.fields.values()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Returns `true` if both headers still share one underlying map.
    pub fn shares_storage_with(&self, other: &HeaderState) -> bool {
        Arc::ptr_eq(&self.fields, &other.fields)
    }

    // -----------------------------------------------------------------------
    // Typed accessors
    // -----------------------------------------------------------------------

    pub fn in_port(&self) -> Option<PortNumber> {
        match self.get(FieldType::InPort) {
            Some(Field::InPort(p)) => Some(*p),
            _ => None,
        }
    }

    pub fn eth_type(&self) -> Option<EthType> {
        match self.get(FieldType::EthType) {
            Some(Field::EthType(t)) => Some(*t),
            _ => None,
        }
    }

    pub fn eth_dst(&self) -> Option<MacAddr> {
        match self.get(FieldType::EthDst) {
            Some(Field::EthDst(m)) => Some(*m),
            _ => None,
        }
    }

    pub fn vlan_id(&self) -> Option<VlanId> {
        match self.get(FieldType::VlanId) {
            Some(Field::VlanId(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn mpls_label(&self) -> Option<u32> {
        match self.get(FieldType::MplsLabel) {
            Some(Field::MplsLabel(l)) => Some(*l),
            _ => None,
        }
    }

    pub fn mpls_bos(&self) -> Option<bool> {
        match self.get(FieldType::MplsBos) {
            Some(Field::MplsBos(b)) => Some(*b),
            _ => None,
        }
    }

    /// Destination IP, IPv4 preferred.
    pub fn ip_dst(&self) -> Option<IpPrefix> {
        match (self.get(FieldType::Ipv4Dst), self.get(FieldType::Ipv6Dst)) {
            (Some(Field::Ipv4Dst(p)), _) => Some(*p),
            (_, Some(Field::Ipv6Dst(p))) => Some(*p),
            _ => None,
        }
    }
}

impl FromIterator<Field> for HeaderState {
    fn from_iter<I: IntoIterator<Item = Field>>(iter: I) -> Self {
        let mut header = HeaderState::new();
        for field in iter {
            header.insert(field);
        }
        header
    }
}

impl From<Vec<Field>> for HeaderState {
    fn from(fields: Vec<Field>) -> Self {
        fields.into_iter().collect()
    }
}

impl From<HeaderState> for Vec<Field> {
    fn from(header: HeaderState) -> Self {
        header.fields().copied().collect()
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FieldType::InPort => "IN_PORT",
            FieldType::EthType => "ETH_TYPE",
            FieldType::EthSrc => "ETH_SRC",
            FieldType::EthDst => "ETH_DST",
            FieldType::VlanId => "VLAN_VID",
            FieldType::IpProto => "IP_PROTO",
            FieldType::Ipv4Src => "IPV4_SRC",
            FieldType::Ipv4Dst => "IPV4_DST",
            FieldType::Ipv6Src => "IPV6_SRC",
            FieldType::Ipv6Dst => "IPV6_DST",
            FieldType::L4Src => "L4_SRC",
            FieldType::L4Dst => "L4_DST",
            FieldType::MplsLabel => "MPLS_LABEL",
            FieldType::MplsBos => "MPLS_BOS",
        };
        f.write_str(name)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:", self.field_type())?;
        match self {
            Field::InPort(p) => write!(f, "{p}"),
            Field::EthType(t) => write!(f, "{t}"),
            Field::EthSrc(m) | Field::EthDst(m) => write!(f, "{m}"),
            Field::VlanId(v) => write!(f, "{v}"),
            Field::IpProto(p) => write!(f, "{p}"),
            Field::Ipv4Src(p) | Field::Ipv4Dst(p) | Field::Ipv6Src(p) | Field::Ipv6Dst(p) => {
                write!(f, "{p}")
            }
            Field::L4Src(p) | Field::L4Dst(p) => write!(f, "{p}"),
            Field::MplsLabel(l) => write!(f, "{l}"),
            Field::MplsBos(b) => write!(f, "{b}"),
        }
    }
}

impl fmt::Display for HeaderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, field) in self.fields().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{field}")?;
        }
        f.write_str("]")
    }
}
