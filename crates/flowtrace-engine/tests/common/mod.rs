//! Shared network fixtures for the trace integration tests.
//!
//! Every scenario builds a complete [`NetworkSnapshot`]. Device names follow a
//! leaf/spine fabric: leaves face hosts on port 1 and 2, uplinks start at
//! port 3.

#![allow(dead_code)]

use std::net::IpAddr;

use flowtrace_core::{
    ConnectPoint, Device, Driver, EthType, Field, FlowEntry, Group, GroupType, HeaderState, Host,
    IpPrefix, MacAddr, Port, Treatment, VlanId,
};
use flowtrace_store::{NetworkSnapshot, SnapshotBuilder};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

pub fn cp(device: &str, port: u64) -> ConnectPoint {
    ConnectPoint::new(device, port)
}

pub fn mac(last: u8) -> MacAddr {
    MacAddr([0, 0, 0, 0, 0, last])
}

pub fn ip(s: &str) -> IpAddr {
    s.parse().unwrap()
}

pub fn vlan(vid: u16) -> VlanId {
    VlanId::new(vid).unwrap()
}

pub fn host_prefix(s: &str) -> IpPrefix {
    IpPrefix::host(ip(s))
}

/// Untagged IPv4 packet towards 10.0.2.1.
pub fn ipv4_packet() -> HeaderState {
    HeaderState::new()
        .with(Field::EthType(EthType::IPV4))
        .with(Field::VlanId(VlanId::NONE))
        .with(Field::Ipv4Dst(host_prefix("10.0.2.1")))
}

fn out(port: u64) -> Treatment {
    Treatment::builder().output(port).build()
}

fn ofdpa(name: &str) -> Device {
    Device::new(name).with_driver(Driver::named("ofdpa3"))
}

// ---------------------------------------------------------------------------
// Single device
// ---------------------------------------------------------------------------

/// leaf1: one entry forwarding port 1 to a host on port 2.
pub fn single_flow() -> NetworkSnapshot {
    NetworkSnapshot::builder()
        .device(Device::new("leaf1"))
        .host(Host::new(mac(2), VlanId::NONE, cp("leaf1", 2)))
        .flow(
            FlowEntry::builder(1, "leaf1")
                .priority(40000)
                .in_port(1)
                .treatment(out(2))
                .build(),
        )
        .build()
        .unwrap()
}

/// leaf1: table 0 tags VLAN 10, table 10 matches it and outputs to an edge
/// port.
pub fn dual_flow_vlan() -> NetworkSnapshot {
    NetworkSnapshot::builder()
        .device(Device::new("leaf1"))
        .edge_port(cp("leaf1", 2))
        .flow(
            FlowEntry::builder(1, "leaf1")
                .in_port(1)
                .treatment(Treatment::builder().set_vlan(vlan(10)).transition(10).build())
                .build(),
        )
        .flow(
            FlowEntry::builder(2, "leaf1")
                .table(10)
                .matching(Field::VlanId(vlan(10)))
                .treatment(out(2))
                .build(),
        )
        .build()
        .unwrap()
}

/// leaf1: entry to an indirect group rewriting the destination MAC.
pub fn flow_and_group() -> NetworkSnapshot {
    NetworkSnapshot::builder()
        .device(Device::new("leaf1"))
        .host(Host::new(mac(2), VlanId::NONE, cp("leaf1", 2)))
        .flow(
            FlowEntry::builder(1, "leaf1")
                .treatment(Treatment::builder().group(0x1000).build())
                .build(),
        )
        .group(
            Group::new(0x1000, "leaf1", GroupType::Indirect)
                .with_bucket(Treatment::builder().set_eth_dst(mac(2)).output(2).build()),
        )
        .build()
        .unwrap()
}

/// leaf1: table 0 defers an MPLS push, table 10 clears it and outputs.
pub fn clear_deferred() -> NetworkSnapshot {
    NetworkSnapshot::builder()
        .device(Device::new("leaf1"))
        .edge_port(cp("leaf1", 2))
        .flow(
            FlowEntry::builder(1, "leaf1")
                .treatment(
                    Treatment::builder()
                        .transition(10)
                        .deferred()
                        .push_mpls()
                        .set_mpls(204)
                        .build(),
                )
                .build(),
        )
        .flow(
            FlowEntry::builder(2, "leaf1")
                .table(10)
                .treatment(Treatment::builder().wipe_deferred().output(2).build())
                .build(),
        )
        .build()
        .unwrap()
}

/// leaf1 punts everything to the controller after tagging VLAN 20.
pub fn controller_punt() -> NetworkSnapshot {
    NetworkSnapshot::builder()
        .device(Device::new("leaf1"))
        .master("leaf1", "10.0.0.1")
        .flow(
            FlowEntry::builder(1, "leaf1")
                .treatment(Treatment::builder().set_vlan(vlan(20)).punt().build())
                .build(),
        )
        .build()
        .unwrap()
}

/// leaf1: ALL group replicating to two edge ports.
pub fn multicast_edge() -> NetworkSnapshot {
    NetworkSnapshot::builder()
        .device(Device::new("leaf1"))
        .edge_port(cp("leaf1", 2))
        .edge_port(cp("leaf1", 3))
        .flow(
            FlowEntry::builder(1, "leaf1")
                .treatment(Treatment::builder().group(7).build())
                .build(),
        )
        .group(
            Group::new(7, "leaf1", GroupType::All)
                .with_bucket(out(2))
                .with_bucket(out(3)),
        )
        .build()
        .unwrap()
}

/// leaf1: entry points at a group without buckets.
pub fn no_buckets() -> NetworkSnapshot {
    NetworkSnapshot::builder()
        .device(Device::new("leaf1"))
        .flow(
            FlowEntry::builder(1, "leaf1")
                .treatment(Treatment::builder().group(5).build())
                .build(),
        )
        .group(Group::new(5, "leaf1", GroupType::Select))
        .build()
        .unwrap()
}

/// leaf1: entry outputs on the port the packet came in.
pub fn same_output() -> NetworkSnapshot {
    NetworkSnapshot::builder()
        .device(Device::new("leaf1"))
        .edge_port(cp("leaf1", 1))
        .flow(FlowEntry::builder(1, "leaf1").treatment(out(1)).build())
        .build()
        .unwrap()
}

/// leaf1 with enabled ports 1 and 2 (both edge) and disabled port 3. No
/// flow entries.
pub fn discovery_flood() -> NetworkSnapshot {
    NetworkSnapshot::builder()
        .device(Device::new("leaf1").with_ports([
            Port::enabled(1),
            Port::enabled(2),
            Port::disabled(3),
        ]))
        .edge_port(cp("leaf1", 1))
        .edge_port(cp("leaf1", 2))
        .edge_port(cp("leaf1", 3))
        .build()
        .unwrap()
}

/// OF-DPA leaf: the VLAN table has two entries, the termination MAC table
/// misses and the pipeline falls through to bridging.
pub fn hardware_leaf() -> NetworkSnapshot {
    NetworkSnapshot::builder()
        .device(ofdpa("leaf1"))
        .edge_port(cp("leaf1", 2))
        .flow(
            FlowEntry::builder(1, "leaf1")
                .in_port(1)
                .treatment(Treatment::builder().transition(10).build())
                .build(),
        )
        .flow(
            FlowEntry::builder(2, "leaf1")
                .table(10)
                .priority(20)
                .treatment(Treatment::builder().set_vlan(vlan(10)).transition(20).build())
                .build(),
        )
        .flow(
            FlowEntry::builder(3, "leaf1")
                .table(10)
                .priority(10)
                .treatment(Treatment::builder().set_vlan(vlan(20)).transition(20).build())
                .build(),
        )
        .flow(
            FlowEntry::builder(4, "leaf1")
                .table(20)
                .matching(Field::EthType(EthType::ARP))
                .treatment(Treatment::builder().transition(30).build())
                .build(),
        )
        .flow(
            FlowEntry::builder(5, "leaf1")
                .table(30)
                .treatment(out(9))
                .build(),
        )
        .flow(
            FlowEntry::builder(6, "leaf1")
                .table(50)
                .treatment(Treatment::builder().deferred().group(0x000a_0002).build())
                .build(),
        )
        .group(
            Group::new(0x000a_0002, "leaf1", GroupType::Indirect)
                .with_bucket(out(2)),
        )
        .build()
        .unwrap()
}

/// OF-DPA leaf admitting untagged traffic on port 1 the way the hardware
/// does: one VLAN table entry tags the packet, a second one matches the tag
/// and moves on to bridging. Without `tagged_entry` only the first exists.
pub fn untagged_admission(tagged_entry: bool) -> NetworkSnapshot {
    let builder = NetworkSnapshot::builder()
        .device(ofdpa("leaf1"))
        .host(Host::new(mac(2), VlanId::NONE, cp("leaf1", 2)))
        .flow(
            FlowEntry::builder(1, "leaf1")
                .table(10)
                .priority(32768)
                .in_port(1)
                .matching(Field::VlanId(VlanId::NONE))
                .treatment(Treatment::builder().set_vlan(vlan(10)).build())
                .build(),
        )
        .flow(
            FlowEntry::builder(3, "leaf1")
                .table(50)
                .matching(Field::VlanId(vlan(10)))
                .treatment(Treatment::builder().deferred().group(0x000a_0002).build())
                .build(),
        )
        .group(
            Group::new(0x000a_0002, "leaf1", GroupType::Indirect)
                .with_bucket(Treatment::builder().pop_vlan().output(2).build()),
        );
    let builder = if tagged_entry {
        builder.flow(
            FlowEntry::builder(2, "leaf1")
                .table(10)
                .priority(32768)
                .in_port(1)
                .matching(Field::VlanId(vlan(10)))
                .treatment(Treatment::builder().transition(20).build())
                .build(),
        )
    } else {
        builder
    };
    builder.build().unwrap()
}

// ---------------------------------------------------------------------------
// Fabrics
// ---------------------------------------------------------------------------

fn fabric_devices(builder: SnapshotBuilder, names: &[&str]) -> SnapshotBuilder {
    names
        .iter()
        .fold(builder, |b, name| b.device(Device::new(*name)))
}

/// leaf1 - spine1 - leaf2, destination host on leaf2/1.
pub fn three_device_path() -> NetworkSnapshot {
    fabric_devices(NetworkSnapshot::builder(), &["leaf1", "spine1", "leaf2"])
        .bidi_link(cp("leaf1", 3), cp("spine1", 1))
        .bidi_link(cp("spine1", 2), cp("leaf2", 3))
        .host(Host::new(mac(1), VlanId::NONE, cp("leaf1", 1)).with_ip(ip("10.0.1.1")))
        .host(Host::new(mac(21), VlanId::NONE, cp("leaf2", 1)).with_ip(ip("10.0.2.1")))
        .router_mac("leaf1", mac(0xa1))
        .router_mac("leaf2", mac(0xa2))
        .flow(
            FlowEntry::builder(1, "leaf1")
                .matching(Field::Ipv4Dst("10.0.2.0/24".parse().unwrap()))
                .treatment(out(3))
                .build(),
        )
        .flow(
            FlowEntry::builder(2, "spine1")
                .in_port(1)
                .treatment(out(2))
                .build(),
        )
        .flow(
            FlowEntry::builder(3, "leaf2")
                .matching(Field::Ipv4Dst(host_prefix("10.0.2.1")))
                .treatment(Treatment::builder().set_eth_dst(mac(21)).output(1).build())
                .build(),
        )
        .build()
        .unwrap()
}

/// leaf1 load-balances over spine1 (port 3) and spine2 (port 4) towards a
/// host on leaf2/1.
pub fn group_fanout() -> NetworkSnapshot {
    fabric_devices(
        NetworkSnapshot::builder(),
        &["leaf1", "spine1", "spine2", "leaf2"],
    )
    .bidi_link(cp("leaf1", 3), cp("spine1", 1))
    .bidi_link(cp("leaf1", 4), cp("spine2", 1))
    .bidi_link(cp("spine1", 2), cp("leaf2", 3))
    .bidi_link(cp("spine2", 2), cp("leaf2", 4))
    .host(Host::new(mac(21), VlanId::NONE, cp("leaf2", 1)))
    .flow(
        FlowEntry::builder(1, "leaf1")
            .treatment(Treatment::builder().group(0x7000_0001).build())
            .build(),
    )
    .group(
        Group::new(0x7000_0001, "leaf1", GroupType::Select)
            .with_bucket(out(3))
            .with_bucket(out(4)),
    )
    .flow(FlowEntry::builder(2, "spine1").treatment(out(2)).build())
    .flow(FlowEntry::builder(3, "spine2").treatment(out(2)).build())
    .flow(FlowEntry::builder(4, "leaf2").treatment(out(1)).build())
    .build()
    .unwrap()
}

/// leaf3 load-balances over both spines; spine1 reaches leaf1, spine2
/// reaches leaf2, and the destination host is attached to both leaves.
pub fn dual_homed() -> NetworkSnapshot {
    fabric_devices(
        NetworkSnapshot::builder(),
        &["leaf1", "leaf2", "leaf3", "spine1", "spine2"],
    )
    .bidi_link(cp("leaf3", 3), cp("spine1", 3))
    .bidi_link(cp("leaf3", 4), cp("spine2", 3))
    .bidi_link(cp("spine1", 1), cp("leaf1", 3))
    .bidi_link(cp("spine2", 1), cp("leaf2", 3))
    .host(Host::new(mac(31), VlanId::NONE, cp("leaf3", 1)).with_ip(ip("10.0.3.1")))
    .host(
        Host::new(mac(12), VlanId::NONE, cp("leaf1", 1))
            .with_location(cp("leaf2", 1))
            .with_ip(ip("10.0.1.2")),
    )
    .router_mac("leaf3", mac(0xa3))
    .flow(
        FlowEntry::builder(1, "leaf3")
            .matching(Field::Ipv4Dst(host_prefix("10.0.1.2")))
            .treatment(Treatment::builder().group(0x7000_0002).build())
            .build(),
    )
    .group(
        Group::new(0x7000_0002, "leaf3", GroupType::Select)
            .with_bucket(Treatment::builder().set_eth_src(mac(0xa3)).output(3).build())
            .with_bucket(Treatment::builder().set_eth_src(mac(0xa3)).output(4).build()),
    )
    .flow(FlowEntry::builder(2, "spine1").treatment(out(1)).build())
    .flow(FlowEntry::builder(3, "spine2").treatment(out(1)).build())
    .flow(FlowEntry::builder(4, "leaf1").treatment(out(1)).build())
    .flow(FlowEntry::builder(5, "leaf2").treatment(out(1)).build())
    .build()
    .unwrap()
}

/// leaf1 forwards to spine1 on port 3 whatever the ingress; spine1 sends it
/// straight back on another link.
pub fn forwarding_loop() -> NetworkSnapshot {
    fabric_devices(NetworkSnapshot::builder(), &["leaf1", "spine1"])
        .link(cp("leaf1", 3), cp("spine1", 1))
        .link(cp("spine1", 2), cp("leaf1", 4))
        .flow(FlowEntry::builder(1, "leaf1").treatment(out(3)).build())
        .flow(FlowEntry::builder(2, "spine1").treatment(out(2)).build())
        .build()
        .unwrap()
}

/// leaf1 forwards to leaf2, which is offline.
pub fn offline_neighbor() -> NetworkSnapshot {
    NetworkSnapshot::builder()
        .device(Device::new("leaf1"))
        .device(Device::new("leaf2").offline())
        .bidi_link(cp("leaf1", 3), cp("leaf2", 3))
        .flow(FlowEntry::builder(1, "leaf1").treatment(out(3)).build())
        .flow(FlowEntry::builder(2, "leaf2").treatment(out(1)).build())
        .build()
        .unwrap()
}

/// Two hosts on leaf1 bridged on VLAN 10, a third routed host on leaf2.
pub fn bridged_pair() -> NetworkSnapshot {
    fabric_devices(NetworkSnapshot::builder(), &["leaf1", "leaf2"])
        .bidi_link(cp("leaf1", 3), cp("leaf2", 3))
        .host(Host::new(mac(1), vlan(10), cp("leaf1", 1)).with_ip(ip("10.0.1.1")))
        .host(Host::new(mac(2), vlan(10), cp("leaf1", 2)).with_ip(ip("10.0.1.2")))
        .host(Host::new(mac(21), VlanId::NONE, cp("leaf2", 1)).with_ip(ip("10.0.2.1")))
        .router_mac("leaf1", mac(0xa1))
        .router_mac("leaf2", mac(0xa2))
        .flow(
            FlowEntry::builder(1, "leaf1")
                .priority(100)
                .matching(Field::EthDst(mac(1)))
                .treatment(out(1))
                .build(),
        )
        .flow(
            FlowEntry::builder(2, "leaf1")
                .priority(100)
                .matching(Field::EthDst(mac(2)))
                .treatment(out(2))
                .build(),
        )
        .flow(
            FlowEntry::builder(3, "leaf1")
                .priority(50)
                .matching(Field::EthDst(mac(0xa1)))
                .matching(Field::Ipv4Dst("10.0.2.0/24".parse().unwrap()))
                .treatment(Treatment::builder().pop_vlan().output(3).build())
                .build(),
        )
        .flow(
            FlowEntry::builder(4, "leaf2")
                .priority(50)
                .matching(Field::Ipv4Dst(host_prefix("10.0.2.1")))
                .treatment(Treatment::builder().set_eth_dst(mac(21)).output(1).build())
                .build(),
        )
        .flow(
            FlowEntry::builder(5, "leaf2")
                .priority(50)
                .matching(Field::Ipv4Dst(host_prefix("10.0.1.1")))
                .treatment(
                    Treatment::builder()
                        .set_vlan(vlan(10))
                        .set_eth_dst(mac(1))
                        .output(3)
                        .build(),
                )
                .build(),
        )
        .flow(
            FlowEntry::builder(6, "leaf2")
                .priority(50)
                .matching(Field::Ipv4Dst(host_prefix("10.0.1.2")))
                .treatment(
                    Treatment::builder()
                        .set_vlan(vlan(10))
                        .set_eth_dst(mac(2))
                        .output(3)
                        .build(),
                )
                .build(),
        )
        .build()
        .unwrap()
}
