//! Host-to-host traces.
//!
//! [`HostTracer`] builds the candidate packet from two host records and
//! traces it from every location of the source host. Hosts on the same leaf
//! with compatible VLANs are bridged with an L2 packet; everything else is
//! routed, which needs an IP address on both ends and the router MAC of the
//! source leaf.

use tracing::{debug, info};

use flowtrace_core::{EthType, Field, HeaderState, Host, HostId, IpPrefix, VlanId};
use flowtrace_store::NetworkView;

use crate::engine::{Tracer, TracerConfig};
use crate::error::TraceError;
use crate::report::TraceReport;

/// Traces between known hosts.
pub struct HostTracer<'v, V: NetworkView + ?Sized> {
    tracer: Tracer<'v, V>,
}

impl<'v, V: NetworkView + ?Sized> HostTracer<'v, V> {
    pub fn new(view: &'v V) -> Self {
        HostTracer {
            tracer: Tracer::new(view),
        }
    }

    pub fn with_config(view: &'v V, config: TracerConfig) -> Self {
        HostTracer {
            tracer: Tracer::with_config(view, config),
        }
    }

    pub fn tracer(&self) -> &Tracer<'v, V> {
        &self.tracer
    }

    /// One report per source location. A request that cannot be built yields
    /// a single report whose message is the reason.
    pub fn trace_hosts(&self, src: &HostId, dst: &HostId, eth_type: EthType) -> Vec<TraceReport> {
        match self.try_trace_hosts(src, dst, eth_type) {
            Ok(reports) => reports,
            Err(err) => {
                debug!(%src, %dst, error = %err, "host trace not possible");
                vec![TraceReport::failure(err.to_string()).with_endpoint_hosts(src.clone(), dst.clone())]
            }
        }
    }

    pub fn try_trace_hosts(
        &self,
        src: &HostId,
        dst: &HostId,
        eth_type: EthType,
    ) -> Result<Vec<TraceReport>, TraceError> {
        let view = self.tracer.view();
        let source = view
            .host(src)
            .ok_or_else(|| TraceError::SourceHostNotFound { host: src.clone() })?;
        let target = view
            .host(dst)
            .ok_or_else(|| TraceError::DestinationHostNotFound { host: dst.clone() })?;
        info!(src = %source.id, dst = %target.id, %eth_type, "tracing between hosts");

        let base = HeaderState::new()
            .with(Field::EthType(eth_type))
            .with(Field::VlanId(source.vlan));

        let mut reports = Vec::new();
        if same_leaf(&source, &target) && vlans_compatible(source.vlan, target.vlan) {
            debug!(src = %source.id, dst = %target.id, "hosts are bridged");
            let selector = base.set(Field::EthDst(target.mac));
            reports.extend(self.trace_from(&source, &target, &selector));
            if !target.is_dual_homed() {
                return Ok(reports);
            }
        }

        let ipv4 = match eth_type {
            EthType::IPV4 => true,
            EthType::IPV6 => false,
            other => return Err(TraceError::UnsupportedEthType { eth_type: other }),
        };
        let (src_ip, dst_ip) = (
            first_address(&source, ipv4, eth_type)?,
            first_address(&target, ipv4, eth_type)?,
        );
        let Some(leaf) = source.locations.first() else {
            return Ok(reports);
        };
        let router_mac = view
            .router_mac(&leaf.device)
            .ok_or_else(|| TraceError::NoRouterMac {
                device: leaf.device.clone(),
            })?;

        let selector = if ipv4 {
            base.with(Field::Ipv4Src(src_ip)).with(Field::Ipv4Dst(dst_ip))
        } else {
            base.with(Field::Ipv6Src(src_ip)).with(Field::Ipv6Dst(dst_ip))
        }
        .with(Field::EthDst(router_mac));
        reports.extend(self.trace_from(&source, &target, &selector));
        Ok(reports)
    }

    /// Traces every ordered pair of distinct hosts that both carry an address
    /// of the `eth_type` family. Hosts with only link-local addresses are
    /// paired only with each other and only on a shared leaf.
    pub fn ping_all(&self, eth_type: EthType) -> Vec<TraceReport> {
        let ipv4 = eth_type == EthType::IPV4;
        let hosts = self.tracer.view().hosts();
        let mut reports = Vec::new();
        for source in &hosts {
            for target in &hosts {
                if source.id == target.id || !pingable(source, target, ipv4) {
                    continue;
                }
                reports.extend(self.trace_hosts(&source.id, &target.id, eth_type));
            }
        }
        reports
    }

    fn trace_from(&self, source: &Host, target: &Host, selector: &HeaderState) -> Vec<TraceReport> {
        source
            .locations
            .iter()
            .map(|location| {
                self.tracer
                    .trace(selector, location)
                    .with_endpoint_hosts(source.id.clone(), target.id.clone())
            })
            .collect()
    }
}

fn same_leaf(a: &Host, b: &Host) -> bool {
    a.locations
        .iter()
        .any(|x| b.locations.iter().any(|y| x.device == y.device))
}

fn vlans_compatible(a: VlanId, b: VlanId) -> bool {
    a.is_none() || b.is_none() || a == b
}

fn first_address(host: &Host, ipv4: bool, eth_type: EthType) -> Result<IpPrefix, TraceError> {
    host.addresses(ipv4, true)
        .next()
        .map(|ip| IpPrefix::host(*ip))
        .ok_or_else(|| TraceError::NoAddress {
            host: host.id.clone(),
            eth_type,
        })
}

fn pingable(source: &Host, target: &Host, ipv4: bool) -> bool {
    let has_any = |h: &Host| h.addresses(ipv4, false).next().is_some();
    if !has_any(source) || !has_any(target) {
        return false;
    }
    let link_local_only = |h: &Host| h.addresses(ipv4, true).next().is_none();
    match (link_local_only(source), link_local_only(target)) {
        (true, true) => same_leaf(source, target),
        (false, false) => true,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::IpAddr;

    use flowtrace_core::{ConnectPoint, Device, MacAddr};
    use flowtrace_store::NetworkSnapshot;

    fn mac(last: u8) -> MacAddr {
        MacAddr([0, 0, 0, 0, 0, last])
    }

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    fn host(last: u8, device: &str, port: u64) -> Host {
        Host::new(mac(last), VlanId::NONE, ConnectPoint::new(device, port))
    }

    #[test]
    fn vlan_compatibility() {
        let ten = VlanId::new(10).unwrap();
        let twenty = VlanId::new(20).unwrap();
        assert!(vlans_compatible(VlanId::NONE, ten));
        assert!(vlans_compatible(ten, ten));
        assert!(!vlans_compatible(ten, twenty));
    }

    #[test]
    fn link_local_pairing() {
        let a = host(1, "leaf1", 1).with_ip(ip("169.254.0.1"));
        let b = host(2, "leaf1", 2).with_ip(ip("169.254.0.2"));
        let c = host(3, "leaf2", 1).with_ip(ip("169.254.0.3"));
        let d = host(4, "leaf2", 2).with_ip(ip("10.0.2.4"));
        let e = host(5, "leaf1", 3).with_ip(ip("10.0.1.5"));
        assert!(pingable(&a, &b, true));
        assert!(!pingable(&a, &c, true));
        assert!(!pingable(&a, &e, true));
        assert!(pingable(&d, &e, true));
        assert!(!pingable(&d, &e, false));
    }

    #[test]
    fn missing_hosts_become_failure_reports() {
        let snapshot = NetworkSnapshot::builder()
            .device(Device::new("leaf1"))
            .host(host(1, "leaf1", 1))
            .build()
            .unwrap();
        let tracer = HostTracer::new(&snapshot);
        let known = host(1, "leaf1", 1).id;
        let unknown = HostId::new("00:00:00:00:00:09/None");

        let reports = tracer.trace_hosts(&known, &unknown, EthType::IPV4);
        assert_eq!(reports.len(), 1);
        assert_eq!(
            reports[0].result_message(),
            "Destination Host 00:00:00:00:00:09/None does not exist"
        );
        assert_eq!(
            reports[0].endpoint_hosts(),
            Some(&(known.clone(), unknown.clone()))
        );

        assert_eq!(
            tracer.try_trace_hosts(&unknown, &known, EthType::IPV4),
            Err(TraceError::SourceHostNotFound { host: unknown })
        );
    }

    #[test]
    fn routed_trace_needs_address_and_router_mac() {
        let a = host(1, "leaf1", 1).with_ip(ip("10.0.1.1"));
        let b = host(2, "leaf2", 1);
        let c = host(3, "leaf2", 2).with_ip(ip("10.0.2.3"));
        let snapshot = NetworkSnapshot::builder()
            .device(Device::new("leaf1"))
            .device(Device::new("leaf2"))
            .host(a.clone())
            .host(b.clone())
            .host(c.clone())
            .build()
            .unwrap();
        let tracer = HostTracer::new(&snapshot);

        assert_eq!(
            tracer.try_trace_hosts(&a.id, &b.id, EthType::IPV4),
            Err(TraceError::NoAddress {
                host: b.id.clone(),
                eth_type: EthType::IPV4
            })
        );
        assert_eq!(
            tracer.try_trace_hosts(&a.id, &c.id, EthType::IPV4),
            Err(TraceError::NoRouterMac {
                device: "leaf1".into()
            })
        );
        assert_eq!(
            tracer.try_trace_hosts(&a.id, &c.id, EthType::ARP),
            Err(TraceError::UnsupportedEthType {
                eth_type: EthType::ARP
            })
        );
    }
}
