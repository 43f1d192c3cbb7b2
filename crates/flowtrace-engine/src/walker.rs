//! Output resolution.
//!
//! Decides what happens to a packet leaving a device on a concrete port:
//! punt to the controller, hairpin, host or edge delivery, or forwarding
//! over every departing link. Forwarding yields the next device visits.

use std::collections::BTreeSet;

use tracing::debug;

use flowtrace_core::{ConnectPoint, Field, FlowId, HeaderState, TableId, VlanId};
use flowtrace_store::NetworkView;

use crate::engine::{Branch, TraceRun};
use crate::interpreter::{Egress, GroupChain};
use crate::outcome::{BranchOutcome, FailureReason};
use crate::report::DeviceOutput;

impl<V: NetworkView + ?Sized> TraceRun<'_, V> {
    /// Resolves one egress of `branch`'s device. `tables` are the tables the
    /// producing pipeline entered.
    pub(crate) fn resolve_output(
        &mut self,
        branch: &Branch,
        egress: Egress,
        flows: &[FlowId],
        tables: &BTreeSet<TableId>,
    ) -> Vec<Branch> {
        let device = branch.device().clone();
        let out = ConnectPoint::at(device.clone(), egress.port);
        debug!(output = %out, packet = %egress.header, "resolving output");

        if egress.port.is_controller() {
            let mut final_packet = egress.header;
            let untagged = self.report.initial_packet().vlan_id() == Some(VlanId::NONE);
            if untagged {
                final_packet.insert(Field::VlanId(VlanId::NONE));
            }
            self.output(branch, &out, egress.groups, final_packet, flows);
            self.report.add_complete_path(path_to(branch, &out));
            let master = self.view.master_for(&device);
            self.end(branch, BranchOutcome::PuntedToController { device, master });
            return Vec::new();
        }

        if egress.port == branch.ingress.port {
            let reason = FailureReason::OutputEqualsInput {
                output: out,
                input: branch.ingress.clone(),
            };
            self.end(branch, reason.into());
            return Vec::new();
        }

        let hosts = self.view.hosts_at(&out);
        if !hosts.is_empty() {
            self.output(branch, &out, egress.groups, egress.header, flows);
            self.report.add_complete_path(path_to(branch, &out));
            let hosts = hosts.into_iter().map(|h| h.id).collect();
            self.end(branch, BranchOutcome::DeliveredToHost { location: out, hosts });
            return Vec::new();
        }

        if self.view.is_edge_point(&out) {
            self.output(branch, &out, egress.groups, egress.header, flows);
            self.report.add_complete_path(path_to(branch, &out));
            self.end(branch, BranchOutcome::DeliveredToEdgePort { location: out });
            return Vec::new();
        }

        let links = self.view.egress_links(&out);
        if links.is_empty() {
            self.end(branch, FailureReason::DeadEnd { output: out }.into());
            return Vec::new();
        }

        self.output(branch, &out, egress.groups, egress.header.clone(), flows);

        let mut visited = branch.visited.clone();
        visited.extend(tables.iter().map(|table| (device.clone(), *table)));

        let mut forks = Vec::new();
        for link in links {
            let dst = link.dst;
            let revisit = visited.contains(&(dst.device.clone(), TableId::default()));
            if revisit || branch.hops + 1 > self.config.max_hops {
                let reason = FailureReason::LoopDetected {
                    device: dst.device.clone(),
                };
                self.end(branch, reason.into());
                continue;
            }
            let Some(id) = self.open_child(branch, dst.clone()) else {
                continue;
            };
            debug!(from = %out, to = %dst, branch = %id, "following link");

            let mut path = branch.path.clone();
            path.push(out.clone());
            path.push(dst.clone());
            forks.push(Branch {
                id,
                header: egress.header.set(Field::InPort(dst.port)),
                ingress: dst,
                path,
                visited: visited.clone(),
                hops: branch.hops + 1,
            });
        }
        forks
    }

    /// Discovery packets injected from the controller bypass the pipeline and
    /// leave on every enabled port.
    pub(crate) fn flood(&mut self, branch: &Branch) -> Vec<Branch> {
        let device = branch.device().clone();
        let ports: Vec<_> = self
            .view
            .ports(&device)
            .into_iter()
            .filter(|p| p.enabled)
            .collect();
        debug!(%device, ports = ports.len(), "flooding discovery packet");

        if ports.is_empty() {
            self.end(branch, FailureReason::NoTerminalAction { device }.into());
            return Vec::new();
        }

        let tables = BTreeSet::from([TableId::default()]);
        let mut forks = Vec::new();
        for port in ports {
            let egress = Egress {
                port: port.number,
                header: branch.header.clone(),
                groups: GroupChain::new(),
            };
            forks.extend(self.resolve_output(branch, egress, &[], &tables));
        }
        forks
    }

    fn output(
        &mut self,
        branch: &Branch,
        out: &ConnectPoint,
        groups: GroupChain,
        final_packet: HeaderState,
        flows: &[FlowId],
    ) {
        let output = DeviceOutput {
            output: out.clone(),
            groups,
            final_packet,
            flows: flows.to_vec(),
            branch: branch.id,
        };
        self.report.record_output(branch.device(), output);
    }
}

fn path_to(branch: &Branch, out: &ConnectPoint) -> Vec<ConnectPoint> {
    let mut path = branch.path.clone();
    path.push(out.clone());
    path
}
