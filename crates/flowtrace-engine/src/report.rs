//! The result of one trace.
//!
//! A [`TraceReport`] keeps everything typed: per-device outputs and matched
//! flows in first-visit order, the complete paths of successful branches,
//! and one [`OutcomeRecord`] per branch ending. Branches form an arena of
//! [`BranchRecord`]s linked to their parent, one record per device visit.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use flowtrace_core::{ConnectPoint, DeviceId, Field, FieldType, FlowId, HeaderState, HostId};

use crate::interpreter::GroupChain;
use crate::outcome::BranchOutcome;

/// Index of a branch in [`TraceReport::branches`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BranchId(pub usize);

impl std::fmt::Display for BranchId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One device visit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchRecord {
    pub id: BranchId,
    /// The visit that forwarded into this one.
    pub parent: Option<BranchId>,
    pub ingress: ConnectPoint,
}

/// A branch ending.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeRecord {
    pub branch: BranchId,
    pub outcome: BranchOutcome,
}

/// A packet leaving a device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceOutput {
    pub output: ConnectPoint,
    /// Groups traversed to reach the output, outermost first.
    pub groups: GroupChain,
    pub final_packet: HeaderState,
    /// Entries matched by the pipeline that produced this output.
    pub flows: Vec<FlowId>,
    pub branch: BranchId,
}

impl DeviceOutput {
    pub fn final_field(&self, field_type: FieldType) -> Option<&Field> {
        self.final_packet.get(field_type)
    }
}

/// Everything a trace found.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceReport {
    initial_packet: HeaderState,
    ingress: Option<ConnectPoint>,
    outputs: IndexMap<DeviceId, Vec<DeviceOutput>>,
    flows: IndexMap<DeviceId, Vec<FlowId>>,
    complete_paths: Vec<Vec<ConnectPoint>>,
    branches: Vec<BranchRecord>,
    outcomes: Vec<OutcomeRecord>,
    notes: Vec<String>,
    endpoint_hosts: Option<(HostId, HostId)>,
}

impl TraceReport {
    pub(crate) fn new(initial_packet: HeaderState, ingress: ConnectPoint) -> Self {
        TraceReport {
            initial_packet,
            ingress: Some(ingress),
            outputs: IndexMap::new(),
            flows: IndexMap::new(),
            complete_paths: Vec::new(),
            branches: Vec::new(),
            outcomes: Vec::new(),
            notes: Vec::new(),
            endpoint_hosts: None,
        }
    }

    /// A report for a trace that could not start.
    pub(crate) fn failure(note: impl Into<String>) -> Self {
        TraceReport {
            initial_packet: HeaderState::new(),
            ingress: None,
            outputs: IndexMap::new(),
            flows: IndexMap::new(),
            complete_paths: Vec::new(),
            branches: Vec::new(),
            outcomes: Vec::new(),
            notes: vec![note.into()],
            endpoint_hosts: None,
        }
    }

    pub(crate) fn with_endpoint_hosts(mut self, src: HostId, dst: HostId) -> Self {
        self.endpoint_hosts = Some((src, dst));
        self
    }

    pub(crate) fn open_branch(&mut self, parent: Option<BranchId>, ingress: ConnectPoint) -> BranchId {
        let id = BranchId(self.branches.len());
        self.branches.push(BranchRecord {
            id,
            parent,
            ingress,
        });
        id
    }

    /// Records an output unless an identical one was already recorded.
    pub(crate) fn record_output(&mut self, device: &DeviceId, output: DeviceOutput) {
        let outputs = self.outputs.entry(device.clone()).or_default();
        let seen = outputs.iter().any(|o| {
            o.output == output.output
                && o.groups == output.groups
                && o.final_packet == output.final_packet
        });
        if !seen {
            outputs.push(output);
        }
    }

    pub(crate) fn record_flows(&mut self, device: &DeviceId, flows: &[FlowId]) {
        let known = self.flows.entry(device.clone()).or_default();
        for flow in flows {
            if !known.contains(flow) {
                known.push(*flow);
            }
        }
    }

    pub(crate) fn record_outcome(&mut self, branch: BranchId, outcome: BranchOutcome) {
        self.outcomes.push(OutcomeRecord { branch, outcome });
    }

    pub(crate) fn add_complete_path(&mut self, path: Vec<ConnectPoint>) {
        if !self.complete_paths.contains(&path) {
            self.complete_paths.push(path);
        }
    }

    pub(crate) fn branch_count(&self) -> usize {
        self.branches.len()
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// The selector with the ingress port applied.
    pub fn initial_packet(&self) -> &HeaderState {
        &self.initial_packet
    }

    /// `None` for reports of traces that could not start.
    pub fn ingress(&self) -> Option<&ConnectPoint> {
        self.ingress.as_ref()
    }

    /// Source and destination of a host-to-host trace.
    pub fn endpoint_hosts(&self) -> Option<&(HostId, HostId)> {
        self.endpoint_hosts.as_ref()
    }

    /// Outputs recorded for `device`, in recording order. Outputs forked from
    /// one group are adjacent.
    pub fn outputs_for(&self, device: &DeviceId) -> &[DeviceOutput] {
        self.outputs.get(device).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Devices with at least one output, in first-output order.
    pub fn output_devices(&self) -> impl Iterator<Item = &DeviceId> {
        self.outputs.keys()
    }

    /// Matched flow ids of `device`, first hit first, without duplicates.
    pub fn flows_for(&self, device: &DeviceId) -> &[FlowId] {
        self.flows.get(device).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Connect point sequences of successful branches, without duplicates.
    pub fn complete_paths(&self) -> &[Vec<ConnectPoint>] {
        &self.complete_paths
    }

    pub fn outcomes(&self) -> &[OutcomeRecord] {
        &self.outcomes
    }

    pub fn branches(&self) -> &[BranchRecord] {
        &self.branches
    }

    pub fn branch(&self, id: BranchId) -> Option<&BranchRecord> {
        self.branches.get(id.0)
    }

    /// `id` and its ancestors, root last.
    pub fn lineage(&self, id: BranchId) -> Vec<BranchId> {
        let mut chain = Vec::new();
        let mut next = Some(id);
        while let Some(current) = next {
            let Some(record) = self.branch(current) else {
                break;
            };
            chain.push(current);
            next = record.parent;
        }
        chain
    }

    /// Messages that are not tied to a branch outcome.
    pub fn notes(&self) -> &[String] {
        &self.notes
    }

    /// At least one branch succeeded and none failed or was dropped.
    pub fn is_success(&self) -> bool {
        self.is_partial_success() && self.outcomes.iter().all(|r| r.outcome.is_success())
    }

    /// At least one branch succeeded.
    pub fn is_partial_success(&self) -> bool {
        self.outcomes.iter().any(|r| r.outcome.is_success())
    }

    /// Newline-joined description of every note and non-silent outcome,
    /// identical lines reported once.
    pub fn result_message(&self) -> String {
        let mut lines: Vec<String> = Vec::new();
        let rendered = self
            .outcomes
            .iter()
            .filter(|r| !r.outcome.is_silent())
            .map(|r| r.outcome.to_string());
        for line in self.notes.iter().cloned().chain(rendered) {
            if !lines.contains(&line) {
                lines.push(line);
            }
        }
        lines.join("\n")
    }
}
