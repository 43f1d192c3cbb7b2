//! Trace entry point.
//!
//! [`Tracer`] injects a packet at an ingress connect point and explores every
//! reachable branch depth-first. Each device visit runs the device pipeline
//! (see [`interpreter`](crate::interpreter)), expands groups, and resolves
//! every resulting output (see [`walker`](crate::walker)). Outputs that
//! follow links fork new visits which go to the front of the worklist, so
//! sibling branches are explored in fork order.

use std::collections::{BTreeSet, VecDeque};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use flowtrace_core::{ConnectPoint, DeviceId, Field, HeaderState, TableId};
use flowtrace_store::NetworkView;

use crate::error::TraceError;
use crate::interpreter::{expand_terminal, run_pipeline, PipelineContext, PipelineEnd};
use crate::lookup::DeviceFlows;
use crate::outcome::{BranchOutcome, FailureReason};
use crate::report::{BranchId, TraceReport};

/// Tracer settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TracerConfig {
    /// Make [`Tracer::try_trace`] reject an unknown ingress device instead
    /// of reporting it as a failed branch.
    pub strict_ingress: bool,
    /// Device hops after which a branch counts as looping.
    pub max_hops: usize,
    /// Device visits per trace; further forks are not explored.
    pub max_branches: usize,
}

impl Default for TracerConfig {
    fn default() -> Self {
        TracerConfig {
            strict_ingress: false,
            max_hops: 64,
            max_branches: 4096,
        }
    }
}

/// Packet tracer over a read-only network view.
pub struct Tracer<'v, V: NetworkView + ?Sized> {
    view: &'v V,
    config: TracerConfig,
}

impl<'v, V: NetworkView + ?Sized> Tracer<'v, V> {
    pub fn new(view: &'v V) -> Self {
        Self::with_config(view, TracerConfig::default())
    }

    pub fn with_config(view: &'v V, config: TracerConfig) -> Self {
        Tracer { view, config }
    }

    pub fn config(&self) -> &TracerConfig {
        &self.config
    }

    pub fn view(&self) -> &'v V {
        self.view
    }

    /// Traces `selector` injected at `ingress`. Never fails: every problem is
    /// recorded as a branch outcome in the report.
    pub fn trace(&self, selector: &HeaderState, ingress: &ConnectPoint) -> TraceReport {
        let initial = selector.set(Field::InPort(ingress.port));
        info!(packet = %initial, %ingress, "tracing packet");

        let mut run = TraceRun::new(self.view, &self.config, initial, ingress.clone());
        run.execute();
        let report = run.finish();

        debug!(
            branches = report.branches().len(),
            outcomes = report.outcomes().len(),
            success = report.is_success(),
            "trace finished"
        );
        report
    }

    /// Like [`trace`](Self::trace), but with
    /// [`strict_ingress`](TracerConfig::strict_ingress) an unknown ingress
    /// device is an error.
    pub fn try_trace(
        &self,
        selector: &HeaderState,
        ingress: &ConnectPoint,
    ) -> Result<TraceReport, TraceError> {
        if self.config.strict_ingress && self.view.device(&ingress.device).is_none() {
            return Err(TraceError::DeviceUnknown {
                device: ingress.device.clone(),
            });
        }
        Ok(self.trace(selector, ingress))
    }
}

/// A pending device visit.
#[derive(Debug, Clone)]
pub(crate) struct Branch {
    pub id: BranchId,
    pub ingress: ConnectPoint,
    pub header: HeaderState,
    /// Connect points crossed so far, starting with the trace ingress.
    pub path: Vec<ConnectPoint>,
    /// `(device, table)` pairs entered by this branch and its ancestors.
    pub visited: BTreeSet<(DeviceId, TableId)>,
    pub hops: usize,
}

impl Branch {
    pub fn device(&self) -> &DeviceId {
        &self.ingress.device
    }
}

/// State of one trace in progress.
pub(crate) struct TraceRun<'a, V: NetworkView + ?Sized> {
    pub view: &'a V,
    pub config: &'a TracerConfig,
    pub report: TraceReport,
    work: VecDeque<Branch>,
    limit_reached: bool,
}

impl<'a, V: NetworkView + ?Sized> TraceRun<'a, V> {
    fn new(view: &'a V, config: &'a TracerConfig, initial: HeaderState, ingress: ConnectPoint) -> Self {
        let mut report = TraceReport::new(initial.clone(), ingress.clone());
        let root = report.open_branch(None, ingress.clone());
        let mut work = VecDeque::new();
        work.push_back(Branch {
            id: root,
            path: vec![ingress.clone()],
            ingress,
            header: initial,
            visited: BTreeSet::new(),
            hops: 0,
        });
        TraceRun {
            view,
            config,
            report,
            work,
            limit_reached: false,
        }
    }

    fn execute(&mut self) {
        while let Some(branch) = self.work.pop_front() {
            let forks = self.visit(&branch);
            for fork in forks.into_iter().rev() {
                self.work.push_front(fork);
            }
        }
    }

    fn finish(self) -> TraceReport {
        self.report
    }

    /// Runs one device visit and returns the visits it forwards into.
    fn visit(&mut self, branch: &Branch) -> Vec<Branch> {
        let device = branch.device().clone();
        debug!(%device, port = %branch.ingress.port, hops = branch.hops, "visiting device");

        if self.view.device(&device).is_none() {
            self.end(branch, FailureReason::DeviceUnknown { device }.into());
            return Vec::new();
        }
        if !self.view.is_available(&device) {
            self.end(branch, FailureReason::DeviceOffline { device }.into());
            return Vec::new();
        }

        let initial_eth_type = self.report.initial_packet().eth_type();
        if branch.ingress.port.is_controller() && initial_eth_type.is_some_and(|t| t.is_discovery()) {
            return self.flood(branch);
        }

        let flows = DeviceFlows::load(self.view, &device);
        if flows.is_empty() {
            self.end(branch, FailureReason::NoFlowEntries { device }.into());
            return Vec::new();
        }

        let ctx = PipelineContext {
            flows: &flows,
            in_port: branch.ingress.port,
            initial_eth_type,
        };
        let run = run_pipeline(&ctx, branch.header.clone());
        self.report.record_flows(&device, &run.matched);

        let mut forks = Vec::new();
        for end in run.ends {
            match end {
                PipelineEnd::Forward {
                    terminals,
                    flows: used,
                    tables,
                } => {
                    for terminal in terminals {
                        for egress in expand_terminal(&flows, terminal) {
                            match egress {
                                Ok(egress) => {
                                    forks.extend(self.resolve_output(branch, egress, &used, &tables));
                                }
                                Err(outcome) => self.end(branch, outcome),
                            }
                        }
                    }
                }
                PipelineEnd::Dropped { table } => {
                    let outcome = BranchOutcome::Dropped {
                        device: device.clone(),
                        table,
                    };
                    self.end(branch, outcome);
                }
                PipelineEnd::Failed(reason) => self.end(branch, reason.into()),
            }
        }
        forks
    }

    /// Records how `branch` ended.
    pub(crate) fn end(&mut self, branch: &Branch, outcome: BranchOutcome) {
        debug!(branch = %branch.id, %outcome, "branch ended");
        self.report.record_outcome(branch.id, outcome);
    }

    /// Opens a child visit of `parent`, or `None` once the branch limit is
    /// reached.
    pub(crate) fn open_child(&mut self, parent: &Branch, ingress: ConnectPoint) -> Option<BranchId> {
        let limit = self.config.max_branches;
        if self.report.branch_count() >= limit {
            if !self.limit_reached {
                warn!(limit, "branch limit reached, remaining paths are not explored");
                self.limit_reached = true;
                self.end(parent, FailureReason::BranchLimit { limit }.into());
            }
            return None;
        }
        Some(self.report.open_branch(Some(parent.id), ingress))
    }
}
