//! Match-action interpreter for one device visit.
//!
//! A [`Cursor`] walks the device's tables: it looks up the matching entry,
//! applies its treatment, and either transitions to another table or ends
//! the pipeline. Hardware multi-entry tables fork one cursor per matching
//! entry. At the end of the pipeline the deferred queue is flushed and every
//! OUTPUT or GROUP collected along the way becomes a [`Terminal`].
//!
//! Terminals are then expanded by [`expand_terminal`]: groups fan out into
//! their buckets (recursively for chained groups) until each alternative
//! ends in a concrete output port.

use std::collections::BTreeSet;

use smallvec::SmallVec;
use tracing::{debug, warn};

use flowtrace_core::{
    ConnectPoint, EthType, Field, FieldType, FlowEntry, FlowId, GroupId, HeaderState, Instruction,
    MatchStrategy, MissAction, PortNumber, TableId, VlanId,
};

use crate::lookup::DeviceFlows;
use crate::outcome::{BranchOutcome, FailureReason};

/// Group ids traversed on the way to one output, outermost first.
pub type GroupChain = SmallVec<[GroupId; 4]>;

/// Fixed inputs of one device visit.
pub(crate) struct PipelineContext<'f> {
    pub flows: &'f DeviceFlows,
    /// Ingress port of this visit, compared against in-port selectors.
    pub in_port: PortNumber,
    /// Ether type of the packet as first injected, used by fixed MPLS tables.
    pub initial_eth_type: Option<EthType>,
}

/// An OUTPUT or GROUP reached by the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TerminalAction {
    Output(PortNumber),
    Group(GroupId),
}

impl TerminalAction {
    fn from_instruction(instruction: &Instruction) -> Option<Self> {
        match instruction {
            Instruction::Output { port } => Some(TerminalAction::Output(*port)),
            Instruction::Group { id } => Some(TerminalAction::Group(*id)),
            _ => None,
        }
    }
}

/// A terminal action with the header it acts on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Terminal {
    pub action: TerminalAction,
    pub header: HeaderState,
}

/// A concrete output port reached after group expansion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Egress {
    pub port: PortNumber,
    pub header: HeaderState,
    pub groups: GroupChain,
}

/// Pipeline-local state.
#[derive(Debug, Clone)]
pub(crate) struct Cursor {
    pub header: HeaderState,
    pub table: TableId,
    pub deferred: Vec<Instruction>,
    pub terminals: Vec<Terminal>,
    /// Entries matched by this cursor, in pipeline order.
    pub flows: Vec<FlowId>,
    /// Tables entered by this cursor.
    pub tables: BTreeSet<TableId>,
}

impl Cursor {
    fn new(header: HeaderState) -> Self {
        let table = TableId::default();
        Cursor {
            header,
            table,
            deferred: Vec::new(),
            terminals: Vec::new(),
            flows: Vec::new(),
            tables: BTreeSet::from([table]),
        }
    }

    /// Moves to `next`. Returns `false` if this cursor already entered it.
    fn enter(&mut self, next: TableId) -> bool {
        self.table = next;
        self.tables.insert(next)
    }
}

/// How one cursor's pipeline ended.
#[derive(Debug, Clone)]
pub(crate) enum PipelineEnd {
    /// At least one terminal action to resolve.
    Forward {
        terminals: Vec<Terminal>,
        flows: Vec<FlowId>,
        tables: BTreeSet<TableId>,
    },
    Dropped {
        table: TableId,
    },
    Failed(FailureReason),
}

/// Result of running the pipeline of one device visit.
#[derive(Debug, Clone, Default)]
pub(crate) struct PipelineRun {
    /// One end per cursor, in fork order.
    pub ends: Vec<PipelineEnd>,
    /// Every entry matched by any cursor, first hit first.
    pub matched: Vec<FlowId>,
}

enum Step {
    Transition(TableId),
    End,
    Drop,
}

type Pending<'f> = (Cursor, Option<&'f FlowEntry>);

/// Runs the device pipeline for `header`, starting at table 0.
pub(crate) fn run_pipeline(ctx: &PipelineContext<'_>, header: HeaderState) -> PipelineRun {
    let mut run = PipelineRun::default();
    let mut stack: Vec<Pending<'_>> = vec![(Cursor::new(header), None)];
    while let Some((cursor, pending)) = stack.pop() {
        let end = drive(ctx, cursor, pending, &mut stack, &mut run.matched);
        run.ends.push(end);
    }
    run
}

/// Drives one cursor to the end of its pipeline. Sibling cursors forked on
/// multi-entry tables are pushed onto `forks`.
fn drive<'f>(
    ctx: &PipelineContext<'f>,
    mut cursor: Cursor,
    mut pending: Option<&'f FlowEntry>,
    forks: &mut Vec<Pending<'f>>,
    matched: &mut Vec<FlowId>,
) -> PipelineEnd {
    let device = ctx.flows.device();
    loop {
        let entry = match pending.take() {
            Some(entry) => entry,
            None => {
                debug!(%device, table = %cursor.table, packet = %cursor.header, "table lookup");
                let hits = ctx.flows.lookup(cursor.table, &cursor.header, ctx.in_port);
                let Some((first, rest)) = hits.split_first() else {
                    match on_miss(ctx, &mut cursor) {
                        Ok(true) => continue,
                        Ok(false) => return finish(ctx, cursor),
                        Err(reason) => return PipelineEnd::Failed(reason),
                    }
                };
                for sibling in rest.iter().rev() {
                    forks.push((cursor.clone(), Some(*sibling)));
                }
                *first
            }
        };

        debug!(%device, table = %entry.table, flow = %entry.id, "matched flow entry");
        if !matched.contains(&entry.id) {
            matched.push(entry.id);
        }
        cursor.flows.push(entry.id);

        match apply_entry(&mut cursor, entry) {
            Step::Transition(next) => {
                if !cursor.enter(next) {
                    return PipelineEnd::Failed(FailureReason::LoopDetected {
                        device: device.clone(),
                    });
                }
            }
            Step::End => match tagged_follow_up(ctx, &cursor, entry) {
                Some(Ok(second)) => pending = Some(second),
                Some(Err(reason)) => return PipelineEnd::Failed(reason),
                None => return finish(ctx, cursor),
            },
            Step::Drop => {
                return PipelineEnd::Dropped { table: entry.table };
            }
        }
    }
}

/// Table miss. `Ok(true)` continues at the cursor's new table, `Ok(false)`
/// ends the pipeline.
fn on_miss(ctx: &PipelineContext<'_>, cursor: &mut Cursor) -> Result<bool, FailureReason> {
    let device = ctx.flows.device();
    let driver = ctx.flows.driver();
    let table = cursor.table;
    let no_match = || FailureReason::NoMatchingFlow {
        device: device.clone(),
        table,
    };

    let action = driver.miss_action(table);
    if action == MissAction::Fail {
        return Err(no_match());
    }

    if driver.is_fixed_mpls_table(table) {
        pop_mpls_to_initial(ctx, &mut cursor.header);
    }

    let Some(next) = ctx.flows.next_populated_after(table) else {
        if cursor.flows.is_empty() {
            return Err(no_match());
        }
        return Ok(false);
    };
    let target = match action {
        MissAction::Jump(jump) => jump,
        _ => next,
    };
    debug!(%device, from = %table, to = %target, "table miss");
    if !cursor.enter(target) {
        return Err(FailureReason::LoopDetected {
            device: device.clone(),
        });
    }
    Ok(true)
}

/// Hardware VLAN tables admit an untagged packet with two entries: the first
/// matches `VLAN_ID = NONE` and tags the packet without a table transition,
/// the second matches the tagged packet and carries the transition.
///
/// Returns `None` when `entry` is not such a first entry, otherwise the
/// second entry for the rewritten header.
fn tagged_follow_up<'f>(
    ctx: &PipelineContext<'f>,
    cursor: &Cursor,
    entry: &FlowEntry,
) -> Option<Result<&'f FlowEntry, FailureReason>> {
    let flows = ctx.flows;
    if flows.driver().match_strategy(entry.table) != MatchStrategy::All {
        return None;
    }
    if entry.selector.vlan_id() != Some(VlanId::NONE) {
        return None;
    }
    let tag = entry
        .treatment
        .iter()
        .take_while(|i| !matches!(i, Instruction::BeginDeferred))
        .filter_map(|i| match i {
            Instruction::SetField {
                field: Field::VlanId(vlan),
            } if !vlan.is_none() => Some(*vlan),
            _ => None,
        })
        .last()?;
    if cursor.header.vlan_id() != Some(tag) {
        return None;
    }

    let second = flows
        .all_matches(entry.table, &cursor.header, ctx.in_port)
        .into_iter()
        .find(|e| e.id != entry.id && e.selector.vlan_id() == Some(tag));
    match second {
        Some(second) => {
            debug!(
                device = %flows.device(),
                flow = %second.id,
                vlan = %tag,
                "tagged follow-up entry"
            );
            Some(Ok(second))
        }
        None => Some(Err(FailureReason::MissingTaggedRule {
            input: ConnectPoint::at(flows.device().clone(), ctx.in_port),
        })),
    }
}

/// Fixed MPLS termination: an MPLS packet gets its original ether type back.
fn pop_mpls_to_initial(ctx: &PipelineContext<'_>, header: &mut HeaderState) {
    let is_mpls = header.eth_type().is_some_and(|t| t.is_mpls());
    if let (true, Some(eth_type)) = (is_mpls, ctx.initial_eth_type) {
        apply_header_action(header, &Instruction::PopMpls { eth_type });
    }
}

fn apply_entry(cursor: &mut Cursor, entry: &FlowEntry) -> Step {
    let mut deferring = false;
    let mut next = None;
    for instruction in &entry.treatment {
        match instruction {
            Instruction::BeginDeferred => deferring = true,
            Instruction::ClearDeferred => cursor.deferred.clear(),
            Instruction::Transition { table } => next = Some(*table),
            _ if deferring => cursor.deferred.push(*instruction),
            Instruction::Drop => return Step::Drop,
            other => match TerminalAction::from_instruction(other) {
                Some(action) => cursor.terminals.push(Terminal {
                    action,
                    header: cursor.header.clone(),
                }),
                None => apply_header_action(&mut cursor.header, other),
            },
        }
    }
    next.map_or(Step::End, Step::Transition)
}

/// End of pipeline: flush the deferred queue, then collect terminals.
fn finish(ctx: &PipelineContext<'_>, mut cursor: Cursor) -> PipelineEnd {
    let device = ctx.flows.device();
    let deferred = std::mem::take(&mut cursor.deferred);

    let outputs = deferred
        .iter()
        .filter(|i| matches!(i, Instruction::Output { .. }))
        .count();
    if outputs > 1 {
        warn!(%device, outputs, "more than one output instruction in a deferred set");
    }

    let mut queued = Vec::new();
    for instruction in &deferred {
        if matches!(instruction, Instruction::Drop) {
            return PipelineEnd::Dropped {
                table: cursor.table,
            };
        }
        match TerminalAction::from_instruction(instruction) {
            Some(action) => queued.push(action),
            None => apply_header_action(&mut cursor.header, instruction),
        }
    }
    for action in queued {
        cursor.terminals.push(Terminal {
            action,
            header: cursor.header.clone(),
        });
    }

    if cursor.terminals.is_empty() {
        return PipelineEnd::Failed(FailureReason::NoTerminalAction {
            device: device.clone(),
        });
    }
    PipelineEnd::Forward {
        terminals: cursor.terminals,
        flows: cursor.flows,
        tables: cursor.tables,
    }
}

/// Applies a header-rewriting instruction. Other instructions are ignored.
pub(crate) fn apply_header_action(header: &mut HeaderState, instruction: &Instruction) {
    match instruction {
        Instruction::SetField {
            field: field @ Field::MplsLabel(_),
        } => {
            header.insert(*field);
            header.insert(Field::MplsBos(true));
        }
        Instruction::SetField { field } => header.insert(*field),
        Instruction::PushMpls { eth_type } => header.insert(Field::EthType(*eth_type)),
        Instruction::PopMpls { eth_type } => {
            header.insert(Field::EthType(*eth_type));
            header.remove(FieldType::MplsLabel);
            header.remove(FieldType::MplsBos);
        }
        Instruction::PopVlan => header.insert(Field::VlanId(VlanId::NONE)),
        _ => {}
    }
}

/// Expands a terminal into concrete outputs, fanning out through groups.
/// Each element is either an egress or the outcome that ended that
/// alternative.
pub(crate) fn expand_terminal(
    flows: &DeviceFlows,
    terminal: Terminal,
) -> Vec<Result<Egress, BranchOutcome>> {
    let mut out = Vec::new();
    expand(
        flows,
        terminal.action,
        terminal.header,
        &GroupChain::new(),
        &mut out,
    );
    out
}

fn expand(
    flows: &DeviceFlows,
    action: TerminalAction,
    header: HeaderState,
    chain: &GroupChain,
    out: &mut Vec<Result<Egress, BranchOutcome>>,
) {
    let device = flows.device();
    let id = match action {
        TerminalAction::Output(port) => {
            out.push(Ok(Egress {
                port,
                header,
                groups: chain.clone(),
            }));
            return;
        }
        TerminalAction::Group(id) => id,
    };

    if chain.contains(&id) {
        out.push(Err(FailureReason::LoopDetected {
            device: device.clone(),
        }
        .into()));
        return;
    }
    let Some(group) = flows.group_of(id).filter(|g| g.has_buckets()) else {
        out.push(Err(FailureReason::NoBuckets {
            device: device.clone(),
            group: id,
        }
        .into()));
        return;
    };
    debug!(%device, group = %id, buckets = group.buckets.len(), "expanding group");

    let mut chain = chain.clone();
    chain.push(id);
    for bucket in &group.buckets {
        let before = out.len();
        let mut header = header.clone();
        for instruction in &bucket.treatment {
            match instruction {
                Instruction::Drop => break,
                Instruction::Transition { .. }
                | Instruction::BeginDeferred
                | Instruction::ClearDeferred => {
                    warn!(
                        %device,
                        group = %id,
                        ?instruction,
                        "pipeline instruction ignored inside a group bucket"
                    );
                    continue;
                }
                _ => {}
            }
            match TerminalAction::from_instruction(instruction) {
                Some(action) => expand(flows, action, header.clone(), &chain, out),
                None => apply_header_action(&mut header, instruction),
            }
        }
        if out.len() == before {
            out.push(Err(FailureReason::NoTerminalAction {
                device: device.clone(),
            }
            .into()));
        }
    }
}
