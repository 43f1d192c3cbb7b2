//! Terminal classification of a trace branch.
//!
//! Outcomes stay typed inside the engine and the report; they are rendered to
//! text only when [`TraceReport::result_message`](crate::TraceReport) is
//! built. The `Display` phrases below are consumed by callers as substrings
//! and must not change.

use std::fmt;

use flowtrace_core::{ConnectPoint, DeviceId, GroupId, HostId, NodeId, TableId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// How one branch ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BranchOutcome {
    /// Output reached a port with at least one attached host.
    DeliveredToHost {
        location: ConnectPoint,
        hosts: Vec<HostId>,
    },
    /// Output reached an edge port with no known host.
    DeliveredToEdgePort { location: ConnectPoint },
    /// Output to the controller port.
    PuntedToController {
        device: DeviceId,
        master: Option<NodeId>,
    },
    /// An explicit drop instruction.
    Dropped { device: DeviceId, table: TableId },
    Failed { reason: FailureReason },
}

impl BranchOutcome {
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            BranchOutcome::DeliveredToHost { .. }
                | BranchOutcome::DeliveredToEdgePort { .. }
                | BranchOutcome::PuntedToController { .. }
        )
    }

    pub fn failure(&self) -> Option<&FailureReason> {
        match self {
            BranchOutcome::Failed { reason } => Some(reason),
            _ => None,
        }
    }

    /// Outcomes left out of the rendered message.
    pub fn is_silent(&self) -> bool {
        matches!(
            self,
            BranchOutcome::Failed {
                reason: FailureReason::LoopDetected { .. }
            }
        )
    }
}

impl From<FailureReason> for BranchOutcome {
    fn from(reason: FailureReason) -> Self {
        BranchOutcome::Failed { reason }
    }
}

impl fmt::Display for BranchOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BranchOutcome::DeliveredToHost { location, .. } => {
                write!(f, "Reached required destination Host {location}")
            }
            BranchOutcome::DeliveredToEdgePort { location } => {
                write!(
                    f,
                    "Packet reached output {location} which is an enabled edge port"
                )
            }
            BranchOutcome::PuntedToController {
                master: Some(master),
                ..
            } => write!(f, "Packet goes to the controller {master}"),
            BranchOutcome::PuntedToController {
                device,
                master: None,
            } => write!(f, "Packet goes to the controller (no master for {device})"),
            BranchOutcome::Dropped { device, table } => {
                write!(
                    f,
                    "Packet is dropped by flow rule on table {table} in device {device}"
                )
            }
            BranchOutcome::Failed { reason } => write!(f, "{reason}"),
        }
    }
}

/// Why a branch failed.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum FailureReason {
    #[error("Device {device} does not exist")]
    DeviceUnknown { device: DeviceId },

    #[error("Device is offline {device}")]
    DeviceOffline { device: DeviceId },

    #[error("No flow rules for device {device}. Aborting")]
    NoFlowEntries { device: DeviceId },

    #[error("Packet has no match on table {table} in device {device}. Dropping")]
    NoMatchingFlow { device: DeviceId, table: TableId },

    #[error("Connect point out {output} is same as initial input {input}")]
    OutputEqualsInput {
        output: ConnectPoint,
        input: ConnectPoint,
    },

    /// Also used when the group does not exist.
    #[error("Group {group} on device {device} has no buckets")]
    NoBuckets { device: DeviceId, group: GroupId },

    #[error("No output out of device {device}. Packet is dropped")]
    NoTerminalAction { device: DeviceId },

    /// A hardware VLAN table tagged an untagged packet but has no entry
    /// for the tagged packet.
    #[error("Missing forwarding rule for tagged packet on {input}")]
    MissingTaggedRule { input: ConnectPoint },

    #[error("Loop encountered in device {device}")]
    LoopDetected { device: DeviceId },

    #[error("No links depart from {output}. Packet is dropped")]
    DeadEnd { output: ConnectPoint },

    #[error("Branch limit of {limit} reached, remaining paths were not explored")]
    BranchLimit { limit: usize },
}
