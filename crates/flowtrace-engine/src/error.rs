//! Trace-fatal errors.
//!
//! Almost everything that goes wrong during a trace is local to one branch
//! and lands in the report as a
//! [`FailureReason`](crate::outcome::FailureReason). [`TraceError`] is for the
//! few conditions that prevent a trace from being built at all.

use flowtrace_core::{DeviceId, EthType, HostId};
use thiserror::Error;

/// Errors that abort a whole trace request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TraceError {
    /// The ingress device does not exist (strict ingress mode only).
    #[error("Device {device} must exist")]
    DeviceUnknown { device: DeviceId },

    #[error("Source Host {host} does not exist")]
    SourceHostNotFound { host: HostId },

    #[error("Destination Host {host} does not exist")]
    DestinationHostNotFound { host: HostId },

    /// Host-to-host traces build L3 selectors and need an IP family.
    #[error("Host based trace supports only IPv4 or IPv6 as EtherType, please use packet based")]
    UnsupportedEthType { eth_type: EthType },

    #[error("Host {host} has no {eth_type} address")]
    NoAddress { host: HostId, eth_type: EthType },

    #[error("Can't get {device} router MAC, can't perform L3 tracing")]
    NoRouterMac { device: DeviceId },
}
