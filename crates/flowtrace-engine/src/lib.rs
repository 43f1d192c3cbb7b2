//! Static packet trace engine.
//!
//! Replays a candidate packet through the flow tables and group tables of
//! every device it can reach, across the discovered topology, and reports
//! every path the packet could take. Nothing is injected into the network:
//! all state is read through [`NetworkView`](flowtrace_store::NetworkView).
//!
//! # Architecture
//!
//! - [`lookup`]: per-device flow and group lookup ([`DeviceFlows`])
//! - [`interpreter`]: device pipeline (table transitions, immediate and
//!   deferred actions, hardware miss rules, group expansion)
//! - `walker`: what lies beyond an output port (controller, host, edge
//!   port, links)
//! - [`report`]: [`TraceReport`], the aggregate of all branches
//! - [`engine`]: [`Tracer`] and its worklist
//! - [`hosts`]: [`HostTracer`], traces built from host records
//!
//! # Usage
//!
//! ```ignore
//! let snapshot = NetworkSnapshot::from_json_str(&json)?;
//! let report = Tracer::new(&snapshot).trace(&selector, &"of:0001/1".parse()?);
//! if !report.is_success() {
//!     eprintln!("{}", report.result_message());
//! }
//! ```

pub mod engine;
pub mod error;
pub mod hosts;
pub mod interpreter;
pub mod lookup;
pub mod outcome;
pub mod report;
mod walker;

pub use engine::{Tracer, TracerConfig};
pub use error::TraceError;
pub use hosts::HostTracer;
pub use interpreter::GroupChain;
pub use lookup::DeviceFlows;
pub use outcome::{BranchOutcome, FailureReason};
pub use report::{BranchId, BranchRecord, DeviceOutput, OutcomeRecord, TraceReport};
