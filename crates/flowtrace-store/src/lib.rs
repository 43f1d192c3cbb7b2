//! Read-only network state for flowtrace.
//!
//! Provides the reader traits the trace engine consumes (flow rules, groups,
//! topology, hosts, devices, edge ports, mastership, routes, router config),
//! bundled by [`NetworkView`], plus [`NetworkSnapshot`] as a first-class
//! in-memory backend loadable from JSON.
//!
//! # Modules
//!
//! - [`error`]: StoreError enum with all failure modes
//! - [`traits`]: reader trait definitions
//! - [`snapshot`]: NetworkSnapshot and its builder

pub mod error;
pub mod snapshot;
pub mod traits;

// Re-export key types for ergonomic use.
pub use error::StoreError;
pub use snapshot::{NetworkSnapshot, SnapshotBuilder, SnapshotData};
pub use traits::{
    DeviceReader, EdgePortReader, FlowReader, GroupReader, HostReader, MastershipReader,
    NetworkView, RouteReader, RouterConfigReader, TopologyReader,
};
