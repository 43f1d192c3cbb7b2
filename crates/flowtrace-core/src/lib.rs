pub mod driver;
pub mod error;
pub mod flow;
pub mod group;
pub mod header;
pub mod id;
pub mod instruction;
pub mod net;

// Re-export commonly used types
pub use driver::{match_strategy, Driver, MatchStrategy, MissAction, MissJump, PipelineProfile};
pub use error::CoreError;
pub use flow::{FlowEntry, FlowEntryBuilder, FlowState};
pub use group::{Group, GroupBucket, GroupType};
pub use header::{Field, FieldType, HeaderState};
pub use id::{
    ConnectPoint, DeviceId, EthType, FlowId, GroupId, HostId, IpPrefix, MacAddr, NodeId,
    PortNumber, TableId, VlanId,
};
pub use instruction::{Instruction, Treatment, TreatmentBuilder};
pub use net::{is_link_local, Device, Host, Link, LinkState, Port, Route};
