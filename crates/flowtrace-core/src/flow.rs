//! Installed flow entries.

use serde::{Deserialize, Serialize};

use crate::header::{Field, HeaderState};
use crate::id::{DeviceId, FlowId, PortNumber, TableId};
use crate::instruction::Treatment;

/// Lifecycle state of a flow entry. Only [`FlowState::Added`] entries take
/// part in a trace.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FlowState {
    PendingAdd,
    #[default]
    Added,
    PendingRemove,
    Removed,
    Failed,
}

/// A match-action rule installed in one table of one device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowEntry {
    pub id: FlowId,
    pub device: DeviceId,
    #[serde(default)]
    pub table: TableId,
    pub priority: u16,
    /// Partial header: only the listed fields are constrained.
    #[serde(default)]
    pub selector: HeaderState,
    #[serde(default)]
    pub treatment: Treatment,
    #[serde(default)]
    pub app_id: String,
    #[serde(default)]
    pub state: FlowState,
}

impl FlowEntry {
    pub fn builder(id: u64, device: impl Into<DeviceId>) -> FlowEntryBuilder {
        FlowEntryBuilder::new(id, device)
    }

    pub fn is_added(&self) -> bool {
        self.state == FlowState::Added
    }

    /// The in-port this entry is restricted to, if any.
    pub fn in_port(&self) -> Option<PortNumber> {
        self.selector.in_port()
    }
}

/// Fluent construction of a [`FlowEntry`]. Defaults to table 0, priority 0,
/// an empty selector and the `Added` state.
#[derive(Debug, Clone)]
pub struct FlowEntryBuilder {
    entry: FlowEntry,
}

impl FlowEntryBuilder {
    pub fn new(id: u64, device: impl Into<DeviceId>) -> Self {
        FlowEntryBuilder {
            entry: FlowEntry {
                id: FlowId(id),
                device: device.into(),
                table: TableId::default(),
                priority: 0,
                selector: HeaderState::new(),
                treatment: Treatment::default(),
                app_id: String::new(),
                state: FlowState::Added,
            },
        }
    }

    pub fn table(mut self, table: u32) -> Self {
        self.entry.table = TableId(table);
        self
    }

    pub fn priority(mut self, priority: u16) -> Self {
        self.entry.priority = priority;
        self
    }

    /// Adds one constrained field to the selector.
    pub fn matching(mut self, field: Field) -> Self {
        self.entry.selector.insert(field);
        self
    }

    pub fn in_port(self, port: u64) -> Self {
        self.matching(Field::InPort(PortNumber::Physical(port)))
    }

    pub fn selector(mut self, selector: HeaderState) -> Self {
        self.entry.selector = selector;
        self
    }

    pub fn treatment(mut self, treatment: Treatment) -> Self {
        self.entry.treatment = treatment;
        self
    }

    pub fn app(mut self, app_id: impl Into<String>) -> Self {
        self.entry.app_id = app_id.into();
        self
    }

    pub fn state(mut self, state: FlowState) -> Self {
        self.entry.state = state;
        self
    }

    pub fn build(self) -> FlowEntry {
        self.entry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::EthType;

    #[test]
    fn builder_defaults() {
        let flow = FlowEntry::builder(7, "leaf1").build();
        assert_eq!(flow.id, FlowId(7));
        assert_eq!(flow.table, TableId(0));
        assert!(flow.is_added());
        assert!(flow.selector.is_empty());
        assert_eq!(flow.in_port(), None);
    }

    #[test]
    fn builder_collects_selector_fields() {
        let flow = FlowEntry::builder(1, "leaf1")
            .table(10)
            .priority(40000)
            .in_port(3)
            .matching(Field::EthType(EthType::IPV4))
            .state(FlowState::PendingAdd)
            .build();
        assert_eq!(flow.selector.len(), 2);
        assert_eq!(flow.in_port(), Some(PortNumber::Physical(3)));
        assert!(!flow.is_added());
    }

    #[test]
    fn deserializes_with_defaults() {
        let flow: FlowEntry = serde_json::from_str(
            r#"{"id": 4, "device": "spine1", "priority": 10,
                "treatment": [{"type": "OUTPUT", "port": "2"}]}"#,
        )
        .unwrap();
        assert_eq!(flow.table, TableId(0));
        assert_eq!(flow.state, FlowState::Added);
        assert_eq!(flow.treatment.len(), 1);
    }
}
