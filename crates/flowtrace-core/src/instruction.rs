//! Flow and bucket instructions.
//!
//! A [`Treatment`] is an ordered instruction list. Position matters: every
//! instruction after [`Instruction::BeginDeferred`] is queued for the end of
//! the device pipeline instead of being applied immediately.

use serde::{Deserialize, Serialize};

use crate::header::Field;
use crate::id::{EthType, GroupId, MacAddr, PortNumber, TableId, VlanId};

/// A single match-action instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Instruction {
    /// Overwrite one header field.
    SetField { field: Field },
    /// Push an MPLS shim; the ether type becomes `eth_type`.
    PushMpls { eth_type: EthType },
    /// Pop the MPLS shim, restoring `eth_type`.
    PopMpls { eth_type: EthType },
    /// Strip the VLAN tag.
    PopVlan,
    Output { port: PortNumber },
    Group { id: GroupId },
    /// Continue the pipeline at `table`.
    Transition { table: TableId },
    /// Following instructions of this treatment are deferred.
    BeginDeferred,
    /// Discard every deferred instruction queued so far on this device.
    ClearDeferred,
    /// Explicitly drop the packet.
    Drop,
}

impl Instruction {
    /// OUTPUT and GROUP end a device pipeline.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Instruction::Output { .. } | Instruction::Group { .. })
    }

    /// Instructions that only rewrite header fields.
    pub fn is_header_action(&self) -> bool {
        matches!(
            self,
            Instruction::SetField { .. }
                | Instruction::PushMpls { .. }
                | Instruction::PopMpls { .. }
                | Instruction::PopVlan
        )
    }
}

/// An ordered list of instructions attached to a flow entry or group bucket.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Treatment(Vec<Instruction>);

impl Treatment {
    pub fn new(instructions: Vec<Instruction>) -> Self {
        Treatment(instructions)
    }

    pub fn builder() -> TreatmentBuilder {
        TreatmentBuilder::default()
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.0
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Instruction> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Ports this treatment outputs to, in order.
    pub fn output_ports(&self) -> impl Iterator<Item = PortNumber> + '_ {
        self.0.iter().filter_map(|i| match i {
            Instruction::Output { port } => Some(*port),
            _ => None,
        })
    }
}

impl<'a> IntoIterator for &'a Treatment {
    type Item = &'a Instruction;
    type IntoIter = std::slice::Iter<'a, Instruction>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl From<Vec<Instruction>> for Treatment {
    fn from(instructions: Vec<Instruction>) -> Self {
        Treatment(instructions)
    }
}

/// Fluent construction of a [`Treatment`].
#[derive(Debug, Clone, Default)]
pub struct TreatmentBuilder {
    instructions: Vec<Instruction>,
}

impl TreatmentBuilder {
    pub fn push(mut self, instruction: Instruction) -> Self {
        self.instructions.push(instruction);
        self
    }

    pub fn set_field(self, field: Field) -> Self {
        self.push(Instruction::SetField { field })
    }

    pub fn set_vlan(self, vlan: VlanId) -> Self {
        self.set_field(Field::VlanId(vlan))
    }

    /// Sets the MPLS label. Applying it also marks bottom-of-stack.
    pub fn set_mpls(self, label: u32) -> Self {
        self.set_field(Field::MplsLabel(label))
    }

    pub fn set_eth_dst(self, mac: MacAddr) -> Self {
        self.set_field(Field::EthDst(mac))
    }

    pub fn set_eth_src(self, mac: MacAddr) -> Self {
        self.set_field(Field::EthSrc(mac))
    }

    pub fn push_mpls(self) -> Self {
        self.push(Instruction::PushMpls {
            eth_type: EthType::MPLS_UNICAST,
        })
    }

    pub fn pop_mpls(self, eth_type: EthType) -> Self {
        self.push(Instruction::PopMpls { eth_type })
    }

    pub fn pop_vlan(self) -> Self {
        self.push(Instruction::PopVlan)
    }

    /// Output on a physical port.
    pub fn output(self, port: u64) -> Self {
        self.output_to(PortNumber::Physical(port))
    }

    pub fn output_to(self, port: PortNumber) -> Self {
        self.push(Instruction::Output { port })
    }

    pub fn punt(self) -> Self {
        self.output_to(PortNumber::Controller)
    }

    pub fn group(self, id: u32) -> Self {
        self.push(Instruction::Group { id: GroupId(id) })
    }

    pub fn transition(self, table: u32) -> Self {
        self.push(Instruction::Transition {
            table: TableId(table),
        })
    }

    /// Starts the deferred section.
    pub fn deferred(self) -> Self {
        self.push(Instruction::BeginDeferred)
    }

    pub fn wipe_deferred(self) -> Self {
        self.push(Instruction::ClearDeferred)
    }

    pub fn drop_packet(self) -> Self {
        self.push(Instruction::Drop)
    }

    pub fn build(self) -> Treatment {
        Treatment(self.instructions)
    }
}
