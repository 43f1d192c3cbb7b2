//! Device drivers and hardware pipeline profiles.
//!
//! Software switches run a textbook pipeline: one best entry per table and a
//! table miss drops the packet. Some ASIC-backed pipelines deviate, so a
//! [`Driver`] may carry a [`PipelineProfile`] describing:
//!
//! - tables where one logical rule is split over several physical entries
//!   (every matching entry is reachable, see [`MatchStrategy::All`]);
//! - where the pipeline continues after a table miss;
//! - fixed tables that act on a miss without any installed entry.
//!
//! The trace engine only consults [`Driver::match_strategy`] and
//! [`Driver::miss_action`]; it never compares driver names.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::id::TableId;

/// Driver names of hardware targets running the OF-DPA pipeline.
const OFDPA_HARDWARE: &[&str] = &[
    "ofdpa",
    "ofdpa3",
    "qmx-ofdpa3",
    "accton-ofdpa3",
    "znyx-ofdpa",
    "as7712-32x-premium",
    "as5912-54x-premium",
    "as5916-54xk-premium",
];

/// How many entries of one table a packet can hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MatchStrategy {
    /// Highest priority entry only.
    Single,
    /// Every matching entry; each one forks a sibling pipeline.
    All,
}

/// What the pipeline does when no entry of a table matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MissAction {
    /// The packet is dropped (no matching flow).
    Fail,
    /// Continue at the next populated table after the missed one.
    NextPopulated,
    /// Continue at a fixed table.
    Jump(TableId),
}

/// Table-miss jump rule of a pipeline profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MissJump {
    pub from: TableId,
    pub to: TableId,
}

/// Hardware pipeline deviations of one driver family.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineProfile {
    /// Tables where every matching entry is reachable.
    #[serde(default)]
    pub multi_entry_tables: BTreeSet<TableId>,
    /// Explicit miss jumps; other misses go to the next populated table.
    #[serde(default)]
    pub miss_jumps: Vec<MissJump>,
    /// Fixed MPLS termination tables: a miss pops MPLS before continuing.
    #[serde(default)]
    pub fixed_mpls_tables: BTreeSet<TableId>,
}

impl PipelineProfile {
    /// The OF-DPA hardware pipeline.
    pub fn ofdpa() -> Self {
        PipelineProfile {
            multi_entry_tables: BTreeSet::from([TableId(10)]),
            miss_jumps: vec![
                MissJump {
                    from: TableId(20),
                    to: TableId(50),
                },
                MissJump {
                    from: TableId(40),
                    to: TableId(60),
                },
            ],
            fixed_mpls_tables: BTreeSet::from([TableId(27)]),
        }
    }

    pub fn match_strategy(&self, table: TableId) -> MatchStrategy {
        if self.multi_entry_tables.contains(&table) {
            MatchStrategy::All
        } else {
            MatchStrategy::Single
        }
    }

    pub fn miss_action(&self, table: TableId) -> MissAction {
        self.miss_jumps
            .iter()
            .find(|jump| jump.from == table)
            .map_or(MissAction::NextPopulated, |jump| MissAction::Jump(jump.to))
    }

    pub fn is_fixed_mpls_table(&self, table: TableId) -> bool {
        self.fixed_mpls_tables.contains(&table)
    }
}

/// The driver a device runs.
///
/// A serialized driver without a `pipeline` is resolved by name, so a
/// snapshot only has to name a hardware target to get its profile.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "DriverRecord")]
pub struct Driver {
    pub name: String,
    pub pipeline: Option<PipelineProfile>,
}

#[derive(Deserialize)]
struct DriverRecord {
    name: String,
    #[serde(default)]
    pipeline: Option<PipelineProfile>,
}

impl From<DriverRecord> for Driver {
    fn from(record: DriverRecord) -> Self {
        match record.pipeline {
            Some(pipeline) => Driver {
                name: record.name,
                pipeline: Some(pipeline),
            },
            None => Driver::named(record.name),
        }
    }
}

impl Driver {
    /// A software driver without pipeline deviations.
    pub fn software(name: impl Into<String>) -> Self {
        Driver {
            name: name.into(),
            pipeline: None,
        }
    }

    /// Resolves a driver by name, attaching the OF-DPA profile to known
    /// OF-DPA hardware targets.
    pub fn named(name: impl Into<String>) -> Self {
        let name = name.into();
        let pipeline = OFDPA_HARDWARE
            .contains(&name.as_str())
            .then(PipelineProfile::ofdpa);
        Driver { name, pipeline }
    }

    pub fn with_pipeline(mut self, profile: PipelineProfile) -> Self {
        self.pipeline = Some(profile);
        self
    }

    pub fn is_hardware(&self) -> bool {
        self.pipeline.is_some()
    }

    pub fn match_strategy(&self, table: TableId) -> MatchStrategy {
        match &self.pipeline {
            Some(profile) => profile.match_strategy(table),
            None => MatchStrategy::Single,
        }
    }

    pub fn miss_action(&self, table: TableId) -> MissAction {
        match &self.pipeline {
            Some(profile) => profile.miss_action(table),
            None => MissAction::Fail,
        }
    }

    pub fn is_fixed_mpls_table(&self, table: TableId) -> bool {
        self.pipeline
            .as_ref()
            .is_some_and(|profile| profile.is_fixed_mpls_table(table))
    }
}

/// Match strategy of `table` on a device running `driver`.
pub fn match_strategy(driver: &Driver, table: TableId) -> MatchStrategy {
    driver.match_strategy(table)
}
