//! Group tables: alternative treatments selected by group type.

use serde::{Deserialize, Serialize};

use crate::id::{DeviceId, GroupId};
use crate::instruction::Treatment;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GroupType {
    /// Every bucket is executed (multicast, flooding).
    All,
    /// One bucket is chosen per packet (ECMP). A static trace explores all.
    #[default]
    Select,
    /// Exactly one bucket.
    Indirect,
    /// First live bucket.
    FastFailover,
}

/// One alternative of a group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupBucket {
    pub treatment: Treatment,
    #[serde(default = "default_weight")]
    pub weight: u16,
}

fn default_weight() -> u16 {
    1
}

impl From<Treatment> for GroupBucket {
    fn from(treatment: Treatment) -> Self {
        GroupBucket {
            treatment,
            weight: default_weight(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub id: GroupId,
    pub device: DeviceId,
    #[serde(default)]
    pub group_type: GroupType,
    #[serde(default)]
    pub buckets: Vec<GroupBucket>,
}

impl Group {
    pub fn new(id: u32, device: impl Into<DeviceId>, group_type: GroupType) -> Self {
        Group {
            id: GroupId(id),
            device: device.into(),
            group_type,
            buckets: Vec::new(),
        }
    }

    pub fn with_bucket(mut self, treatment: Treatment) -> Self {
        self.buckets.push(treatment.into());
        self
    }

    pub fn has_buckets(&self) -> bool {
        !self.buckets.is_empty()
    }
}
