//! Store error types for flowtrace-store.
//!
//! [`StoreError`] covers snapshot loading (JSON) and the integrity checks run
//! when a [`NetworkSnapshot`](crate::NetworkSnapshot) is assembled. Reads
//! against a built snapshot never fail.

use flowtrace_core::{DeviceId, FlowId, HostId};
use thiserror::Error;

/// Errors produced while loading or assembling a network snapshot.
#[derive(Debug, Error)]
pub enum StoreError {
    /// JSON serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Two device records share one id.
    #[error("duplicate device: {device}")]
    DuplicateDevice { device: DeviceId },

    /// Two flow entries on one device share one id.
    #[error("duplicate flow id {flow} on device {device}")]
    DuplicateFlow { device: DeviceId, flow: FlowId },

    /// Two host records share one id.
    #[error("duplicate host: {host}")]
    DuplicateHost { host: HostId },

    /// A record refers to a device the snapshot does not contain.
    #[error("{context} refers to unknown device {device}")]
    UnknownDevice { device: DeviceId, context: String },
}
