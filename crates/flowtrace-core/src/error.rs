//! Core error types for flowtrace-core.
//!
//! Uses `thiserror` for structured, matchable variants. These cover parsing
//! of the canonical string forms (connect points, ports, addresses) and
//! out-of-range literals.

use thiserror::Error;

/// Errors produced while constructing or parsing core values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// A connect point string was not of the form `device/port`.
    #[error("invalid connect point: '{input}', expected 'device/port'")]
    InvalidConnectPoint { input: String },

    /// A port was neither a number nor `CONTROLLER`.
    #[error("invalid port number: '{input}'")]
    InvalidPort { input: String },

    /// A MAC address was not six colon-separated hex octets.
    #[error("invalid MAC address: '{input}'")]
    InvalidMac { input: String },

    /// An IP prefix had a malformed address or an over-long length.
    #[error("invalid IP prefix: '{input}'")]
    InvalidPrefix { input: String },

    /// A VLAN id outside the 12-bit range.
    #[error("invalid VLAN id: {vid}")]
    InvalidVlan { vid: u16 },
}
