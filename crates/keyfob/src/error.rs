//! Error types for the keyfob library
//!
//! Expected protocol conditions (busy, timeout, malformed input) are reported
//! through [`AuthOutcome`](crate::types::AuthOutcome) by the engines' `poll`
//! methods. The errors here cover operations that cannot be issued at all and
//! contract violations.

use crate::transport::TransportError;
use crate::types::PeerId;
use thiserror::Error;

/// Errors that can occur while running the keyfob protocols
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeyfobError {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("No usable credential for peer {0}")]
    NoCredential(PeerId),

    #[error("Unknown data: {0}")]
    UnknownData(String),

    #[error("Malformed peer key: {0}")]
    MalformedPeerKey(String),

    #[error("Invalid state for operation")]
    InvalidState,

    #[error("Payload too large: {0} bytes")]
    PayloadTooLarge(usize),

    #[error("No valid wakeup source")]
    NoWakeupSource,

    #[error("Credential store error: {0}")]
    Store(String),

    #[error("BLE peripheral error: {0}")]
    Peripheral(String),
}

/// Result type for keyfob operations
pub type KeyfobResult<T> = Result<T, KeyfobError>;
