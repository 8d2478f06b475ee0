//! Type definitions for transport operations

use crate::types::PeerId;
use thiserror::Error;

/// Error types specific to transport operations
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("Send to {0} could not be issued")]
    SendFailed(PeerId),

    #[error("Link not connected")]
    NotConnected,

    #[error("Frame too large: {0} bytes")]
    FrameTooLarge(usize),

    #[error("Transport unavailable: {0}")]
    Unavailable(String),

    #[error("Request rejected by module: {0}")]
    Rejected(String),
}

/// Result type for transport operations
pub type TransportResult<T> = std::result::Result<T, TransportError>;

/// One received frame together with its sender
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Datagram {
    /// Address of the sender
    pub from: PeerId,
    /// Frame payload
    pub data: Vec<u8>,
}

impl Datagram {
    /// Create a new datagram
    pub fn new(from: PeerId, data: Vec<u8>) -> Self {
        Self { from, data }
    }

    /// First byte of the payload, if any
    pub fn opcode(&self) -> Option<u8> {
        self.data.first().copied()
    }
}
