//! Type definitions shared by all protocol engines

use std::fmt;

/// Milliseconds on the device's monotonic clock
pub type Millis = u64;

/// Small integer address of a radio or BLE data-channel endpoint
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeerId(pub u8);

impl PeerId {
    /// Address every listening endpoint accepts
    pub const BROADCAST: PeerId = PeerId(0xFF);

    /// Raw address value
    pub const fn value(&self) -> u8 {
        self.0
    }

    /// Whether this is the broadcast address
    pub const fn is_broadcast(&self) -> bool {
        self.0 == Self::BROADCAST.0
    }
}

impl From<u8> for PeerId {
    fn from(value: u8) -> Self {
        PeerId(value)
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_broadcast() {
            write!(f, "broadcast")
        } else {
            write!(f, "#{}", self.0)
        }
    }
}

/// Result of polling a protocol engine once
///
/// Every engine reports one of these per loop iteration. None of them is an
/// error: the orchestrator decides what each one means for the wake cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthOutcome {
    /// Exchange in progress, nothing to do yet
    Busy,
    /// Pairing engine finished and produced a credential
    Ok,
    /// Challenge/response acknowledged by the peer
    InitiatorOk,
    /// Nothing in flight, or the exchange failed for good
    NoAuthentication,
    /// Received bytes are not the expected protocol
    UnknownData,
    /// The link layer wants a passcode entered by a human
    PasscodeRequested,
}

impl AuthOutcome {
    /// Whether the outcome ends the current exchange
    pub fn is_terminal(&self) -> bool {
        !matches!(self, AuthOutcome::Busy | AuthOutcome::PasscodeRequested)
    }
}

impl fmt::Display for AuthOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthOutcome::Busy => write!(f, "Authentication busy"),
            AuthOutcome::Ok => write!(f, "Authentication OK"),
            AuthOutcome::InitiatorOk => write!(f, "Authentication as initiator OK"),
            AuthOutcome::NoAuthentication => write!(f, "No authentication"),
            AuthOutcome::UnknownData => write!(f, "Unknown data"),
            AuthOutcome::PasscodeRequested => write!(f, "Passcode requested"),
        }
    }
}
