//! Constants for BLE bonding

use crate::types::Millis;

// Data channel opcodes
pub const CREDENTIAL_REQUEST: u8 = 0xB1;
pub const CREDENTIAL_RESPONSE: u8 = 0xB2;

// Timeouts (in milliseconds)
pub const BONDING_ADVERTISING_WINDOW: Millis = 30_000;
pub const PASSCODE_ENTRY_WINDOW: Millis = 60_000;
pub const CREDENTIAL_TIMEOUT: Millis = 5_000;
