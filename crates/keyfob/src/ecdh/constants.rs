//! Constants for the key exchange protocol

use crate::types::Millis;

// Message opcodes
pub const ECDH_PUBLIC_KEY: u8 = 0xE1;

// Uncompressed SEC1 encoding of a P-256 point: 0x04 || x || y
pub const SEC1_UNCOMPRESSED_TAG: u8 = 0x04;
pub const PUBLIC_KEY_SIZE: usize = 65;
pub const PUBLIC_KEY_MESSAGE_SIZE: usize = 1 + PUBLIC_KEY_SIZE;

// Timeouts (in milliseconds)
pub const KEY_EXCHANGE_TIMEOUT: Millis = 15_000;
pub const PUBLIC_KEY_RETRANSMIT_INTERVAL: Millis = 2_000;
