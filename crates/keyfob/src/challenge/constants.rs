//! Constants for the challenge/response protocol

use crate::crypto::{NONCE_SIZE, TAG_SIZE};
use crate::types::Millis;

// Message opcodes
pub const CHALLENGE_REQUEST: u8 = 0xC1;
pub const CHALLENGE_ACK: u8 = 0xC2;

// Message layout
pub const CHALLENGE_HEADER_SIZE: usize = 1 + 1 + NONCE_SIZE + 2;
pub const ACK_SIZE: usize = 1 + 1 + 1 + NONCE_SIZE + TAG_SIZE;

/// Largest payload a challenge may carry
pub const MAX_PAYLOAD_SIZE: usize = 64;

// Retransmission policy
pub const CHALLENGE_RETRY_TIMEOUT: Millis = 1_500;
pub const CHALLENGE_MAX_RETRIES: u8 = 3;

/// Nonces a responder remembers for duplicate detection
pub const REPLAY_WINDOW: usize = 32;
