//! Challenge/response authentication
//!
//! The keyfob proves possession of the master key shared with a peer and
//! carries a small command payload (the unlock code) with the proof:
//! - Each session draws a fresh random nonce
//! - The challenge and the acknowledgement are both HMAC-tagged
//! - The initiator retransmits a bounded number of times before giving up
//!
//! The responder side is what a lock controller runs. It acknowledges every
//! valid challenge and reports whether the nonce was seen before, so a
//! retransmitted challenge is acknowledged again but executed once.

mod constants;
mod initiator;
mod messages;
mod responder;
#[cfg(test)]
mod tests;

pub use self::constants::*;
pub use self::initiator::{ChallengeConfig, ChallengeInitiator, ChallengeState};
pub use self::messages::{AckMessage, ChallengeMessage};
pub use self::responder::{ChallengeResponder, Response};
