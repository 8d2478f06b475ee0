//! BLE bonding and credential exchange
//!
//! Pairing over BLE leaves the keyfob bonded to the central and holding the
//! RFID credential the central hands over on the encrypted data channel.
//! The link-layer security itself is the BLE module's job; this engine only
//! sequences it and fetches the credential once the link is secure.

mod constants;
mod engine;
mod messages;
#[cfg(test)]
mod tests;

pub use self::constants::*;
pub use self::engine::{BondingConfig, BondingEngine, BondingState};
pub use self::messages::{credential_request, CredentialResponse};
