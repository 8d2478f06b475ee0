//! Keyfob configuration
//!
//! Addresses, timeouts and the unlock command. Each protocol engine has its
//! own configuration struct; [`KeyfobConfig`] gathers them for the device.

use crate::bonding::BondingConfig;
use crate::challenge::ChallengeConfig;
use crate::device::AlertConfig;
use crate::ecdh::KeyExchangeConfig;
use crate::types::{Millis, PeerId};

/// Radio address of the keyfob itself
pub const OWN_ADDRESS: PeerId = PeerId(2);
/// Radio address a new lock controller listens on during key exchange
pub const KEY_EXCHANGE_PEER: PeerId = PeerId(1);
/// Data channel address of the central during BLE bonding
pub const BONDING_PEER: PeerId = PeerId(3);

pub const DEVICE_NAME: &str = "KeyFob";

// Timeouts (in milliseconds)
pub const CONNECTION_TIMEOUT: Millis = 30_000;
pub const ADVERTISING_TIMEOUT: Millis = 5_000;
pub const DISCONNECT_TIMEOUT: Millis = 3_000;
pub const POST_AUTH_LINGER: Millis = 1_000;
pub const UNKNOWN_PROTOCOL_TIMEOUT: Millis = 5_000;

/// Command payload carried by the authentication challenge
pub const UNLOCK_PAYLOAD: [u8; 4] = [0xFE, 0xDC, 0xBA, 0x98];

/// Device configuration
#[derive(Debug, Clone)]
pub struct KeyfobConfig {
    /// Own radio address
    pub own_address: PeerId,
    /// Peer address for radio key exchange
    pub key_exchange_peer: PeerId,
    /// Peer address of the bonding central
    pub bonding_peer: PeerId,
    /// Advertised BLE device name
    pub device_name: String,
    /// Force a disconnect when a connection shows no activity this long
    pub connection_timeout_ms: Millis,
    /// Advertising window requested before going to sleep
    pub advertising_timeout_ms: Millis,
    /// Time allowed for a disconnect to complete
    pub disconnect_timeout_ms: Millis,
    /// Stay awake this long after a successful authentication
    pub post_auth_linger_ms: Millis,
    /// Listen this long on a channel carrying an unknown protocol
    pub unknown_protocol_timeout_ms: Millis,
    /// Unlock command sent with the challenge
    pub unlock_payload: Vec<u8>,
    /// Radio key exchange
    pub key_exchange: KeyExchangeConfig,
    /// Challenge/response
    pub challenge: ChallengeConfig,
    /// BLE bonding
    pub bonding: BondingConfig,
    /// Immediate alert
    pub alert: AlertConfig,
}

impl Default for KeyfobConfig {
    fn default() -> Self {
        Self {
            own_address: OWN_ADDRESS,
            key_exchange_peer: KEY_EXCHANGE_PEER,
            bonding_peer: BONDING_PEER,
            device_name: DEVICE_NAME.to_string(),
            connection_timeout_ms: CONNECTION_TIMEOUT,
            advertising_timeout_ms: ADVERTISING_TIMEOUT,
            disconnect_timeout_ms: DISCONNECT_TIMEOUT,
            post_auth_linger_ms: POST_AUTH_LINGER,
            unknown_protocol_timeout_ms: UNKNOWN_PROTOCOL_TIMEOUT,
            unlock_payload: UNLOCK_PAYLOAD.to_vec(),
            key_exchange: KeyExchangeConfig::default(),
            challenge: ChallengeConfig::default(),
            bonding: BondingConfig::default(),
            alert: AlertConfig::default(),
        }
    }
}
