//! Transport capability interfaces
//!
//! The radio and the BLE module are external drivers. This module describes
//! what the protocol engines need from them:
//! - Non-blocking datagram send/receive addressed by [`PeerId`](crate::types::PeerId)
//! - Radio low-power control
//! - BLE advertising, bonding state, local GATT characteristics and an
//!   event queue the main loop drains

pub mod ble;
pub mod radio;
pub mod types;

pub use self::ble::{
    BleEvent, BleTransport, CharacteristicProperties, CharacteristicSecurity, LocalCharacteristic,
};
pub use self::radio::{DatagramTransport, RadioTransport};
pub use self::types::{Datagram, TransportError, TransportResult};
