//! Bluetooth LE module interface

use super::radio::DatagramTransport;
use super::types::TransportResult;
use crate::types::Millis;
use crate::uuid::Uuid;
use bitflags::bitflags;

bitflags! {
    /// GATT characteristic properties
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct CharacteristicProperties: u8 {
        const READ = 0x02;
        const WRITE_WITHOUT_RESPONSE = 0x04;
        const WRITE = 0x08;
        const NOTIFY = 0x10;
    }
}

bitflags! {
    /// Link security required to access a characteristic
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct CharacteristicSecurity: u8 {
        const ENCRYPTED_READ = 0x01;
        const ENCRYPTED_WRITE = 0x02;
        const AUTHENTICATED = 0x04;
    }
}

/// A characteristic hosted by the keyfob's own GATT server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalCharacteristic {
    /// Owning service
    pub service: Uuid,
    /// Characteristic UUID
    pub uuid: Uuid,
    /// Properties advertised to clients
    pub properties: CharacteristicProperties,
    /// Security required from clients
    pub security: CharacteristicSecurity,
    /// Maximum value length in bytes
    pub max_len: usize,
    /// Attribute handle, once the module has assigned one
    pub handle: Option<u16>,
}

impl LocalCharacteristic {
    /// Create a characteristic without a handle
    pub fn new(
        service: Uuid,
        uuid: Uuid,
        properties: CharacteristicProperties,
        security: CharacteristicSecurity,
        max_len: usize,
    ) -> Self {
        Self {
            service,
            uuid,
            properties,
            security,
            max_len,
            handle: None,
        }
    }

    /// Whether writes require an encrypted link
    pub fn requires_encryption(&self) -> bool {
        self.security.contains(CharacteristicSecurity::ENCRYPTED_WRITE)
    }
}

/// Events raised by the BLE module, queued until the main loop drains them
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BleEvent {
    /// The link layer needs a passcode entered
    PasscodeWanted,
    /// A central connected
    ConnectionUp,
    /// The central disconnected
    ConnectionDown,
    /// Bonding completed and the link is encrypted
    BondingBonded,
    /// A central wrote one of the local characteristics
    CharacteristicWritten {
        /// Characteristic that changed
        uuid: Uuid,
        /// New value
        value: Vec<u8>,
    },
}

/// Bluetooth LE module acting as a GATT peripheral
///
/// The datagram part of the interface is the serial data channel used by
/// the bonding engine once the link is encrypted.
pub trait BleTransport: DatagramTransport {
    /// Bring up the module
    fn init(&mut self) -> TransportResult<()>;

    /// Whether [`init`](Self::init) succeeded since the last wake
    fn is_initialized(&self) -> bool;

    /// Whether a central is connected. Readable before `init`.
    fn is_connected(&self) -> bool;

    /// Whether the current link is bonded
    fn is_bonded(&self) -> bool;

    /// Whether the current link is encrypted
    fn is_secured(&self) -> bool;

    /// Start connectable advertising for at most `timeout_ms`
    fn start_advertising(&mut self, timeout_ms: Millis) -> TransportResult<()>;

    /// Drop the current link
    fn disconnect(&mut self, timeout_ms: Millis) -> TransportResult<()>;

    /// Put the module into its low-power state
    fn sleep(&mut self);

    /// Program services, characteristics and device name into an
    /// unconfigured module, then reboot it.
    fn program_peripheral(
        &mut self,
        characteristics: &[LocalCharacteristic],
        device_name: &str,
    ) -> TransportResult<()>;

    /// Handle the module assigned to a characteristic
    fn local_handle(&self, uuid: &Uuid) -> Option<u16>;

    /// Start serving the characteristics
    fn begin_peripheral(&mut self, characteristics: &[LocalCharacteristic]) -> TransportResult<()>;

    /// Current value of a local characteristic. `None` if the module does not know it.
    fn read_local_characteristic(&mut self, characteristic: &LocalCharacteristic) -> Option<Vec<u8>>;

    /// Overwrite the value of a local characteristic
    fn write_local_characteristic(
        &mut self,
        characteristic: &LocalCharacteristic,
        value: &[u8],
    ) -> TransportResult<()>;

    /// Next pending event, if any
    fn poll_event(&mut self) -> Option<BleEvent>;
}
