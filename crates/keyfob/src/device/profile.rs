//! GATT profile hosted by the keyfob

use crate::error::{KeyfobError, KeyfobResult};
use crate::store::{CredentialStore, HandleSlot, RFID_KEY_SIZE};
use crate::transport::{
    BleTransport, CharacteristicProperties, CharacteristicSecurity, LocalCharacteristic,
};
use crate::uuid::Uuid;
use log::debug;

/// Vendor service carrying the RFID credential
pub const RFID_SERVICE_UUID: Uuid = Uuid::from_u128(0xf1a87912_5950_479c_a5e5_b6cc81cd0502);
/// RFID credential characteristic, written by the central over an encrypted link
pub const RFID_CHARACTERISTIC_UUID: Uuid = Uuid::from_u128(0x855b1938_83e2_4889_80b7_ae58fcd0e6ca);
/// Immediate Alert service
pub const IMMEDIATE_ALERT_SERVICE_UUID: Uuid = Uuid::from_u16(0x1802);
/// Alert Level characteristic
pub const ALERT_LEVEL_UUID: Uuid = Uuid::from_u16(0x2A06);

/// The two characteristics the keyfob serves
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyfobProfile {
    pub rfid: LocalCharacteristic,
    pub alert_level: LocalCharacteristic,
}

impl Default for KeyfobProfile {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyfobProfile {
    pub fn new() -> Self {
        Self {
            rfid: LocalCharacteristic::new(
                RFID_SERVICE_UUID,
                RFID_CHARACTERISTIC_UUID,
                CharacteristicProperties::WRITE,
                CharacteristicSecurity::ENCRYPTED_WRITE,
                RFID_KEY_SIZE,
            ),
            alert_level: LocalCharacteristic::new(
                IMMEDIATE_ALERT_SERVICE_UUID,
                ALERT_LEVEL_UUID,
                CharacteristicProperties::READ | CharacteristicProperties::WRITE_WITHOUT_RESPONSE,
                CharacteristicSecurity::empty(),
                1,
            ),
        }
    }

    /// Both characteristics, for programming and starting the module
    pub fn characteristics(&self) -> [LocalCharacteristic; 2] {
        [self.rfid.clone(), self.alert_level.clone()]
    }

    /// Load handles persisted by an earlier provisioning
    pub fn restore_handles<S: CredentialStore + ?Sized>(&mut self, store: &S) {
        self.rfid.handle = store.characteristic_handle(HandleSlot::Rfid);
        self.alert_level.handle = store.characteristic_handle(HandleSlot::AlertLevel);
    }

    /// Read the handles the module assigned and persist them
    pub fn assign_handles<L, S>(&mut self, ble: &L, store: &mut S) -> KeyfobResult<()>
    where
        L: BleTransport + ?Sized,
        S: CredentialStore + ?Sized,
    {
        for (slot, characteristic) in [
            (HandleSlot::Rfid, &mut self.rfid),
            (HandleSlot::AlertLevel, &mut self.alert_level),
        ] {
            let handle = ble.local_handle(&characteristic.uuid).ok_or_else(|| {
                KeyfobError::Peripheral(format!("no handle assigned to {}", characteristic.uuid))
            })?;
            debug!("Characteristic {} has handle 0x{:04X}", characteristic.uuid, handle);
            characteristic.handle = Some(handle);
            store.set_characteristic_handle(slot, handle)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimBle;
    use crate::store::MemoryCredentialStore;

    #[test]
    fn test_handles_are_persisted_and_restored() {
        let mut profile = KeyfobProfile::new();
        let mut ble = SimBle::new();
        let mut store = MemoryCredentialStore::new();
        ble.init().unwrap();
        ble.program_peripheral(&profile.characteristics(), "test").unwrap();

        profile.assign_handles(&ble, &mut store).unwrap();
        let rfid_handle = profile.rfid.handle;
        assert!(rfid_handle.is_some());
        assert_eq!(store.characteristic_handle(HandleSlot::Rfid), rfid_handle);

        let mut restored = KeyfobProfile::new();
        restored.restore_handles(&store);
        assert_eq!(restored, profile);
    }

    #[test]
    fn test_unprogrammed_module_has_no_handles() {
        let mut profile = KeyfobProfile::new();
        let ble = SimBle::new();
        let mut store = MemoryCredentialStore::new();

        assert!(matches!(
            profile.assign_handles(&ble, &mut store),
            Err(KeyfobError::Peripheral(_))
        ));
    }

    #[test]
    fn test_alert_uuid_is_sig_assigned() {
        assert_eq!(ALERT_LEVEL_UUID.as_u16(), Some(0x2A06));
        assert_eq!(RFID_CHARACTERISTIC_UUID.as_u16(), None);
        assert!(KeyfobProfile::new().rfid.requires_encryption());
    }

    #[test]
    fn test_rfid_slot_is_write_only() {
        let profile = KeyfobProfile::new();
        assert_eq!(profile.rfid.properties, CharacteristicProperties::WRITE);
        assert!(!profile.rfid.properties.contains(CharacteristicProperties::READ));
        assert!(profile
            .alert_level
            .properties
            .contains(CharacteristicProperties::WRITE_WITHOUT_RESPONSE));
    }
}
