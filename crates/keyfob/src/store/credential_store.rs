//! Credential store interface and in-memory implementation

use super::keys::{MasterKey, RfidKey};
use crate::error::KeyfobResult;
use crate::types::PeerId;
use std::collections::HashMap;

/// Characteristic whose attribute handle is remembered across power cycles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandleSlot {
    /// Private RFID credential characteristic
    Rfid,
    /// Immediate Alert level characteristic
    AlertLevel,
}

/// Non-volatile credential storage
///
/// The keyfob keeps exactly one peer relationship: storing a credential for
/// a new peer replaces the previous one. The default credential is only a
/// bootstrap for peers that have not been paired yet.
pub trait CredentialStore {
    /// Bootstrap peer address and key, if provisioned
    fn default_credential(&self) -> Option<(PeerId, MasterKey)>;

    /// Master key stored for a peer
    fn credential(&self, peer: PeerId) -> Option<MasterKey>;

    /// Peer the keyfob is currently paired with
    fn paired_peer(&self) -> Option<PeerId>;

    /// Store the master key for a peer, replacing any previous pairing
    fn set_credential(&mut self, peer: PeerId, key: &MasterKey) -> KeyfobResult<()>;

    /// Credential received during BLE bonding
    fn rfid_credential(&self) -> Option<RfidKey>;

    /// Store the credential received during BLE bonding
    fn set_rfid_credential(&mut self, key: &RfidKey) -> KeyfobResult<()>;

    /// Constant-time comparison of a value against the stored RFID credential
    fn equals_rfid_credential(&self, value: &[u8]) -> bool;

    /// Attribute handle assigned to a characteristic when the BLE module was programmed
    fn characteristic_handle(&self, slot: HandleSlot) -> Option<u16>;

    /// Remember an attribute handle
    fn set_characteristic_handle(&mut self, slot: HandleSlot, handle: u16) -> KeyfobResult<()>;
}

/// In-memory implementation of [`CredentialStore`]
#[derive(Debug, Default, Clone)]
pub struct MemoryCredentialStore {
    default: Option<(PeerId, MasterKey)>,
    paired: Option<(PeerId, MasterKey)>,
    rfid: Option<RfidKey>,
    handles: HashMap<HandleSlot, u16>,
}

impl MemoryCredentialStore {
    /// Create an empty store with no credentials at all
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store provisioned with a bootstrap credential
    pub fn with_default(peer: PeerId, key: MasterKey) -> Self {
        Self {
            default: Some((peer, key)),
            ..Self::default()
        }
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn default_credential(&self) -> Option<(PeerId, MasterKey)> {
        self.default.clone()
    }

    fn credential(&self, peer: PeerId) -> Option<MasterKey> {
        self.paired
            .as_ref()
            .filter(|(id, _)| *id == peer)
            .map(|(_, key)| key.clone())
    }

    fn paired_peer(&self) -> Option<PeerId> {
        self.paired.as_ref().map(|(id, _)| *id)
    }

    fn set_credential(&mut self, peer: PeerId, key: &MasterKey) -> KeyfobResult<()> {
        self.paired = Some((peer, key.clone()));
        Ok(())
    }

    fn rfid_credential(&self) -> Option<RfidKey> {
        self.rfid.clone()
    }

    fn set_rfid_credential(&mut self, key: &RfidKey) -> KeyfobResult<()> {
        self.rfid = Some(key.clone());
        Ok(())
    }

    fn equals_rfid_credential(&self, value: &[u8]) -> bool {
        self.rfid.as_ref().is_some_and(|key| key.matches(value))
    }

    fn characteristic_handle(&self, slot: HandleSlot) -> Option<u16> {
        self.handles.get(&slot).copied()
    }

    fn set_characteristic_handle(&mut self, slot: HandleSlot, handle: u16) -> KeyfobResult<()> {
        self.handles.insert(slot, handle);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MASTER_KEY_SIZE, RFID_KEY_SIZE};

    #[test]
    fn test_single_peer_relationship() {
        let mut store = MemoryCredentialStore::with_default(PeerId(1), MasterKey::new([1; MASTER_KEY_SIZE]));
        assert_eq!(store.paired_peer(), None);
        assert!(store.credential(PeerId(1)).is_none());

        store.set_credential(PeerId(7), &MasterKey::new([7; MASTER_KEY_SIZE])).unwrap();
        store.set_credential(PeerId(9), &MasterKey::new([9; MASTER_KEY_SIZE])).unwrap();

        assert_eq!(store.paired_peer(), Some(PeerId(9)));
        assert!(store.credential(PeerId(7)).is_none());
        assert_eq!(store.credential(PeerId(9)), Some(MasterKey::new([9; MASTER_KEY_SIZE])));
        // Bootstrap key is untouched by pairing
        assert_eq!(store.default_credential().map(|(id, _)| id), Some(PeerId(1)));
    }

    #[test]
    fn test_rfid_comparison() {
        let mut store = MemoryCredentialStore::new();
        assert!(!store.equals_rfid_credential(&[0; RFID_KEY_SIZE]));

        store.set_rfid_credential(&RfidKey::new([3; RFID_KEY_SIZE])).unwrap();
        assert!(store.equals_rfid_credential(&[3; RFID_KEY_SIZE]));
        assert!(!store.equals_rfid_credential(&[3; 4]));
    }

    #[test]
    fn test_handles() {
        let mut store = MemoryCredentialStore::new();
        assert_eq!(store.characteristic_handle(HandleSlot::Rfid), None);
        store.set_characteristic_handle(HandleSlot::Rfid, 0x0018).unwrap();
        assert_eq!(store.characteristic_handle(HandleSlot::Rfid), Some(0x0018));
        assert_eq!(store.characteristic_handle(HandleSlot::AlertLevel), None);
    }
}
