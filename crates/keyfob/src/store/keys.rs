//! Symmetric credentials held by the keyfob
//!
//! Both key types wipe themselves on drop and compare in constant time.
//! Their `Debug` output is a fingerprint, never the key bytes.

use crate::crypto;
use crate::error::{KeyfobError, KeyfobResult};
use std::fmt;
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Length of the radio master key in bytes
pub const MASTER_KEY_SIZE: usize = 16;

/// Length of the credential exchanged over BLE in bytes
pub const RFID_KEY_SIZE: usize = 10;

/// Long-lived key shared between the keyfob and its peer over the radio link
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct MasterKey([u8; MASTER_KEY_SIZE]);

impl MasterKey {
    /// Wrap raw key bytes
    pub fn new(bytes: [u8; MASTER_KEY_SIZE]) -> Self {
        Self(bytes)
    }

    /// Copy a key out of a buffer of exactly [`MASTER_KEY_SIZE`] bytes
    pub fn from_slice(bytes: &[u8]) -> KeyfobResult<Self> {
        let array: [u8; MASTER_KEY_SIZE] = bytes
            .try_into()
            .map_err(|_| KeyfobError::Store(format!("master key must be {} bytes", MASTER_KEY_SIZE)))?;
        Ok(Self(array))
    }

    /// Key bytes, for MAC computation only
    pub fn as_bytes(&self) -> &[u8; MASTER_KEY_SIZE] {
        &self.0
    }

    /// Short printable identifier of the key
    pub fn fingerprint(&self) -> String {
        crypto::fingerprint(&self.0)
    }
}

impl PartialEq for MasterKey {
    fn eq(&self, other: &Self) -> bool {
        self.0.as_slice().ct_eq(other.0.as_slice()).into()
    }
}

impl Eq for MasterKey {}

impl fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MasterKey({})", self.fingerprint())
    }
}

/// Credential the lock controller hands over during BLE bonding
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct RfidKey([u8; RFID_KEY_SIZE]);

impl RfidKey {
    /// Wrap raw credential bytes
    pub fn new(bytes: [u8; RFID_KEY_SIZE]) -> Self {
        Self(bytes)
    }

    /// Copy a credential out of a buffer of exactly [`RFID_KEY_SIZE`] bytes
    pub fn from_slice(bytes: &[u8]) -> KeyfobResult<Self> {
        let array: [u8; RFID_KEY_SIZE] = bytes.try_into().map_err(|_| {
            KeyfobError::UnknownData(format!(
                "RFID credential must be {} bytes, got {}",
                RFID_KEY_SIZE,
                bytes.len()
            ))
        })?;
        Ok(Self(array))
    }

    /// Credential bytes
    pub fn as_bytes(&self) -> &[u8; RFID_KEY_SIZE] {
        &self.0
    }

    /// Constant-time comparison against an arbitrary buffer
    pub fn matches(&self, value: &[u8]) -> bool {
        value.len() == RFID_KEY_SIZE && bool::from(self.0.as_slice().ct_eq(value))
    }

    /// Short printable identifier of the credential
    pub fn fingerprint(&self) -> String {
        crypto::fingerprint(&self.0)
    }
}

impl PartialEq for RfidKey {
    fn eq(&self, other: &Self) -> bool {
        self.0.as_slice().ct_eq(other.0.as_slice()).into()
    }
}

impl Eq for RfidKey {}

impl fmt::Debug for RfidKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RfidKey({})", self.fingerprint())
    }
}
