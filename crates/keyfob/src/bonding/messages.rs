//! Credential exchange messages

use super::constants::*;
use crate::error::{KeyfobError, KeyfobResult};
use crate::store::{RfidKey, RFID_KEY_SIZE};

/// Request frame asking the central for the RFID credential
pub fn credential_request() -> [u8; 1] {
    [CREDENTIAL_REQUEST]
}

/// Central's answer carrying the RFID credential
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialResponse {
    /// Credential to store
    pub key: RfidKey,
}

impl CredentialResponse {
    /// Parse from raw packet
    pub fn parse(data: &[u8]) -> KeyfobResult<Self> {
        match data.first() {
            Some(&CREDENTIAL_RESPONSE) => {}
            Some(opcode) => {
                return Err(KeyfobError::UnknownData(format!(
                    "unexpected opcode 0x{:02X} on bonding channel",
                    opcode
                )))
            }
            None => return Err(KeyfobError::UnknownData("empty frame".into())),
        }

        Ok(Self {
            key: RfidKey::from_slice(&data[1..])?,
        })
    }

    /// Serialize to raw packet
    pub fn serialize(&self) -> Vec<u8> {
        let mut packet = Vec::with_capacity(1 + RFID_KEY_SIZE);

        packet.push(CREDENTIAL_RESPONSE);
        packet.extend_from_slice(self.key.as_bytes());

        packet
    }
}
