//! Challenge/response wire messages
//!
//! Layouts (multi-byte integers little-endian):
//!
//! ```text
//! challenge: C1 | initiator | nonce[16] | len u16 | payload[len] | tag[32]
//! ack:       C2 | responder | initiator | nonce[16] | tag[32]
//! ```
//!
//! Each tag is HMAC-SHA-256 under the master key over every byte before it.

use super::constants::*;
use crate::crypto::{self, Nonce, NONCE_SIZE, TAG_SIZE};
use crate::error::{KeyfobError, KeyfobResult};
use crate::store::MasterKey;
use crate::types::PeerId;
use byteorder::{LittleEndian, ReadBytesExt};
use std::io::{Cursor, Read};

/// Authenticated command sent by the initiator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChallengeMessage {
    /// Address of the initiator
    pub initiator: PeerId,
    /// Session nonce
    pub nonce: Nonce,
    /// Command payload
    pub payload: Vec<u8>,
}

impl ChallengeMessage {
    /// Serialize and append the tag
    pub fn seal(&self, key: &MasterKey) -> KeyfobResult<Vec<u8>> {
        if self.payload.len() > MAX_PAYLOAD_SIZE {
            return Err(KeyfobError::PayloadTooLarge(self.payload.len()));
        }

        let mut packet = Vec::with_capacity(CHALLENGE_HEADER_SIZE + self.payload.len() + TAG_SIZE);
        packet.push(CHALLENGE_REQUEST);
        packet.push(self.initiator.value());
        packet.extend_from_slice(&self.nonce);
        packet.extend_from_slice(&(self.payload.len() as u16).to_le_bytes());
        packet.extend_from_slice(&self.payload);

        let tag = crypto::hmac_tag(key, &[packet.as_slice()])?;
        packet.extend_from_slice(&tag);
        Ok(packet)
    }

    /// Verify the tag and parse
    pub fn open(data: &[u8], key: &MasterKey) -> KeyfobResult<Self> {
        if data.first() != Some(&CHALLENGE_REQUEST) {
            return Err(KeyfobError::UnknownData("not a challenge".into()));
        }
        let body = authenticated_body(data, CHALLENGE_HEADER_SIZE + TAG_SIZE, key)?;

        let mut cursor = Cursor::new(body);
        let _opcode = cursor.read_u8().map_err(truncated)?;
        let initiator = PeerId(cursor.read_u8().map_err(truncated)?);
        let mut nonce = [0u8; NONCE_SIZE];
        cursor.read_exact(&mut nonce).map_err(truncated)?;
        let len = cursor.read_u16::<LittleEndian>().map_err(truncated)? as usize;

        if body.len() != CHALLENGE_HEADER_SIZE + len {
            return Err(KeyfobError::UnknownData(format!(
                "payload length {} does not match frame",
                len
            )));
        }
        if len > MAX_PAYLOAD_SIZE {
            return Err(KeyfobError::PayloadTooLarge(len));
        }

        let mut payload = vec![0u8; len];
        cursor.read_exact(&mut payload).map_err(truncated)?;

        Ok(Self {
            initiator,
            nonce,
            payload,
        })
    }
}

/// Acknowledgement sent by the responder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AckMessage {
    /// Address of the responder
    pub responder: PeerId,
    /// Address of the initiator being acknowledged
    pub initiator: PeerId,
    /// Nonce of the acknowledged challenge
    pub nonce: Nonce,
}

impl AckMessage {
    /// Serialize and append the tag
    pub fn seal(&self, key: &MasterKey) -> KeyfobResult<Vec<u8>> {
        let mut packet = Vec::with_capacity(ACK_SIZE);
        packet.push(CHALLENGE_ACK);
        packet.push(self.responder.value());
        packet.push(self.initiator.value());
        packet.extend_from_slice(&self.nonce);

        let tag = crypto::hmac_tag(key, &[packet.as_slice()])?;
        packet.extend_from_slice(&tag);
        Ok(packet)
    }

    /// Verify the tag and parse
    pub fn open(data: &[u8], key: &MasterKey) -> KeyfobResult<Self> {
        if data.first() != Some(&CHALLENGE_ACK) {
            return Err(KeyfobError::UnknownData("not an acknowledgement".into()));
        }
        if data.len() != ACK_SIZE {
            return Err(KeyfobError::UnknownData(format!(
                "acknowledgement is {} bytes, expected {}",
                data.len(),
                ACK_SIZE
            )));
        }
        let body = authenticated_body(data, ACK_SIZE, key)?;

        let mut nonce = [0u8; NONCE_SIZE];
        nonce.copy_from_slice(&body[3..3 + NONCE_SIZE]);

        Ok(Self {
            responder: PeerId(body[1]),
            initiator: PeerId(body[2]),
            nonce,
        })
    }
}

/// Split off and check the trailing tag, returning the covered bytes
fn authenticated_body<'a>(data: &'a [u8], min_len: usize, key: &MasterKey) -> KeyfobResult<&'a [u8]> {
    if data.len() < min_len {
        return Err(KeyfobError::UnknownData(format!("frame too short: {} bytes", data.len())));
    }
    let (body, tag) = data.split_at(data.len() - TAG_SIZE);
    if !crypto::verify_tag(key, &[body], tag) {
        return Err(KeyfobError::UnknownData("authentication tag mismatch".into()));
    }
    Ok(body)
}

fn truncated(_: std::io::Error) -> KeyfobError {
    KeyfobError::UnknownData("truncated frame".into())
}
