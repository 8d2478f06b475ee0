//! Key exchange wire messages

use super::constants::*;
use crate::error::{KeyfobError, KeyfobResult};
use p256::elliptic_curve::sec1::ToEncodedPoint;
use p256::PublicKey;

/// Public key packet: opcode followed by an uncompressed SEC1 point
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicKeyMessage {
    /// Encoded point
    pub point: [u8; PUBLIC_KEY_SIZE],
}

impl PublicKeyMessage {
    /// Encode a public key
    pub fn from_public_key(key: &PublicKey) -> Self {
        let encoded = key.to_encoded_point(false);
        let mut point = [0u8; PUBLIC_KEY_SIZE];
        point.copy_from_slice(encoded.as_bytes());
        Self { point }
    }

    /// Parse from raw packet
    ///
    /// Anything that is not a public key packet is [`KeyfobError::UnknownData`];
    /// a public key packet of the wrong shape is [`KeyfobError::MalformedPeerKey`].
    pub fn parse(data: &[u8]) -> KeyfobResult<Self> {
        match data.first() {
            Some(&ECDH_PUBLIC_KEY) => {}
            Some(opcode) => {
                return Err(KeyfobError::UnknownData(format!(
                    "unexpected opcode 0x{:02X} during key exchange",
                    opcode
                )))
            }
            None => return Err(KeyfobError::UnknownData("empty frame".into())),
        }

        if data.len() != PUBLIC_KEY_MESSAGE_SIZE {
            return Err(KeyfobError::MalformedPeerKey(format!(
                "public key packet is {} bytes, expected {}",
                data.len(),
                PUBLIC_KEY_MESSAGE_SIZE
            )));
        }
        if data[1] != SEC1_UNCOMPRESSED_TAG {
            return Err(KeyfobError::MalformedPeerKey(format!(
                "point encoding tag 0x{:02X} is not uncompressed",
                data[1]
            )));
        }

        let mut point = [0u8; PUBLIC_KEY_SIZE];
        point.copy_from_slice(&data[1..]);
        Ok(Self { point })
    }

    /// Serialize to raw packet
    pub fn serialize(&self) -> Vec<u8> {
        let mut packet = Vec::with_capacity(PUBLIC_KEY_MESSAGE_SIZE);

        packet.push(ECDH_PUBLIC_KEY);
        packet.extend_from_slice(&self.point);

        packet
    }

    /// Decode the point, rejecting anything that is not on the curve
    pub fn public_key(&self) -> KeyfobResult<PublicKey> {
        PublicKey::from_sec1_bytes(&self.point)
            .map_err(|_| KeyfobError::MalformedPeerKey("point is not on the curve".into()))
    }
}
