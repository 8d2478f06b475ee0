//! Cryptographic helpers shared by the protocol engines
//!
//! Key derivation for the ECDH exchange, HMAC tags for challenge/response
//! messages, nonce generation and key fingerprints for diagnostics.

use crate::error::{KeyfobError, KeyfobResult};
use crate::store::{MasterKey, MASTER_KEY_SIZE};
use hmac::{Hmac, Mac};
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};

/// Length of a challenge nonce in bytes
pub const NONCE_SIZE: usize = 16;

/// Length of an HMAC-SHA-256 tag in bytes
pub const TAG_SIZE: usize = 32;

/// Single-use random challenge value
pub type Nonce = [u8; NONCE_SIZE];

type HmacSha256 = Hmac<Sha256>;

/// Domain separation for the master key derivation
const MASTER_KEY_LABEL: &[u8] = b"keyfob master key v1";

/// Generate a fresh random nonce
pub fn generate_nonce() -> Nonce {
    let mut nonce = [0u8; NONCE_SIZE];
    OsRng.fill_bytes(&mut nonce);
    nonce
}

/// HMAC-SHA-256 over the concatenation of `parts`
pub fn hmac_tag(key: &MasterKey, parts: &[&[u8]]) -> KeyfobResult<[u8; TAG_SIZE]> {
    let mut mac = HmacSha256::new_from_slice(key.as_bytes())
        .map_err(|_| KeyfobError::InvalidState)?;
    for part in parts {
        mac.update(part);
    }

    let mut tag = [0u8; TAG_SIZE];
    tag.copy_from_slice(&mac.finalize().into_bytes());
    Ok(tag)
}

/// Constant-time check of a tag produced by [`hmac_tag`]
pub fn verify_tag(key: &MasterKey, parts: &[&[u8]], tag: &[u8]) -> bool {
    let Ok(mut mac) = HmacSha256::new_from_slice(key.as_bytes()) else {
        return false;
    };
    for part in parts {
        mac.update(part);
    }
    mac.verify_slice(tag).is_ok()
}

/// Derive the master key from an ECDH shared secret.
///
/// Both public encodings enter the hash in sorted order, so initiator and
/// responder compute the same key without agreeing on roles.
pub fn derive_master_key(shared_secret: &[u8], local_public: &[u8], peer_public: &[u8]) -> MasterKey {
    let (low, high) = if local_public <= peer_public {
        (local_public, peer_public)
    } else {
        (peer_public, local_public)
    };

    let mut hasher = Sha256::new();
    hasher.update(MASTER_KEY_LABEL);
    hasher.update(shared_secret);
    hasher.update(low);
    hasher.update(high);
    let digest = hasher.finalize();

    let mut key = [0u8; MASTER_KEY_SIZE];
    key.copy_from_slice(&digest[..MASTER_KEY_SIZE]);
    MasterKey::new(key)
}

/// First four bytes of the SHA-256 digest, hex encoded
pub fn fingerprint(secret: &[u8]) -> String {
    let digest = Sha256::digest(secret);
    hex::encode(&digest[..4])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derivation_ignores_role() {
        let shared = [0x42u8; 32];
        let a = [0x04u8, 1, 2, 3];
        let b = [0x04u8, 9, 8, 7];
        assert_eq!(
            derive_master_key(&shared, &a, &b),
            derive_master_key(&shared, &b, &a)
        );
        assert_ne!(
            derive_master_key(&shared, &a, &b),
            derive_master_key(&[0x43u8; 32], &a, &b)
        );
    }

    #[test]
    fn test_tag_verification() {
        let key = MasterKey::new([5; MASTER_KEY_SIZE]);
        let tag = hmac_tag(&key, &[b"abc".as_slice(), b"def".as_slice()]).unwrap();
        let body: &[u8] = b"abcdef";
        assert!(verify_tag(&key, &[body], &tag));
        assert!(!verify_tag(&key, &[b"abcdeg".as_slice()], &tag));
        assert!(!verify_tag(&MasterKey::new([6; MASTER_KEY_SIZE]), &[body], &tag));
        assert!(!verify_tag(&key, &[body], &tag[..16]));
    }

    #[test]
    fn test_nonces_differ() {
        assert_ne!(generate_nonce(), generate_nonce());
    }
}
