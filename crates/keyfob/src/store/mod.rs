//! Credential storage
//!
//! Persistence itself is owned by the platform. This module defines the
//! credential types, the [`CredentialStore`] interface the orchestrator
//! writes through, and an in-memory implementation for tests and simulation.

mod credential_store;
mod keys;

pub use self::credential_store::{CredentialStore, HandleSlot, MemoryCredentialStore};
pub use self::keys::{MasterKey, RfidKey, MASTER_KEY_SIZE, RFID_KEY_SIZE};
