//! Keyfob - pairing and authentication core for a long-range radio keyfob
//!
//! This library implements the protocol side of a keyfob that unlocks a paired
//! lock controller over a point-to-point radio link, with a Bluetooth LE
//! channel used for credential provisioning. It includes an ECDH key exchange,
//! a nonce-based challenge/response initiator, a BLE bonding engine and the
//! wake-cycle orchestrator that drives them, all written against capability
//! traits so they can run on real drivers or on the in-memory simulation.

pub mod bonding;
pub mod challenge;
pub mod clock;
pub mod config;
pub mod crypto;
pub mod device;
pub mod ecdh;
pub mod error;
pub mod sim;
pub mod store;
pub mod transport;
pub mod types;
pub mod uuid;

// Re-export common types for convenience
pub use bonding::{BondingEngine, BondingState};
pub use challenge::{ChallengeInitiator, ChallengeResponder, ChallengeState};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::KeyfobConfig;
pub use device::{
    AlertState, Board, CycleReport, DeviceMode, Hardware, Keyfob, LoopStatus, SessionKind,
    SleepReason, WakeContext, WakeupSource,
};
pub use ecdh::{KeyExchange, KeyExchangeRole, KeyExchangeState};
pub use error::{KeyfobError, KeyfobResult};
pub use store::{CredentialStore, MasterKey, MemoryCredentialStore, RfidKey};
pub use transport::{BleEvent, BleTransport, Datagram, DatagramTransport, RadioTransport, TransportError};
pub use types::{AuthOutcome, Millis, PeerId};
pub use uuid::Uuid;
