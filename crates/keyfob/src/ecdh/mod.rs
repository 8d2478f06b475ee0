//! Elliptic-curve key exchange
//!
//! This module bootstraps the long-lived master key shared with a newly met
//! peer over the radio link:
//! - Ephemeral P-256 key pairs, one per session
//! - Validation of the peer's public point before use
//! - One-way derivation of the master key from the shared secret
//!
//! The engine never writes persisted state. The orchestrator commits the
//! derived key and the learned peer address on success.

mod constants;
mod engine;
mod messages;

pub use self::constants::*;
pub use self::engine::{KeyExchange, KeyExchangeConfig, KeyExchangeRole, KeyExchangeState};
pub use self::messages::PublicKeyMessage;
