//! In-memory hardware for host tests and the simulator binary
//!
//! Every backend is a cheap handle onto shared state, so a test can hand one
//! clone to the keyfob and keep another to inject traffic and inspect what
//! the keyfob did.

mod ble;
mod board;
mod lock;
mod radio;

pub use self::ble::SimBle;
pub use self::board::SimBoard;
pub use self::lock::{LockEvent, SimLock};
pub use self::radio::{SimAir, SimRadio};
