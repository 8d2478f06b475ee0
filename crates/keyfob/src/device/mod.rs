//! Device orchestration
//!
//! This module ties the protocol engines to the hardware for one wake
//! cycle. It implements:
//! - Wake source and operating mode sampling
//! - Mode selection between BLE bonding, radio key exchange and
//!   authentication
//! - BLE peripheral provisioning and RFID credential verification
//! - The immediate alert tone sequence
//! - The connection inactivity watchdog
//! - Orderly shutdown into deep sleep

mod alert;
mod board;
mod keyfob;
mod profile;
mod wake;
mod watchdog;

pub use self::alert::{Alert, AlertConfig, AlertState};
pub use self::board::Board;
pub use self::keyfob::{CycleReport, Hardware, Keyfob, LoopStatus, SessionKind, SleepReason};
pub use self::profile::{
    KeyfobProfile, ALERT_LEVEL_UUID, IMMEDIATE_ALERT_SERVICE_UUID, RFID_CHARACTERISTIC_UUID,
    RFID_SERVICE_UUID,
};
pub use self::wake::{DeviceMode, WakeContext, WakeupSource};
pub use self::watchdog::{ActivityTap, ActivityWatchdog};
