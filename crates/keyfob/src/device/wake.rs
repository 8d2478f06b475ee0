//! Wake context sampling

use super::board::Board;
use crate::transport::BleTransport;
use std::fmt;

/// Operating mode for this wake cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceMode {
    /// Charging cable present: pair with a new controller
    Pairing,
    /// Authenticate with the paired controller
    Normal,
}

/// What woke the device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WakeupSource {
    /// Nothing we recognize
    None,
    /// User pressed the button
    PushButton,
    /// A central holds a BLE connection
    BleConnection,
}

/// Mode and wake source, sampled once per wake cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WakeContext {
    pub mode: DeviceMode,
    pub source: WakeupSource,
}

impl WakeContext {
    /// Sample the inputs.
    ///
    /// Must run before the radios are touched: the button and the BLE
    /// connection state are only meaningful right after wake-up.
    pub fn sample<B, L>(board: &mut B, ble: &L) -> Self
    where
        B: Board + ?Sized,
        L: BleTransport + ?Sized,
    {
        let mode = if board.cable_present() {
            DeviceMode::Pairing
        } else {
            DeviceMode::Normal
        };

        let source = if board.button_pressed() {
            WakeupSource::PushButton
        } else if ble.is_connected() {
            WakeupSource::BleConnection
        } else {
            WakeupSource::None
        };

        Self { mode, source }
    }
}

impl fmt::Display for WakeContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} mode, woken by {:?}", self.mode, self.source)
    }
}
