//! Board-level signals and actuators

use crate::types::Millis;

/// GPIO inputs and outputs of the keyfob board
pub trait Board {
    /// Whether the last reset was a wake from standby rather than power-on
    fn woke_from_standby(&mut self) -> bool;

    /// Whether the charging cable is plugged in
    fn cable_present(&mut self) -> bool;

    /// Whether the push button is held
    fn button_pressed(&mut self) -> bool;

    /// Play a tone on the buzzer
    fn tone(&mut self, frequency_hz: u32, duration_ms: Millis);

    /// Prompt the user to enter the BLE passcode
    fn request_passcode_entry(&mut self);

    /// Enter the lowest power state; wake sources are armed by the board
    fn enter_deep_sleep(&mut self);
}
