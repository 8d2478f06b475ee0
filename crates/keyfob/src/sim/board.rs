//! Simulated board signals and actuators

use crate::device::Board;
use crate::types::Millis;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug)]
struct BoardState {
    woke_from_standby: bool,
    cable_present: bool,
    button_pressed: bool,
    tones: Vec<(u32, Millis)>,
    passcode_prompts: usize,
    deep_sleeps: usize,
}

/// Board with settable inputs and recorded outputs
#[derive(Debug, Clone)]
pub struct SimBoard {
    state: Arc<Mutex<BoardState>>,
}

impl Default for SimBoard {
    fn default() -> Self {
        Self::new()
    }
}

impl SimBoard {
    /// Board that woke from standby with no input asserted
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(BoardState {
                woke_from_standby: true,
                cable_present: false,
                button_pressed: false,
                tones: Vec::new(),
                passcode_prompts: 0,
                deep_sleeps: 0,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BoardState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Simulate power-on instead of a wake from standby
    pub fn set_cold_boot(&self, cold: bool) {
        self.lock().woke_from_standby = !cold;
    }

    /// Plug or unplug the charging cable
    pub fn set_cable_present(&self, present: bool) {
        self.lock().cable_present = present;
    }

    /// Hold or release the push button
    pub fn set_button_pressed(&self, pressed: bool) {
        self.lock().button_pressed = pressed;
    }

    /// Tones played so far as (frequency, duration)
    pub fn tones(&self) -> Vec<(u32, Millis)> {
        self.lock().tones.clone()
    }

    /// Number of passcode entry prompts
    pub fn passcode_prompts(&self) -> usize {
        self.lock().passcode_prompts
    }

    /// Number of times deep sleep was entered
    pub fn deep_sleeps(&self) -> usize {
        self.lock().deep_sleeps
    }
}

impl Board for SimBoard {
    fn woke_from_standby(&mut self) -> bool {
        self.lock().woke_from_standby
    }

    fn cable_present(&mut self) -> bool {
        self.lock().cable_present
    }

    fn button_pressed(&mut self) -> bool {
        self.lock().button_pressed
    }

    fn tone(&mut self, frequency_hz: u32, duration_ms: Millis) {
        self.lock().tones.push((frequency_hz, duration_ms));
    }

    fn request_passcode_entry(&mut self) {
        self.lock().passcode_prompts += 1;
    }

    fn enter_deep_sleep(&mut self) {
        let mut state = self.lock();
        state.deep_sleeps += 1;
        // The next wake is always from standby
        state.woke_from_standby = true;
    }
}
