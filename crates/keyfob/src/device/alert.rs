//! Immediate alert tone sequence
//!
//! A central writes the alert level characteristic to make the keyfob beep
//! so it can be found. The level is acknowledged by clearing the
//! characteristic, then a fixed number of tone pulses plays.

use super::board::Board;
use crate::transport::{BleTransport, LocalCharacteristic};
use crate::types::Millis;
use log::{debug, info, warn};

/// Alert level value that starts the tone sequence
pub const ALERT_TRIGGER_VALUE: u8 = 0x02;
/// Alert level value that stops it
pub const ALERT_OFF_VALUE: u8 = 0x00;

/// Time between the starts of two pulses
pub const ALERT_PULSE_PERIOD: Millis = 1_000;
/// Buzzer on-time per pulse
pub const ALERT_PULSE_LENGTH: Millis = 300;
/// Buzzer frequency in Hz
pub const ALERT_TONE_FREQUENCY: u32 = 4_000;
/// Pulses played before the sequence stops
pub const ALERT_PULSE_COUNT: u8 = 5;

/// Alert sequence state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertState {
    /// No alert requested
    Idle,
    /// Requested, characteristic not yet cleared
    Start,
    /// Tone pulses playing
    Running,
    /// Sequence over; the device should sleep
    Stopped,
}

/// Tone sequence parameters
#[derive(Debug, Clone)]
pub struct AlertConfig {
    /// Alert level value that starts the sequence
    pub trigger_value: u8,
    /// Time between the starts of two pulses
    pub pulse_period_ms: Millis,
    /// Length of one pulse
    pub pulse_length_ms: Millis,
    /// Buzzer frequency
    pub tone_frequency_hz: u32,
    /// Pulses per alert
    pub pulse_count: u8,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            trigger_value: ALERT_TRIGGER_VALUE,
            pulse_period_ms: ALERT_PULSE_PERIOD,
            pulse_length_ms: ALERT_PULSE_LENGTH,
            tone_frequency_hz: ALERT_TONE_FREQUENCY,
            pulse_count: ALERT_PULSE_COUNT,
        }
    }
}

/// Immediate alert controller
#[derive(Debug, Clone)]
pub struct Alert {
    config: AlertConfig,
    state: AlertState,
    pulses: u8,
    last_pulse_at: Option<Millis>,
}

impl Alert {
    pub fn new(config: AlertConfig) -> Self {
        Self {
            config,
            state: AlertState::Idle,
            pulses: 0,
            last_pulse_at: None,
        }
    }

    pub fn state(&self) -> AlertState {
        self.state
    }

    /// Pulses played in the current sequence
    pub fn pulses(&self) -> u8 {
        self.pulses
    }

    /// Whether a sequence is requested or playing
    pub fn is_active(&self) -> bool {
        matches!(self.state, AlertState::Start | AlertState::Running)
    }

    /// Whether `value` is the level that starts a sequence
    pub fn is_trigger(&self, value: &[u8]) -> bool {
        value.len() == 1 && value[0] == self.config.trigger_value
    }

    /// Request a new sequence
    pub fn start(&mut self) {
        self.state = AlertState::Start;
        self.pulses = 0;
        self.last_pulse_at = None;
    }

    pub fn reset(&mut self) {
        self.state = AlertState::Idle;
        self.pulses = 0;
        self.last_pulse_at = None;
    }

    /// React to a central writing the alert level
    pub fn on_level_written(&mut self, value: &[u8]) {
        match value {
            [ALERT_OFF_VALUE] => {
                info!("Alert stopped by central");
                self.state = AlertState::Stopped;
            }
            _ if self.is_trigger(value) => {
                info!("Immediate alert requested");
                self.start();
            }
            _ => debug!("Ignoring alert level {}", hex::encode(value)),
        }
    }

    /// Advance the sequence
    pub fn poll<L, B>(
        &mut self,
        now: Millis,
        ble: &mut L,
        characteristic: &LocalCharacteristic,
        board: &mut B,
    ) -> AlertState
    where
        L: BleTransport + ?Sized,
        B: Board + ?Sized,
    {
        if self.state == AlertState::Start {
            // Clearing the level acknowledges the request
            match ble.write_local_characteristic(characteristic, &[ALERT_OFF_VALUE]) {
                Ok(()) => self.state = AlertState::Running,
                Err(e) => {
                    warn!("Cannot clear alert level: {}", e);
                    return self.state;
                }
            }
        }

        if self.state == AlertState::Running {
            let due = self
                .last_pulse_at
                .map_or(true, |at| now >= at + self.config.pulse_period_ms);
            if due {
                if self.pulses >= self.config.pulse_count {
                    info!("Alert finished after {} pulses", self.pulses);
                    self.state = AlertState::Stopped;
                } else {
                    self.pulses += 1;
                    self.last_pulse_at = Some(now);
                    debug!("Alert pulse {}/{}", self.pulses, self.config.pulse_count);
                    board.tone(self.config.tone_frequency_hz, self.config.pulse_length_ms);
                }
            }
        }

        self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::profile::KeyfobProfile;
    use crate::sim::{SimBle, SimBoard};
    use crate::transport::BleTransport;

    fn programmed_module(profile: &KeyfobProfile) -> SimBle {
        let mut ble = SimBle::new();
        ble.init().unwrap();
        ble.program_peripheral(&profile.characteristics(), "test").unwrap();
        ble
    }

    #[test]
    fn test_pulses_then_stops() {
        let profile = KeyfobProfile::new();
        let mut ble = programmed_module(&profile);
        let mut board = SimBoard::new();
        let mut alert = Alert::new(AlertConfig::default());

        ble.central_write(profile.alert_level.uuid, &[ALERT_TRIGGER_VALUE]);
        alert.on_level_written(&[ALERT_TRIGGER_VALUE]);
        assert_eq!(alert.state(), AlertState::Start);

        let mut now = 0;
        while alert.poll(now, &mut ble, &profile.alert_level, &mut board) != AlertState::Stopped {
            now += 100;
            assert!(now < 60_000);
        }

        assert_eq!(board.tones().len(), ALERT_PULSE_COUNT as usize);
        assert_eq!(alert.pulses(), ALERT_PULSE_COUNT);
        assert_eq!(board.tones()[0], (ALERT_TONE_FREQUENCY, ALERT_PULSE_LENGTH));
        assert_eq!(ble.characteristic(&profile.alert_level.uuid), Some(vec![ALERT_OFF_VALUE]));
        assert_eq!(now, ALERT_PULSE_COUNT as Millis * ALERT_PULSE_PERIOD);
    }

    #[test]
    fn test_zero_level_stops() {
        let mut alert = Alert::new(AlertConfig::default());
        alert.start();
        alert.on_level_written(&[ALERT_OFF_VALUE]);
        assert_eq!(alert.state(), AlertState::Stopped);
        assert!(!alert.is_active());
    }

    #[test]
    fn test_other_levels_ignored() {
        let mut alert = Alert::new(AlertConfig::default());
        alert.on_level_written(&[0x01]);
        alert.on_level_written(&[]);
        assert_eq!(alert.state(), AlertState::Idle);
    }
}
