//! BLE bonding engine

use super::constants::*;
use super::messages::{credential_request, CredentialResponse};
use crate::error::{KeyfobError, KeyfobResult};
use crate::store::RfidKey;
use crate::transport::BleTransport;
use crate::types::{AuthOutcome, Millis};
use log::{debug, info, warn};

/// Bonding state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BondingState {
    /// No session
    Idle,
    /// Advertising for a central
    Advertising,
    /// Link layer waiting for passcode entry
    PasscodeRequested,
    /// Bond established, fetching the credential
    Bonded,
    /// Credential received
    CredentialExchanged,
}

/// Bonding configuration
#[derive(Debug, Clone)]
pub struct BondingConfig {
    /// How long to advertise for a central
    pub advertising_window_ms: Millis,
    /// How long the user has to enter the passcode
    pub passcode_window_ms: Millis,
    /// How long the central has to send the credential after bonding
    pub credential_timeout_ms: Millis,
}

impl Default for BondingConfig {
    fn default() -> Self {
        Self {
            advertising_window_ms: BONDING_ADVERTISING_WINDOW,
            passcode_window_ms: PASSCODE_ENTRY_WINDOW,
            credential_timeout_ms: CREDENTIAL_TIMEOUT,
        }
    }
}

/// Drives one BLE pairing session up to the credential exchange
///
/// Link events reach the engine through the `on_*` methods; `poll` turns
/// them into state transitions so every transition happens on the main loop.
#[derive(Debug)]
pub struct BondingEngine {
    config: BondingConfig,
    state: BondingState,
    phase_started_at: Millis,
    passcode_pending: bool,
    bonded_pending: bool,
    link_lost: bool,
    request_sent: bool,
    credential: Option<RfidKey>,
}

impl BondingEngine {
    /// Create an idle engine
    pub fn new(config: BondingConfig) -> Self {
        Self {
            config,
            state: BondingState::Idle,
            phase_started_at: 0,
            passcode_pending: false,
            bonded_pending: false,
            link_lost: false,
            request_sent: false,
            credential: None,
        }
    }

    /// Current state
    pub fn state(&self) -> BondingState {
        self.state
    }

    /// Abandon the session
    pub fn reset(&mut self) {
        self.state = BondingState::Idle;
        self.passcode_pending = false;
        self.bonded_pending = false;
        self.link_lost = false;
        self.request_sent = false;
        self.credential = None;
    }

    /// Start advertising for a central. Returns false when the module
    /// refuses, leaving the engine idle.
    pub fn start_pairing<B: BleTransport + ?Sized>(&mut self, ble: &mut B, now: Millis) -> bool {
        self.reset();

        if let Err(e) = ble.start_advertising(self.config.advertising_window_ms) {
            warn!("Cannot advertise for bonding: {}", e);
            return false;
        }

        info!("Advertising for a central to bond with");
        self.state = BondingState::Advertising;
        self.phase_started_at = now;
        true
    }

    /// The link layer asked for a passcode
    pub fn on_passcode_requested(&mut self) {
        if self.is_active() {
            self.passcode_pending = true;
        }
    }

    /// The link layer reported a completed bond
    pub fn on_bonded(&mut self) {
        if self.is_active() {
            self.bonded_pending = true;
        }
    }

    /// The central dropped the link
    pub fn on_link_down(&mut self) {
        if self.is_active() {
            self.link_lost = true;
        }
    }

    /// Advance the session
    pub fn poll<B: BleTransport + ?Sized>(&mut self, ble: &mut B, now: Millis) -> AuthOutcome {
        if self.link_lost && self.is_active() {
            info!("Link dropped during bonding");
            self.reset();
            return AuthOutcome::NoAuthentication;
        }

        match self.state {
            BondingState::Idle => AuthOutcome::NoAuthentication,
            BondingState::CredentialExchanged => AuthOutcome::Ok,
            BondingState::Advertising => {
                if self.bonded_pending {
                    self.enter_bonded(now);
                    AuthOutcome::Busy
                } else if self.passcode_pending {
                    self.passcode_pending = false;
                    self.state = BondingState::PasscodeRequested;
                    self.phase_started_at = now;
                    AuthOutcome::PasscodeRequested
                } else {
                    self.check_window(now, self.config.advertising_window_ms, "advertising")
                }
            }
            BondingState::PasscodeRequested => {
                if self.bonded_pending {
                    self.enter_bonded(now);
                    AuthOutcome::Busy
                } else {
                    self.check_window(now, self.config.passcode_window_ms, "passcode entry")
                }
            }
            BondingState::Bonded => self.poll_bonded(ble, now),
        }
    }

    /// Credential received from the central
    pub fn credential(&self) -> KeyfobResult<RfidKey> {
        match (self.state, self.credential.as_ref()) {
            (BondingState::CredentialExchanged, Some(key)) => Ok(key.clone()),
            _ => Err(KeyfobError::InvalidState),
        }
    }

    fn is_active(&self) -> bool {
        !matches!(self.state, BondingState::Idle | BondingState::CredentialExchanged)
    }

    fn enter_bonded(&mut self, now: Millis) {
        info!("Bonded with central");
        self.bonded_pending = false;
        self.passcode_pending = false;
        self.request_sent = false;
        self.state = BondingState::Bonded;
        self.phase_started_at = now;
    }

    fn check_window(&mut self, now: Millis, window: Millis, phase: &str) -> AuthOutcome {
        if now.saturating_sub(self.phase_started_at) > window {
            info!("Bonding timed out during {}", phase);
            self.reset();
            AuthOutcome::NoAuthentication
        } else {
            AuthOutcome::Busy
        }
    }

    fn poll_bonded<B: BleTransport + ?Sized>(&mut self, ble: &mut B, now: Millis) -> AuthOutcome {
        if now.saturating_sub(self.phase_started_at) > self.config.credential_timeout_ms {
            info!("Central did not provide a credential");
            self.reset();
            return AuthOutcome::NoAuthentication;
        }

        if !(ble.is_bonded() && ble.is_secured()) {
            debug!("Waiting for an encrypted link");
            return AuthOutcome::Busy;
        }

        if !self.request_sent {
            let central = ble.peer_address();
            if let Err(e) = ble.send(central, &credential_request()) {
                warn!("Credential request failed: {}", e);
                self.reset();
                return AuthOutcome::NoAuthentication;
            }
            self.request_sent = true;
            return AuthOutcome::Busy;
        }

        while let Some(datagram) = ble.receive() {
            match CredentialResponse::parse(&datagram.data) {
                Ok(response) => {
                    info!("Received RFID credential {}", response.key.fingerprint());
                    self.credential = Some(response.key);
                    self.state = BondingState::CredentialExchanged;
                    return AuthOutcome::Ok;
                }
                Err(e) => warn!("Ignoring data on bonding channel: {}", e),
            }
        }

        AuthOutcome::Busy
    }
}
