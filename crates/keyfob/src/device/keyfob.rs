//! Wake cycle orchestrator

use super::alert::{Alert, AlertState};
use super::board::Board;
use super::profile::KeyfobProfile;
use super::wake::{DeviceMode, WakeContext, WakeupSource};
use super::watchdog::{ActivityTap, ActivityWatchdog};
use crate::bonding::{BondingEngine, BondingState};
use crate::challenge::ChallengeInitiator;
use crate::clock::Clock;
use crate::config::KeyfobConfig;
use crate::ecdh::KeyExchange;
use crate::error::{KeyfobError, KeyfobResult};
use crate::store::{CredentialStore, RFID_KEY_SIZE};
use crate::transport::{BleEvent, BleTransport, RadioTransport};
use crate::types::{AuthOutcome, Millis, PeerId};
use crate::uuid::Uuid;
use log::{debug, error, info, warn};
use std::fmt;
use zeroize::Zeroize;

/// Hardware the keyfob runs on
pub struct Hardware {
    /// Long-range radio to the lock controller
    pub radio: Box<dyn RadioTransport>,
    /// BLE module serving the GATT profile
    pub ble: Box<dyn BleTransport>,
    /// Non-volatile credentials
    pub store: Box<dyn CredentialStore>,
    /// Buttons, cable detect, buzzer and sleep control
    pub board: Box<dyn Board>,
    /// Millisecond time source
    pub clock: Box<dyn Clock>,
}

/// Whether the main loop should keep polling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopStatus {
    /// A session is active; keep calling `poll`
    Running,
    /// The device entered deep sleep; call `wake` on the next wake-up
    Asleep,
}

/// Why the device went to sleep
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SleepReason {
    /// Powered on rather than woken from standby
    ColdBoot,
    /// Setup could not start a session
    SetupFailed,
    /// Authentication or pairing did not succeed
    NoAuthentication,
    /// Unlock acknowledged and the linger window elapsed
    Authenticated,
    /// Radio key exchange committed
    Paired,
    /// BLE bonding committed
    Bonded,
    /// Alert tone sequence finished
    AlertFinished,
    /// No link activity within the connection timeout
    ConnectionTimeout,
    /// The central dropped the BLE link
    LinkDown,
    /// Nothing intelligible on the pairing channel
    UnknownProtocol,
}

impl fmt::Display for SleepReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            SleepReason::ColdBoot => "cold boot",
            SleepReason::SetupFailed => "setup failed",
            SleepReason::NoAuthentication => "no authentication",
            SleepReason::Authenticated => "authenticated",
            SleepReason::Paired => "paired",
            SleepReason::Bonded => "bonded",
            SleepReason::AlertFinished => "alert finished",
            SleepReason::ConnectionTimeout => "connection timeout",
            SleepReason::LinkDown => "link down",
            SleepReason::UnknownProtocol => "unknown protocol",
        };
        f.write_str(text)
    }
}

/// What happened during the current wake cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Sampled wake context
    pub wake: Option<WakeContext>,
    /// Error that aborted setup
    pub setup_error: Option<KeyfobError>,
    /// Unlock challenge acknowledged
    pub authenticated: bool,
    /// Peer committed by a radio key exchange
    pub paired_peer: Option<PeerId>,
    /// RFID credential committed by BLE bonding
    pub bonded: bool,
    /// Central presented the stored RFID credential
    pub rfid_verified: bool,
    /// Alert tone pulses played
    pub alert_pulses: u8,
    /// Why the cycle ended
    pub sleep_reason: Option<SleepReason>,
}

/// Kind of session currently running, for inspection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionKind {
    Idle,
    KeyExchange,
    Bonding,
    UnknownProtocol,
    Normal,
    Asleep,
}

/// Authentication session of a normal wake
#[derive(Debug)]
struct NormalSession {
    challenge: ChallengeInitiator,
    /// End of the post-authentication window, once acknowledged
    linger_until: Option<Millis>,
}

/// The session owns the engine it drives, so at most one exists at a time
enum Session {
    Idle,
    KeyExchange(KeyExchange),
    Bonding(BondingEngine),
    UnknownProtocol { since: Millis },
    Normal(NormalSession),
    Asleep,
}

enum Step {
    Stay,
    Enter(Session),
    Sleep(SleepReason),
}

/// Keyfob device: one instance per boot, one wake cycle at a time
pub struct Keyfob {
    config: KeyfobConfig,
    radio: Box<dyn RadioTransport>,
    ble: Box<dyn BleTransport>,
    store: Box<dyn CredentialStore>,
    board: Box<dyn Board>,
    clock: Box<dyn Clock>,
    profile: KeyfobProfile,
    session: Session,
    alert: Alert,
    watchdog: ActivityWatchdog,
    connected: bool,
    wake: Option<WakeContext>,
    report: CycleReport,
}

impl Keyfob {
    /// Create a keyfob on the given hardware
    pub fn new(config: KeyfobConfig, hardware: Hardware) -> Self {
        let alert = Alert::new(config.alert.clone());
        let watchdog = ActivityWatchdog::new(config.connection_timeout_ms);
        Self {
            config,
            radio: hardware.radio,
            ble: hardware.ble,
            store: hardware.store,
            board: hardware.board,
            clock: hardware.clock,
            profile: KeyfobProfile::new(),
            session: Session::Idle,
            alert,
            watchdog,
            connected: false,
            wake: None,
            report: CycleReport::default(),
        }
    }

    /// Active configuration
    pub fn config(&self) -> &KeyfobConfig {
        &self.config
    }

    /// Credential store
    pub fn store(&self) -> &dyn CredentialStore {
        self.store.as_ref()
    }

    /// Report of the current or last wake cycle
    pub fn report(&self) -> &CycleReport {
        &self.report
    }

    /// State of the immediate alert sequence
    pub fn alert_state(&self) -> AlertState {
        self.alert.state()
    }

    /// Kind of session currently running
    pub fn session_kind(&self) -> SessionKind {
        match self.session {
            Session::Idle => SessionKind::Idle,
            Session::KeyExchange(_) => SessionKind::KeyExchange,
            Session::Bonding(_) => SessionKind::Bonding,
            Session::UnknownProtocol { .. } => SessionKind::UnknownProtocol,
            Session::Normal(_) => SessionKind::Normal,
            Session::Asleep => SessionKind::Asleep,
        }
    }

    /// Whether the device is awake
    pub fn status(&self) -> LoopStatus {
        match self.session {
            Session::Asleep => LoopStatus::Asleep,
            _ => LoopStatus::Running,
        }
    }

    /// Sample the wake context and open a new cycle.
    ///
    /// Must be the first thing done after wake-up, before any radio or BLE
    /// traffic.
    pub fn sample_wake(&mut self) -> WakeContext {
        let wake = WakeContext::sample(self.board.as_mut(), self.ble.as_ref());
        info!("Woke up: {}", wake);

        self.wake = Some(wake);
        self.report = CycleReport {
            wake: Some(wake),
            ..CycleReport::default()
        };
        self.session = Session::Idle;
        self.alert.reset();
        self.connected = self.ble.is_connected();
        self.watchdog.feed(self.clock.now_ms());
        wake
    }

    /// Sample the wake context and set up the session. A failed setup puts
    /// the device straight back to sleep.
    pub fn wake(&mut self) -> LoopStatus {
        self.sample_wake();
        if let Err(e) = self.setup() {
            warn!("Setup failed: {}", e);
            self.report.setup_error = Some(e);
            self.sleep(SleepReason::SetupFailed);
        }
        self.status()
    }

    /// Select the operating mode and start its session
    pub fn setup(&mut self) -> KeyfobResult<()> {
        let wake = match self.wake {
            Some(wake) => wake,
            None => {
                warn!("Setup before sampling the wake context");
                self.sample_wake()
            }
        };

        if !self.board.woke_from_standby() {
            info!("Cold boot, going to sleep");
            self.sleep(SleepReason::ColdBoot);
            return Ok(());
        }

        self.radio.init()?;
        self.radio.set_own_address(self.config.own_address);

        let now = self.clock.now_ms();
        self.watchdog.feed(now);

        match wake.mode {
            DeviceMode::Pairing => self.setup_pairing(now),
            DeviceMode::Normal => self.setup_normal(wake.source, now),
        }
    }

    /// Run one main loop iteration
    pub fn poll(&mut self) -> LoopStatus {
        if matches!(self.session, Session::Asleep) {
            return LoopStatus::Asleep;
        }
        let now = self.clock.now_ms();

        if let Some(reason) = self.drain_ble_events(now) {
            self.sleep(reason);
            return LoopStatus::Asleep;
        }

        // A human entering the passcode is not an idle link
        let entering_passcode = matches!(
            &self.session,
            Session::Bonding(engine) if engine.state() == BondingState::PasscodeRequested
        );
        if entering_passcode {
            self.watchdog.feed(now);
        }

        if self.watchdog.expired(now) {
            if self.connected || self.ble.is_connected() {
                warn!("No activity for {} ms, dropping the connection", self.watchdog.idle_for(now));
                if let Err(e) = self.ble.disconnect(self.config.disconnect_timeout_ms) {
                    warn!("Disconnect failed: {}", e);
                }
                self.connected = false;
                self.sleep(SleepReason::ConnectionTimeout);
                return LoopStatus::Asleep;
            }
            self.watchdog.feed(now);
        }

        match self.step_session(now) {
            Step::Stay => {}
            Step::Enter(session) => self.session = session,
            Step::Sleep(reason) => {
                self.sleep(reason);
                return LoopStatus::Asleep;
            }
        }

        if matches!(self.session, Session::Normal(_)) {
            let state = self.alert.poll(
                now,
                self.ble.as_mut(),
                &self.profile.alert_level,
                self.board.as_mut(),
            );
            self.report.alert_pulses = self.alert.pulses();
            if state == AlertState::Stopped {
                self.sleep(SleepReason::AlertFinished);
                return LoopStatus::Asleep;
            }
        }

        LoopStatus::Running
    }

    fn setup_pairing(&mut self, now: Millis) -> KeyfobResult<()> {
        match self.init_ble_peripheral() {
            Ok(_) => {
                info!("Starting BLE pairing");
                self.ble.set_peer_address(self.config.bonding_peer);
                let mut bonding = BondingEngine::new(self.config.bonding.clone());
                if bonding.start_pairing(self.ble.as_mut(), now) {
                    self.session = Session::Bonding(bonding);
                    return Ok(());
                }
                warn!("BLE pairing did not start");
            }
            Err(e) => warn!("BLE unavailable for pairing: {}", e),
        }

        info!("Starting radio key exchange with {}", self.config.key_exchange_peer);
        self.radio.set_peer_address(self.config.key_exchange_peer);
        let mut exchange = KeyExchange::new(self.config.key_exchange.clone());
        exchange.start_pairing(self.radio.as_mut(), now)?;
        self.session = Session::KeyExchange(exchange);
        Ok(())
    }

    fn setup_normal(&mut self, source: WakeupSource, now: Millis) -> KeyfobResult<()> {
        match source {
            WakeupSource::None => {
                info!("No valid wakeup source");
                return Err(KeyfobError::NoWakeupSource);
            }
            WakeupSource::PushButton => info!("Woken by push button"),
            WakeupSource::BleConnection => {
                info!("Woken by BLE connection");
                let rfid_verified = self.init_ble_peripheral()?;
                if !rfid_verified && self.alert_requested() {
                    info!("Starting immediate alert");
                    self.alert.start();
                    self.session = Session::Normal(NormalSession {
                        challenge: ChallengeInitiator::new(self.config.challenge.clone()),
                        linger_until: None,
                    });
                    return Ok(());
                }
            }
        }

        self.start_authentication(now)
    }

    fn alert_requested(&mut self) -> bool {
        self.ble
            .read_local_characteristic(&self.profile.alert_level)
            .is_some_and(|value| self.alert.is_trigger(&value))
    }

    fn start_authentication(&mut self, now: Millis) -> KeyfobResult<()> {
        let peer = self
            .store
            .paired_peer()
            .or_else(|| self.store.default_credential().map(|(peer, _)| peer))
            .ok_or(KeyfobError::NoCredential(self.config.key_exchange_peer))?;

        info!("Authenticating with {}", peer);
        self.radio.set_peer_address(peer);
        let mut challenge = ChallengeInitiator::new(self.config.challenge.clone());
        challenge.send_message(
            &self.config.unlock_payload,
            peer,
            self.store.as_ref(),
            self.radio.as_mut(),
            now,
        )?;

        self.session = Session::Normal(NormalSession {
            challenge,
            linger_until: None,
        });
        Ok(())
    }

    /// Bring up the BLE module, programming it on first use. Returns whether
    /// the RFID characteristic held the stored credential.
    fn init_ble_peripheral(&mut self) -> KeyfobResult<bool> {
        let started = self.clock.now_ms();
        self.ble.init()?;
        self.profile.restore_handles(self.store.as_ref());

        let rfid_verified = match self.ble.read_local_characteristic(&self.profile.rfid) {
            None => {
                info!("BLE module not configured, programming it");
                self.ble
                    .program_peripheral(&self.profile.characteristics(), &self.config.device_name)?;
                self.profile.assign_handles(self.ble.as_ref(), self.store.as_mut())?;
                false
            }
            Some(mut value) => self.verify_rfid_key(&mut value),
        };

        self.ble.begin_peripheral(&self.profile.characteristics())?;
        debug!("BLE setup took {} ms", self.clock.now_ms().saturating_sub(started));
        Ok(rfid_verified)
    }

    /// Compare a characteristic value against the stored RFID credential.
    /// The value is wiped either way; on a match the characteristic is too.
    fn verify_rfid_key(&mut self, value: &mut Vec<u8>) -> bool {
        let matches = self.store.equals_rfid_credential(value);
        value.zeroize();
        if !matches {
            debug!("RFID characteristic does not hold the stored credential");
            return false;
        }

        let cleared = [0u8; RFID_KEY_SIZE];
        if let Err(e) = self.ble.write_local_characteristic(&self.profile.rfid, &cleared) {
            warn!("Cannot clear RFID characteristic: {}", e);
            return false;
        }

        info!("Correct RFID key received");
        self.report.rfid_verified = true;
        true
    }

    fn drain_ble_events(&mut self, now: Millis) -> Option<SleepReason> {
        while let Some(event) = self.ble.poll_event() {
            self.watchdog.feed(now);
            match event {
                BleEvent::PasscodeWanted => match &mut self.session {
                    Session::Bonding(engine) => engine.on_passcode_requested(),
                    _ => debug!("Passcode request outside of bonding"),
                },
                BleEvent::ConnectionUp => {
                    info!("Connection up");
                    self.connected = true;
                }
                BleEvent::ConnectionDown => {
                    info!("Connection down");
                    self.connected = false;
                    if let Session::Bonding(engine) = &mut self.session {
                        engine.on_link_down();
                    }
                    return Some(SleepReason::LinkDown);
                }
                BleEvent::BondingBonded => match &mut self.session {
                    Session::Bonding(engine) => engine.on_bonded(),
                    _ => debug!("Bonded outside of a bonding session"),
                },
                BleEvent::CharacteristicWritten { uuid, value } => {
                    self.characteristic_written(uuid, value)
                }
            }
        }
        None
    }

    fn characteristic_written(&mut self, uuid: Uuid, mut value: Vec<u8>) {
        if uuid == self.profile.alert_level.uuid {
            self.alert.on_level_written(&value);
        } else if uuid == self.profile.rfid.uuid {
            if self.ble.is_bonded() && self.ble.is_secured() {
                self.verify_rfid_key(&mut value);
            } else {
                warn!("Rejected RFID write on an unsecured link");
                value.zeroize();
            }
        } else {
            debug!("Write to unknown characteristic {}", uuid);
        }
    }

    fn step_session(&mut self, now: Millis) -> Step {
        let mut session = std::mem::replace(&mut self.session, Session::Idle);
        let step = match &mut session {
            Session::KeyExchange(engine) => self.step_key_exchange(engine, now),
            Session::Bonding(engine) => self.step_bonding(engine, now),
            Session::UnknownProtocol { since } => self.step_unknown_protocol(*since, now),
            Session::Normal(normal) => self.step_normal(normal, now),
            Session::Idle | Session::Asleep => Step::Stay,
        };
        self.session = session;
        step
    }

    fn step_key_exchange(&mut self, engine: &mut KeyExchange, now: Millis) -> Step {
        let mut radio = ActivityTap::new(self.radio.as_mut());
        let outcome = engine.poll(&mut radio, now);
        if radio.received() {
            self.watchdog.feed(now);
        }

        match outcome {
            AuthOutcome::Ok => {
                self.watchdog.feed(now);
                match (engine.remote_id(), engine.master_key()) {
                    (Ok(peer), Ok(key)) => match self.store.set_credential(peer, key) {
                        Ok(()) => {
                            info!("Paired with {} using key {}", peer, key.fingerprint());
                            self.report.paired_peer = Some(peer);
                        }
                        Err(e) => error!("Cannot store credential for {}: {}", peer, e),
                    },
                    _ => error!("Key exchange finished without a key"),
                }
                engine.reset();
                Step::Sleep(SleepReason::Paired)
            }
            AuthOutcome::UnknownData => {
                info!("Unknown data on the pairing channel");
                engine.reset();
                Step::Enter(Session::UnknownProtocol { since: now })
            }
            AuthOutcome::NoAuthentication => Step::Sleep(SleepReason::NoAuthentication),
            _ => Step::Stay,
        }
    }

    fn step_bonding(&mut self, engine: &mut BondingEngine, now: Millis) -> Step {
        let mut ble = ActivityTap::new(self.ble.as_mut());
        let outcome = engine.poll(&mut ble, now);
        if ble.received() {
            self.watchdog.feed(now);
        }

        match outcome {
            AuthOutcome::Ok => {
                self.watchdog.feed(now);
                if let Err(e) = self.ble.disconnect(self.config.disconnect_timeout_ms) {
                    warn!("Disconnect after bonding failed: {}", e);
                }
                self.connected = false;

                match self.store_bonding_credential(engine) {
                    Ok(()) => self.report.bonded = true,
                    Err(e) => error!("Cannot store RFID credential: {}", e),
                }
                engine.reset();
                Step::Sleep(SleepReason::Bonded)
            }
            AuthOutcome::PasscodeRequested => {
                info!("Passcode entry requested");
                self.watchdog.feed(now);
                self.board.request_passcode_entry();
                Step::Stay
            }
            AuthOutcome::NoAuthentication => Step::Sleep(SleepReason::NoAuthentication),
            _ => Step::Stay,
        }
    }

    fn store_bonding_credential(&mut self, engine: &BondingEngine) -> KeyfobResult<()> {
        let credential = engine.credential()?;
        self.ble.begin_peripheral(&self.profile.characteristics())?;
        self.store.set_rfid_credential(&credential)
    }

    fn step_unknown_protocol(&mut self, since: Millis, now: Millis) -> Step {
        while let Some(datagram) = self.radio.receive() {
            self.watchdog.feed(now);
            debug!(
                "Unidentified frame 0x{:02X} from {}: {}",
                datagram.opcode().unwrap_or_default(),
                datagram.from,
                hex::encode(&datagram.data)
            );
        }

        if now.saturating_sub(since) > self.config.unknown_protocol_timeout_ms {
            Step::Sleep(SleepReason::UnknownProtocol)
        } else {
            Step::Stay
        }
    }

    fn step_normal(&mut self, normal: &mut NormalSession, now: Millis) -> Step {
        let mut radio = ActivityTap::new(self.radio.as_mut());
        let outcome = normal.challenge.poll(&mut radio, now);
        if radio.received() {
            self.watchdog.feed(now);
        }

        match outcome {
            AuthOutcome::InitiatorOk => {
                info!("Unlock acknowledged");
                self.watchdog.feed(now);
                self.report.authenticated = true;
                normal.challenge.reset();
                normal.linger_until = Some(now + self.config.post_auth_linger_ms);
                Step::Stay
            }
            AuthOutcome::NoAuthentication => {
                let lingering = normal.linger_until.is_some_and(|until| now < until);
                if self.alert.is_active() || lingering {
                    Step::Stay
                } else if normal.linger_until.is_some() {
                    Step::Sleep(SleepReason::Authenticated)
                } else {
                    Step::Sleep(SleepReason::NoAuthentication)
                }
            }
            _ => Step::Stay,
        }
    }

    /// Tear the session down and enter deep sleep.
    ///
    /// The BLE module is left advertising so a central can wake the device.
    fn sleep(&mut self, reason: SleepReason) {
        info!("Going to sleep: {}", reason);

        match std::mem::replace(&mut self.session, Session::Asleep) {
            Session::KeyExchange(mut engine) => engine.reset(),
            Session::Bonding(mut engine) => engine.reset(),
            Session::Normal(mut normal) => normal.challenge.reset(),
            _ => {}
        }
        self.alert.reset();

        if self.ble.is_initialized() {
            if self.ble.is_connected() {
                if let Err(e) = self.ble.disconnect(self.config.disconnect_timeout_ms) {
                    warn!("Disconnect before sleep failed: {}", e);
                }
            }
            if let Err(e) = self.ble.start_advertising(self.config.advertising_timeout_ms) {
                warn!("Cannot restart advertising: {}", e);
            }
            self.ble.sleep();
        }
        self.connected = false;

        self.radio.sleep();
        self.board.enter_deep_sleep();
        self.report.sleep_reason = Some(reason);
    }
}
