//! Simulated BLE module

use crate::transport::{
    BleEvent, BleTransport, Datagram, DatagramTransport, LocalCharacteristic, TransportError,
    TransportResult,
};
use crate::types::{Millis, PeerId};
use crate::uuid::Uuid;
use log::trace;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// First attribute handle handed out when the module is programmed
const FIRST_HANDLE: u16 = 0x0010;

#[derive(Debug, Default)]
struct BleState {
    initialized: bool,
    connected: bool,
    bonded: bool,
    secured: bool,
    advertising: bool,
    asleep: bool,
    programmed: bool,
    begun: bool,
    fail_init: bool,
    fail_advertising: bool,
    device_name: String,
    values: HashMap<Uuid, Vec<u8>>,
    handles: HashMap<Uuid, u16>,
    events: VecDeque<BleEvent>,
    inbox: VecDeque<Datagram>,
    sent: Vec<(PeerId, Vec<u8>)>,
    own: PeerId,
    peer: PeerId,
    advertise_starts: usize,
    disconnects: usize,
}

/// BLE module backed by shared in-memory state
///
/// Test-side methods play the role of the remote central: connecting,
/// bonding, writing characteristics and talking on the data channel.
#[derive(Debug, Clone, Default)]
pub struct SimBle {
    state: Arc<Mutex<BleState>>,
}

impl SimBle {
    /// Unprogrammed module with no central around
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, BleState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make initialization fail
    pub fn set_fail_init(&self, fail: bool) {
        self.lock().fail_init = fail;
    }

    /// Make advertising requests fail
    pub fn set_fail_advertising(&self, fail: bool) {
        self.lock().fail_advertising = fail;
    }

    /// Mark the module as already programmed with the given values
    pub fn preprogram(&self, characteristics: &[(Uuid, Vec<u8>)]) {
        let mut state = self.lock();
        state.programmed = true;
        let mut handle = FIRST_HANDLE;
        for (uuid, value) in characteristics {
            state.values.insert(*uuid, value.clone());
            state.handles.insert(*uuid, handle);
            handle += 2;
        }
    }

    /// Link state set directly, as found after a wake from standby
    pub fn set_link(&self, connected: bool, bonded: bool) {
        let mut state = self.lock();
        state.connected = connected;
        state.bonded = bonded;
        state.secured = bonded;
    }

    /// A central connects
    pub fn connect(&self) {
        let mut state = self.lock();
        state.connected = true;
        state.events.push_back(BleEvent::ConnectionUp);
    }

    /// The central drops the link
    pub fn drop_link(&self) {
        let mut state = self.lock();
        state.connected = false;
        state.bonded = false;
        state.secured = false;
        state.events.push_back(BleEvent::ConnectionDown);
    }

    /// The link layer asks for a passcode
    pub fn request_passcode(&self) {
        self.lock().events.push_back(BleEvent::PasscodeWanted);
    }

    /// Bonding completes and the link becomes encrypted
    pub fn bond(&self) {
        let mut state = self.lock();
        state.bonded = true;
        state.secured = true;
        state.events.push_back(BleEvent::BondingBonded);
    }

    /// The central writes a local characteristic
    pub fn central_write(&self, uuid: Uuid, value: &[u8]) {
        let mut state = self.lock();
        state.values.insert(uuid, value.to_vec());
        state.events.push_back(BleEvent::CharacteristicWritten {
            uuid,
            value: value.to_vec(),
        });
    }

    /// The central sends a frame on the data channel
    pub fn central_send(&self, from: PeerId, data: &[u8]) {
        self.lock().inbox.push_back(Datagram::new(from, data.to_vec()));
    }

    /// Take every frame the keyfob sent on the data channel
    pub fn take_sent(&self) -> Vec<(PeerId, Vec<u8>)> {
        std::mem::take(&mut self.lock().sent)
    }

    /// Current value of a local characteristic
    pub fn characteristic(&self, uuid: &Uuid) -> Option<Vec<u8>> {
        self.lock().values.get(uuid).cloned()
    }

    /// Whether the module holds a GATT profile
    pub fn is_programmed(&self) -> bool {
        self.lock().programmed
    }

    /// Whether the peripheral was started since programming
    pub fn is_begun(&self) -> bool {
        self.lock().begun
    }

    /// Device name written when the module was programmed
    pub fn device_name(&self) -> String {
        self.lock().device_name.clone()
    }

    /// Whether the module is advertising
    pub fn is_advertising(&self) -> bool {
        self.lock().advertising
    }

    /// Whether the module was put to sleep
    pub fn is_asleep(&self) -> bool {
        self.lock().asleep
    }

    /// Number of advertising requests accepted
    pub fn advertise_starts(&self) -> usize {
        self.lock().advertise_starts
    }

    /// Number of disconnects issued by the keyfob
    pub fn disconnects(&self) -> usize {
        self.lock().disconnects
    }
}

impl DatagramTransport for SimBle {
    fn send(&mut self, to: PeerId, data: &[u8]) -> TransportResult<()> {
        let mut state = self.lock();
        if !state.connected {
            return Err(TransportError::NotConnected);
        }
        trace!("BLE data -> {}: {}", to, hex::encode(data));
        state.sent.push((to, data.to_vec()));
        Ok(())
    }

    fn receive(&mut self) -> Option<Datagram> {
        self.lock().inbox.pop_front()
    }

    fn set_own_address(&mut self, id: PeerId) {
        self.lock().own = id;
    }

    fn set_peer_address(&mut self, id: PeerId) {
        self.lock().peer = id;
    }

    fn own_address(&self) -> PeerId {
        self.lock().own
    }

    fn peer_address(&self) -> PeerId {
        self.lock().peer
    }
}

impl BleTransport for SimBle {
    fn init(&mut self) -> TransportResult<()> {
        let mut state = self.lock();
        if state.fail_init {
            return Err(TransportError::Unavailable("module did not answer".into()));
        }
        state.initialized = true;
        state.asleep = false;
        Ok(())
    }

    fn is_initialized(&self) -> bool {
        self.lock().initialized
    }

    fn is_connected(&self) -> bool {
        self.lock().connected
    }

    fn is_bonded(&self) -> bool {
        self.lock().bonded
    }

    fn is_secured(&self) -> bool {
        self.lock().secured
    }

    fn start_advertising(&mut self, timeout_ms: Millis) -> TransportResult<()> {
        let mut state = self.lock();
        if state.fail_advertising {
            return Err(TransportError::Rejected("advertising refused".into()));
        }
        trace!("Advertising for {} ms", timeout_ms);
        state.advertising = true;
        state.advertise_starts += 1;
        Ok(())
    }

    fn disconnect(&mut self, _timeout_ms: Millis) -> TransportResult<()> {
        let mut state = self.lock();
        if state.connected {
            state.connected = false;
            state.bonded = false;
            state.secured = false;
            state.disconnects += 1;
        }
        Ok(())
    }

    fn sleep(&mut self) {
        self.lock().asleep = true;
    }

    fn program_peripheral(
        &mut self,
        characteristics: &[LocalCharacteristic],
        device_name: &str,
    ) -> TransportResult<()> {
        let mut state = self.lock();
        if !state.initialized {
            return Err(TransportError::Unavailable("module not initialized".into()));
        }

        state.values.clear();
        state.handles.clear();
        let mut handle = FIRST_HANDLE;
        for characteristic in characteristics {
            state.values.insert(characteristic.uuid, vec![0; characteristic.max_len]);
            state.handles.insert(characteristic.uuid, handle);
            handle += 2;
        }
        state.device_name = device_name.to_string();
        state.programmed = true;
        state.begun = false;
        Ok(())
    }

    fn local_handle(&self, uuid: &Uuid) -> Option<u16> {
        self.lock().handles.get(uuid).copied()
    }

    fn begin_peripheral(&mut self, characteristics: &[LocalCharacteristic]) -> TransportResult<()> {
        let mut state = self.lock();
        if !state.programmed {
            return Err(TransportError::Rejected("module not programmed".into()));
        }
        if let Some(missing) = characteristics.iter().find(|c| !state.handles.contains_key(&c.uuid)) {
            return Err(TransportError::Rejected(format!("no attribute for {}", missing.uuid)));
        }
        state.begun = true;
        Ok(())
    }

    fn read_local_characteristic(&mut self, characteristic: &LocalCharacteristic) -> Option<Vec<u8>> {
        let state = self.lock();
        if !state.programmed {
            return None;
        }
        state.values.get(&characteristic.uuid).cloned()
    }

    fn write_local_characteristic(
        &mut self,
        characteristic: &LocalCharacteristic,
        value: &[u8],
    ) -> TransportResult<()> {
        let mut state = self.lock();
        if !state.handles.contains_key(&characteristic.uuid) {
            return Err(TransportError::Rejected(format!("no attribute for {}", characteristic.uuid)));
        }
        if value.len() > characteristic.max_len {
            return Err(TransportError::FrameTooLarge(value.len()));
        }
        state.values.insert(characteristic.uuid, value.to_vec());
        Ok(())
    }

    fn poll_event(&mut self) -> Option<BleEvent> {
        self.lock().events.pop_front()
    }
}
