//! Simulated lock controller
//!
//! Plays the peer side of every protocol: key exchange responder,
//! challenge responder and the bonding central's credential handover.

use super::ble::SimBle;
use super::radio::SimRadio;
use crate::bonding::{credential_request, CredentialResponse};
use crate::challenge::ChallengeResponder;
use crate::ecdh::{KeyExchange, KeyExchangeConfig, KeyExchangeState};
use crate::store::{MasterKey, RfidKey};
use crate::transport::DatagramTransport;
use crate::types::{AuthOutcome, Millis, PeerId};
use log::{debug, info, warn};

/// Something the lock did in response to the keyfob
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockEvent {
    /// Key exchange completed with this keyfob
    Paired(PeerId),
    /// Authenticated command executed
    Unlocked(Vec<u8>),
}

/// Lock controller on the other end of the radio
pub struct SimLock {
    radio: SimRadio,
    key_exchange: KeyExchange,
    responder: ChallengeResponder,
    key: Option<MasterKey>,
    rfid: Option<RfidKey>,
    unlocks: Vec<Vec<u8>>,
}

impl SimLock {
    /// Lock listening on `radio`, with no key yet
    pub fn new(radio: SimRadio) -> Self {
        let own = radio.own_address();
        Self {
            radio,
            key_exchange: KeyExchange::new(KeyExchangeConfig::default()),
            responder: ChallengeResponder::new(own),
            key: None,
            rfid: None,
            unlocks: Vec::new(),
        }
    }

    /// Pre-share a master key
    pub fn with_key(mut self, key: MasterKey) -> Self {
        self.key = Some(key);
        self
    }

    /// RFID credential handed over during bonding
    pub fn with_rfid(mut self, rfid: RfidKey) -> Self {
        self.rfid = Some(rfid);
        self
    }

    pub fn master_key(&self) -> Option<&MasterKey> {
        self.key.as_ref()
    }

    /// Payloads of every executed command
    pub fn unlocks(&self) -> &[Vec<u8>] {
        &self.unlocks
    }

    /// Wait for a keyfob to start a key exchange
    pub fn start_pairing(&mut self, now: Millis) {
        self.key_exchange.start_responder(now);
    }

    /// Process pending radio traffic
    pub fn poll(&mut self, now: Millis) -> Option<LockEvent> {
        if self.key_exchange.state() == KeyExchangeState::WaitingPeerPublic {
            return self.poll_pairing(now);
        }

        let key = self.key.as_ref()?;
        while let Some(datagram) = self.radio.receive() {
            let response = match self.responder.respond(&datagram, key) {
                Ok(response) => response,
                Err(e) => {
                    debug!("Lock ignored frame from {}: {}", datagram.from, e);
                    continue;
                }
            };

            if let Err(e) = self.radio.send(response.to, &response.ack) {
                warn!("Lock could not acknowledge {}: {}", response.to, e);
            }
            if response.fresh {
                info!("Lock executing command {}", hex::encode(&response.payload));
                self.unlocks.push(response.payload.clone());
                return Some(LockEvent::Unlocked(response.payload));
            }
        }
        None
    }

    /// Answer a credential request the keyfob sent on the BLE data channel
    pub fn serve_credential(&self, ble: &SimBle, central: PeerId) -> bool {
        let Some(rfid) = self.rfid.as_ref() else {
            return false;
        };
        let request = credential_request();
        let requested = ble
            .take_sent()
            .iter()
            .any(|(_, data)| data.as_slice() == request.as_slice());
        if requested {
            let response = CredentialResponse { key: rfid.clone() };
            ble.central_send(central, &response.serialize());
        }
        requested
    }

    fn poll_pairing(&mut self, now: Millis) -> Option<LockEvent> {
        match self.key_exchange.poll(&mut self.radio, now) {
            AuthOutcome::Ok => {
                let peer = self.key_exchange.remote_id().ok();
                self.key = self.key_exchange.master_key().ok().cloned();
                self.key_exchange.reset();
                peer.map(LockEvent::Paired)
            }
            AuthOutcome::Busy => None,
            outcome => {
                warn!("Lock pairing ended with {}", outcome);
                self.key_exchange.reset();
                None
            }
        }
    }
}
