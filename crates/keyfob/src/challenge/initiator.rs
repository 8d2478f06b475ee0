//! Challenge/response initiator

use super::constants::*;
use super::messages::{AckMessage, ChallengeMessage};
use crate::crypto::{self, Nonce};
use crate::error::{KeyfobError, KeyfobResult};
use crate::store::{CredentialStore, MasterKey};
use crate::transport::{Datagram, DatagramTransport};
use crate::types::{AuthOutcome, Millis, PeerId};
use log::{debug, info, warn};
use zeroize::Zeroize;

/// Initiator state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChallengeState {
    /// Nothing in flight
    Idle,
    /// Challenge sent, waiting for the acknowledgement
    WaitAck,
    /// Acknowledgement verified
    Authenticated,
}

/// Initiator configuration
#[derive(Debug, Clone)]
pub struct ChallengeConfig {
    /// Wait this long for an acknowledgement before retransmitting
    pub retry_timeout_ms: Millis,
    /// Retransmissions before the attempt is abandoned
    pub max_retries: u8,
}

impl Default for ChallengeConfig {
    fn default() -> Self {
        Self {
            retry_timeout_ms: CHALLENGE_RETRY_TIMEOUT,
            max_retries: CHALLENGE_MAX_RETRIES,
        }
    }
}

/// Sends one authenticated message and waits for its acknowledgement
#[derive(Debug)]
pub struct ChallengeInitiator {
    config: ChallengeConfig,
    state: ChallengeState,
    peer: PeerId,
    own_id: PeerId,
    key: Option<MasterKey>,
    nonce: Option<Nonce>,
    frame: Vec<u8>,
    retries: u8,
    deadline: Millis,
}

impl ChallengeInitiator {
    /// Create an idle initiator
    pub fn new(config: ChallengeConfig) -> Self {
        Self {
            config,
            state: ChallengeState::Idle,
            peer: PeerId::BROADCAST,
            own_id: PeerId::BROADCAST,
            key: None,
            nonce: None,
            frame: Vec::new(),
            retries: 0,
            deadline: 0,
        }
    }

    /// Current state
    pub fn state(&self) -> ChallengeState {
        self.state
    }

    /// Retransmissions issued in the current attempt
    pub fn retries(&self) -> u8 {
        self.retries
    }

    /// Drop the attempt and every copy of its key material
    pub fn reset(&mut self) {
        self.state = ChallengeState::Idle;
        self.key = None;
        self.nonce = None;
        self.frame.zeroize();
        self.retries = 0;
    }

    /// Start an authenticated exchange carrying `payload` to `peer`.
    ///
    /// The key shared with `peer` is used when one is stored; otherwise the
    /// device's default key. Fails without transmitting when neither exists.
    pub fn send_message<T, S>(
        &mut self,
        payload: &[u8],
        peer: PeerId,
        store: &S,
        link: &mut T,
        now: Millis,
    ) -> KeyfobResult<()>
    where
        T: DatagramTransport + ?Sized,
        S: CredentialStore + ?Sized,
    {
        self.reset();

        if payload.len() > MAX_PAYLOAD_SIZE {
            return Err(KeyfobError::PayloadTooLarge(payload.len()));
        }

        let key = match store.credential(peer) {
            Some(key) => key,
            None => {
                let (default_id, key) = store
                    .default_credential()
                    .ok_or(KeyfobError::NoCredential(peer))?;
                debug!("No key paired with {}, using default key of {}", peer, default_id);
                key
            }
        };

        let nonce = crypto::generate_nonce();
        let own_id = link.own_address();
        let frame = ChallengeMessage {
            initiator: own_id,
            nonce,
            payload: payload.to_vec(),
        }
        .seal(&key)?;

        if let Err(e) = link.send(peer, &frame) {
            warn!("Challenge to {} could not be sent: {}", peer, e);
            return Err(e.into());
        }

        debug!("Challenge {} sent to {}", hex::encode(&nonce[..4]), peer);
        self.peer = peer;
        self.own_id = own_id;
        self.key = Some(key);
        self.nonce = Some(nonce);
        self.frame = frame;
        self.retries = 0;
        self.deadline = now + self.config.retry_timeout_ms;
        self.state = ChallengeState::WaitAck;
        Ok(())
    }

    /// Advance the exchange
    pub fn poll<T: DatagramTransport + ?Sized>(&mut self, link: &mut T, now: Millis) -> AuthOutcome {
        match self.state {
            ChallengeState::Idle => AuthOutcome::NoAuthentication,
            ChallengeState::Authenticated => AuthOutcome::InitiatorOk,
            ChallengeState::WaitAck => self.poll_wait_ack(link, now),
        }
    }

    fn poll_wait_ack<T: DatagramTransport + ?Sized>(&mut self, link: &mut T, now: Millis) -> AuthOutcome {
        while let Some(datagram) = link.receive() {
            if self.accept(&datagram) {
                info!("Challenge acknowledged by {}", self.peer);
                self.key = None;
                self.nonce = None;
                self.frame.zeroize();
                self.state = ChallengeState::Authenticated;
                return AuthOutcome::InitiatorOk;
            }
        }

        if now < self.deadline {
            return AuthOutcome::Busy;
        }

        if self.retries >= self.config.max_retries {
            info!("No acknowledgement from {} after {} retries", self.peer, self.retries);
            self.reset();
            return AuthOutcome::NoAuthentication;
        }

        self.retries += 1;
        debug!("Retransmitting challenge to {} ({}/{})", self.peer, self.retries, self.config.max_retries);
        if let Err(e) = link.send(self.peer, &self.frame) {
            warn!("Challenge retransmission failed: {}", e);
            self.reset();
            return AuthOutcome::NoAuthentication;
        }
        self.deadline = now + self.config.retry_timeout_ms;
        AuthOutcome::Busy
    }

    fn accept(&self, datagram: &Datagram) -> bool {
        if datagram.from != self.peer {
            debug!("Ignoring frame from {} while waiting for {}", datagram.from, self.peer);
            return false;
        }
        let (Some(key), Some(nonce)) = (self.key.as_ref(), self.nonce.as_ref()) else {
            return false;
        };

        match AckMessage::open(&datagram.data, key) {
            Ok(ack) if ack.nonce == *nonce && ack.initiator == self.own_id && ack.responder == self.peer => true,
            Ok(_) => {
                warn!("Acknowledgement from {} does not match the outstanding challenge", datagram.from);
                false
            }
            Err(e) => {
                warn!("Rejected reply from {}: {}", datagram.from, e);
                false
            }
        }
    }
}
