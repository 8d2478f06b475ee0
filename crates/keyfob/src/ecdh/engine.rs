//! Key exchange engine

use super::constants::*;
use super::messages::PublicKeyMessage;
use crate::crypto;
use crate::error::{KeyfobError, KeyfobResult};
use crate::store::MasterKey;
use crate::transport::{Datagram, DatagramTransport};
use crate::types::{AuthOutcome, Millis, PeerId};
use log::{debug, info, warn};
use p256::ecdh::EphemeralSecret;
use rand::rngs::OsRng;

/// Key exchange state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyExchangeState {
    /// No session
    NotStarted,
    /// Own public key published, waiting for the peer's
    WaitingPeerPublic,
    /// Master key derived
    Complete,
    /// Session aborted on bad peer data
    Failed,
}

/// Which side opened the session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyExchangeRole {
    /// Sends its public key first
    Initiator,
    /// Answers the first public key it receives
    Responder,
}

/// Key exchange configuration
#[derive(Debug, Clone)]
pub struct KeyExchangeConfig {
    /// Abort the session when the peer stays silent this long
    pub session_timeout_ms: Millis,
    /// Interval between repeated public key packets from the initiator
    pub retransmit_interval_ms: Millis,
}

impl Default for KeyExchangeConfig {
    fn default() -> Self {
        Self {
            session_timeout_ms: KEY_EXCHANGE_TIMEOUT,
            retransmit_interval_ms: PUBLIC_KEY_RETRANSMIT_INTERVAL,
        }
    }
}

/// ECDH key exchange session
///
/// The ephemeral secret lives only for the duration of a session and is
/// dropped as soon as the shared secret has been computed.
pub struct KeyExchange {
    /// Configuration
    config: KeyExchangeConfig,
    /// Current state
    state: KeyExchangeState,
    /// Role in the current session
    role: KeyExchangeRole,
    /// Ephemeral secret of the current session
    secret: Option<EphemeralSecret>,
    /// Own public key packet of the current session
    local_public: Option<PublicKeyMessage>,
    /// Derived master key
    master_key: Option<MasterKey>,
    /// Address the peer's public key came from
    remote_id: Option<PeerId>,
    /// Session start or last peer activity
    started_at: Millis,
    /// Last transmission of the own public key
    last_sent_at: Millis,
    /// Outcome reported while in a terminal state
    last_outcome: AuthOutcome,
}

impl KeyExchange {
    /// Create an idle engine
    pub fn new(config: KeyExchangeConfig) -> Self {
        Self {
            config,
            state: KeyExchangeState::NotStarted,
            role: KeyExchangeRole::Initiator,
            secret: None,
            local_public: None,
            master_key: None,
            remote_id: None,
            started_at: 0,
            last_sent_at: 0,
            last_outcome: AuthOutcome::NoAuthentication,
        }
    }

    /// Current state
    pub fn state(&self) -> KeyExchangeState {
        self.state
    }

    /// Role in the current or last session
    pub fn role(&self) -> KeyExchangeRole {
        self.role
    }

    /// Discard all session material and return to [`KeyExchangeState::NotStarted`]
    pub fn reset(&mut self) {
        self.secret = None;
        self.local_public = None;
        self.master_key = None;
        self.remote_id = None;
        self.state = KeyExchangeState::NotStarted;
        self.last_outcome = AuthOutcome::NoAuthentication;
    }

    /// Open a session as initiator and publish the own public key to the
    /// transport's current peer address.
    pub fn start_pairing<T: DatagramTransport + ?Sized>(
        &mut self,
        link: &mut T,
        now: Millis,
    ) -> KeyfobResult<()> {
        self.begin(KeyExchangeRole::Initiator, now);

        let target = link.peer_address();
        if let Err(e) = self.send_public_key(link, target) {
            warn!("Key exchange with {} did not start: {}", target, e);
            self.reset();
            return Err(e);
        }
        self.last_sent_at = now;

        info!("Key exchange started with {}", target);
        Ok(())
    }

    /// Open a session as responder and wait for a public key from anyone
    pub fn start_responder(&mut self, now: Millis) {
        self.begin(KeyExchangeRole::Responder, now);
        info!("Key exchange waiting for an initiator");
    }

    /// Advance the session.
    ///
    /// Consumes at most one received datagram per call.
    pub fn poll<T: DatagramTransport + ?Sized>(&mut self, link: &mut T, now: Millis) -> AuthOutcome {
        match self.state {
            KeyExchangeState::NotStarted => AuthOutcome::NoAuthentication,
            KeyExchangeState::Complete | KeyExchangeState::Failed => self.last_outcome,
            KeyExchangeState::WaitingPeerPublic => self.poll_waiting(link, now),
        }
    }

    /// Derived master key, only available once complete
    pub fn master_key(&self) -> KeyfobResult<&MasterKey> {
        match (self.state, self.master_key.as_ref()) {
            (KeyExchangeState::Complete, Some(key)) => Ok(key),
            _ => Err(KeyfobError::InvalidState),
        }
    }

    /// Address of the peer, only available once complete
    pub fn remote_id(&self) -> KeyfobResult<PeerId> {
        match (self.state, self.remote_id) {
            (KeyExchangeState::Complete, Some(peer)) => Ok(peer),
            _ => Err(KeyfobError::InvalidState),
        }
    }

    fn begin(&mut self, role: KeyExchangeRole, now: Millis) {
        self.reset();

        let secret = EphemeralSecret::random(&mut OsRng);
        self.local_public = Some(PublicKeyMessage::from_public_key(&secret.public_key()));
        self.secret = Some(secret);
        self.role = role;
        self.state = KeyExchangeState::WaitingPeerPublic;
        self.started_at = now;
        self.last_outcome = AuthOutcome::Busy;
    }

    fn poll_waiting<T: DatagramTransport + ?Sized>(&mut self, link: &mut T, now: Millis) -> AuthOutcome {
        if let Some(datagram) = link.receive() {
            self.started_at = now;

            return match self.handle_peer_public(link, &datagram) {
                Ok(()) => {
                    self.state = KeyExchangeState::Complete;
                    self.last_outcome = AuthOutcome::Ok;
                    AuthOutcome::Ok
                }
                Err(KeyfobError::Transport(e)) => {
                    warn!("Key exchange reply to {} failed: {}", datagram.from, e);
                    self.reset();
                    AuthOutcome::NoAuthentication
                }
                Err(e) => {
                    warn!("Key exchange with {} failed: {}", datagram.from, e);
                    self.fail();
                    AuthOutcome::UnknownData
                }
            };
        }

        if now.saturating_sub(self.started_at) > self.config.session_timeout_ms {
            info!("Key exchange timed out");
            self.reset();
            return AuthOutcome::NoAuthentication;
        }

        if self.role == KeyExchangeRole::Initiator
            && now.saturating_sub(self.last_sent_at) >= self.config.retransmit_interval_ms
        {
            let target = link.peer_address();
            debug!("Repeating public key to {}", target);
            if let Err(e) = self.send_public_key(link, target) {
                warn!("Key exchange retransmission failed: {}", e);
                self.reset();
                return AuthOutcome::NoAuthentication;
            }
            self.last_sent_at = now;
        }

        AuthOutcome::Busy
    }

    fn handle_peer_public<T: DatagramTransport + ?Sized>(
        &mut self,
        link: &mut T,
        datagram: &Datagram,
    ) -> KeyfobResult<()> {
        let message = PublicKeyMessage::parse(&datagram.data)?;
        let peer_public = message.public_key()?;

        let local = self.local_public.as_ref().ok_or(KeyfobError::InvalidState)?;
        if message.point == local.point {
            return Err(KeyfobError::MalformedPeerKey("peer echoed our own public key".into()));
        }

        if self.role == KeyExchangeRole::Responder {
            link.send(datagram.from, &local.serialize())?;
        }

        let secret = self.secret.take().ok_or(KeyfobError::InvalidState)?;
        let shared = secret.diffie_hellman(&peer_public);
        let key = crypto::derive_master_key(shared.raw_secret_bytes(), &local.point, &message.point);

        info!("Derived master key {} with {}", key.fingerprint(), datagram.from);
        self.master_key = Some(key);
        self.remote_id = Some(datagram.from);
        Ok(())
    }

    fn send_public_key<T: DatagramTransport + ?Sized>(
        &self,
        link: &mut T,
        target: PeerId,
    ) -> KeyfobResult<()> {
        let local = self.local_public.as_ref().ok_or(KeyfobError::InvalidState)?;
        link.send(target, &local.serialize())?;
        Ok(())
    }

    fn fail(&mut self) {
        self.secret = None;
        self.master_key = None;
        self.remote_id = None;
        self.state = KeyExchangeState::Failed;
        self.last_outcome = AuthOutcome::UnknownData;
    }
}
