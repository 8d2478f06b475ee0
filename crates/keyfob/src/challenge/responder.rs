//! Challenge/response responder

use super::constants::REPLAY_WINDOW;
use super::messages::{AckMessage, ChallengeMessage};
use crate::crypto::Nonce;
use crate::error::{KeyfobError, KeyfobResult};
use crate::store::MasterKey;
use crate::transport::Datagram;
use crate::types::PeerId;
use log::debug;
use std::collections::VecDeque;

/// Answer to a verified challenge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Address to send the acknowledgement to
    pub to: PeerId,
    /// Sealed acknowledgement frame
    pub ack: Vec<u8>,
    /// Authenticated command payload
    pub payload: Vec<u8>,
    /// False when this nonce was already answered
    pub fresh: bool,
}

/// Verifies challenges and builds acknowledgements
#[derive(Debug)]
pub struct ChallengeResponder {
    own_id: PeerId,
    seen: VecDeque<Nonce>,
}

impl ChallengeResponder {
    /// Create a responder answering as `own_id`
    pub fn new(own_id: PeerId) -> Self {
        Self {
            own_id,
            seen: VecDeque::with_capacity(REPLAY_WINDOW),
        }
    }

    /// Verify a received challenge and build its acknowledgement
    pub fn respond(&mut self, datagram: &Datagram, key: &MasterKey) -> KeyfobResult<Response> {
        let challenge = ChallengeMessage::open(&datagram.data, key)?;
        if challenge.initiator != datagram.from {
            return Err(KeyfobError::UnknownData(format!(
                "challenge names {} but came from {}",
                challenge.initiator, datagram.from
            )));
        }

        let fresh = !self.seen.contains(&challenge.nonce);
        if fresh {
            if self.seen.len() == REPLAY_WINDOW {
                self.seen.pop_front();
            }
            self.seen.push_back(challenge.nonce);
        } else {
            debug!("Repeated challenge from {}", datagram.from);
        }

        let ack = AckMessage {
            responder: self.own_id,
            initiator: challenge.initiator,
            nonce: challenge.nonce,
        }
        .seal(key)?;

        Ok(Response {
            to: datagram.from,
            ack,
            payload: challenge.payload,
            fresh,
        })
    }
}
