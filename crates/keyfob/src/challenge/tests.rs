//! Tests for challenge/response authentication

use super::*;
use crate::error::KeyfobError;
use crate::sim::{SimAir, SimRadio};
use crate::store::{CredentialStore, MasterKey, MemoryCredentialStore};
use crate::transport::{Datagram, DatagramTransport};
use crate::types::{AuthOutcome, PeerId};

const LOCK: PeerId = PeerId(1);
const FOB: PeerId = PeerId(2);
const UNLOCK: &[u8] = &[0xFE, 0xDC, 0xBA, 0x98];

fn paired_key() -> MasterKey {
    MasterKey::new([0x42; 16])
}

fn paired_store() -> MemoryCredentialStore {
    let mut store = MemoryCredentialStore::new();
    store.set_credential(LOCK, &paired_key()).unwrap();
    store
}

fn setup() -> (SimAir, SimRadio, SimRadio) {
    let air = SimAir::new();
    (air.clone(), air.endpoint(FOB), air.endpoint(LOCK))
}

/// Answer every pending challenge on the lock side
fn answer(lock: &mut SimRadio, responder: &mut ChallengeResponder, key: &MasterKey) -> Vec<Response> {
    let mut responses = Vec::new();
    while let Some(datagram) = lock.receive() {
        if let Ok(response) = responder.respond(&datagram, key) {
            lock.send(response.to, &response.ack).unwrap();
            responses.push(response);
        }
    }
    responses
}

#[test]
fn test_unlock_is_acknowledged() {
    let (_air, mut fob, mut lock) = setup();
    let store = paired_store();
    let mut initiator = ChallengeInitiator::new(ChallengeConfig::default());
    let mut responder = ChallengeResponder::new(LOCK);

    initiator.send_message(UNLOCK, LOCK, &store, &mut fob, 0).unwrap();
    assert_eq!(initiator.state(), ChallengeState::WaitAck);
    assert_eq!(initiator.poll(&mut fob, 10), AuthOutcome::Busy);

    let responses = answer(&mut lock, &mut responder, &paired_key());
    assert_eq!(responses.len(), 1);
    assert_eq!(responses[0].payload, UNLOCK);
    assert!(responses[0].fresh);

    assert_eq!(initiator.poll(&mut fob, 20), AuthOutcome::InitiatorOk);
    assert_eq!(initiator.state(), ChallengeState::Authenticated);
    assert_eq!(initiator.poll(&mut fob, 30), AuthOutcome::InitiatorOk);

    initiator.reset();
    assert_eq!(initiator.poll(&mut fob, 40), AuthOutcome::NoAuthentication);
}

#[test]
fn test_each_session_uses_a_new_nonce() {
    let (_air, mut fob, mut lock) = setup();
    let store = paired_store();
    let mut initiator = ChallengeInitiator::new(ChallengeConfig::default());

    initiator.send_message(UNLOCK, LOCK, &store, &mut fob, 0).unwrap();
    let first = lock.receive().unwrap();
    initiator.send_message(UNLOCK, LOCK, &store, &mut fob, 0).unwrap();
    let second = lock.receive().unwrap();

    let first = ChallengeMessage::open(&first.data, &paired_key()).unwrap();
    let second = ChallengeMessage::open(&second.data, &paired_key()).unwrap();
    assert_ne!(first.nonce, second.nonce);
    assert_eq!(first.initiator, FOB);
}

#[test]
fn test_default_key_used_when_unpaired() {
    let (_air, mut fob, mut lock) = setup();
    let default_key = MasterKey::new([0x07; 16]);
    let store = MemoryCredentialStore::with_default(LOCK, default_key.clone());
    let mut initiator = ChallengeInitiator::new(ChallengeConfig::default());

    initiator.send_message(UNLOCK, LOCK, &store, &mut fob, 0).unwrap();

    let challenge = lock.receive().unwrap();
    assert!(ChallengeMessage::open(&challenge.data, &default_key).is_ok());
    assert!(ChallengeMessage::open(&challenge.data, &paired_key()).is_err());
}

#[test]
fn test_no_credential_sends_nothing() {
    let (_air, mut fob, _lock) = setup();
    let store = MemoryCredentialStore::new();
    let mut initiator = ChallengeInitiator::new(ChallengeConfig::default());

    assert_eq!(
        initiator.send_message(UNLOCK, LOCK, &store, &mut fob, 0),
        Err(KeyfobError::NoCredential(LOCK))
    );
    assert!(fob.sent_frames().is_empty());
    assert_eq!(initiator.state(), ChallengeState::Idle);
}

#[test]
fn test_oversized_payload_is_refused() {
    let (_air, mut fob, _lock) = setup();
    let store = paired_store();
    let mut initiator = ChallengeInitiator::new(ChallengeConfig::default());
    let payload = vec![0u8; MAX_PAYLOAD_SIZE + 1];

    assert_eq!(
        initiator.send_message(&payload, LOCK, &store, &mut fob, 0),
        Err(KeyfobError::PayloadTooLarge(MAX_PAYLOAD_SIZE + 1))
    );
    assert!(fob.sent_frames().is_empty());
}

#[test]
fn test_send_failure_resets() {
    let (_air, mut fob, _lock) = setup();
    fob.set_fail_sends(true);
    let store = paired_store();
    let mut initiator = ChallengeInitiator::new(ChallengeConfig::default());

    assert!(matches!(
        initiator.send_message(UNLOCK, LOCK, &store, &mut fob, 0),
        Err(KeyfobError::Transport(_))
    ));
    assert_eq!(initiator.state(), ChallengeState::Idle);
}

#[test]
fn test_lost_ack_is_recovered_by_retransmission() {
    let (air, mut fob, mut lock) = setup();
    let store = paired_store();
    let config = ChallengeConfig::default();
    let timeout = config.retry_timeout_ms;
    let mut initiator = ChallengeInitiator::new(config);
    let mut responder = ChallengeResponder::new(LOCK);

    initiator.send_message(UNLOCK, LOCK, &store, &mut fob, 0).unwrap();
    air.drop_next(1);
    let first = answer(&mut lock, &mut responder, &paired_key());
    assert!(first[0].fresh);

    assert_eq!(initiator.poll(&mut fob, timeout), AuthOutcome::Busy);
    assert_eq!(initiator.retries(), 1);

    let second = answer(&mut lock, &mut responder, &paired_key());
    assert!(!second[0].fresh);
    assert_eq!(initiator.poll(&mut fob, timeout + 10), AuthOutcome::InitiatorOk);
}

#[test]
fn test_gives_up_after_max_retries() {
    let (_air, mut fob, _lock) = setup();
    let store = paired_store();
    let config = ChallengeConfig::default();
    let timeout = config.retry_timeout_ms;
    let max_retries = config.max_retries;
    let mut initiator = ChallengeInitiator::new(config);

    initiator.send_message(UNLOCK, LOCK, &store, &mut fob, 0).unwrap();

    let mut now = 0;
    for _ in 0..max_retries {
        now += timeout;
        assert_eq!(initiator.poll(&mut fob, now), AuthOutcome::Busy);
    }
    assert_eq!(fob.sent_frames().len(), 1 + max_retries as usize);

    now += timeout;
    assert_eq!(initiator.poll(&mut fob, now), AuthOutcome::NoAuthentication);
    assert_eq!(initiator.state(), ChallengeState::Idle);
}

#[test]
fn test_forged_ack_is_ignored() {
    let (_air, mut fob, mut lock) = setup();
    let store = paired_store();
    let mut initiator = ChallengeInitiator::new(ChallengeConfig::default());
    let mut responder = ChallengeResponder::new(LOCK);

    initiator.send_message(UNLOCK, LOCK, &store, &mut fob, 0).unwrap();
    let wrong_key = MasterKey::new([0x13; 16]);
    let challenge = lock.receive().unwrap();
    let challenge = ChallengeMessage::open(&challenge.data, &paired_key()).unwrap();
    let forged = AckMessage {
        responder: LOCK,
        initiator: FOB,
        nonce: challenge.nonce,
    }
    .seal(&wrong_key)
    .unwrap();
    lock.send(FOB, &forged).unwrap();
    assert_eq!(initiator.poll(&mut fob, 10), AuthOutcome::Busy);

    // An ack for a different nonce under the right key is ignored too
    let stale = AckMessage {
        responder: LOCK,
        initiator: FOB,
        nonce: [0u8; 16],
    }
    .seal(&paired_key())
    .unwrap();
    lock.send(FOB, &stale).unwrap();
    assert_eq!(initiator.poll(&mut fob, 20), AuthOutcome::Busy);

    let frame = ChallengeMessage {
        initiator: FOB,
        nonce: challenge.nonce,
        payload: UNLOCK.to_vec(),
    }
    .seal(&paired_key())
    .unwrap();
    let response = responder.respond(&Datagram::new(FOB, frame), &paired_key()).unwrap();
    lock.send(FOB, &response.ack).unwrap();
    assert_eq!(initiator.poll(&mut fob, 30), AuthOutcome::InitiatorOk);
}

#[test]
fn test_ack_from_other_address_is_ignored() {
    let (air, mut fob, mut lock) = setup();
    let mut intruder = air.endpoint(PeerId(9));
    let store = paired_store();
    let mut initiator = ChallengeInitiator::new(ChallengeConfig::default());
    let mut responder = ChallengeResponder::new(LOCK);

    initiator.send_message(UNLOCK, LOCK, &store, &mut fob, 0).unwrap();
    let challenge = lock.receive().unwrap();
    let response = responder.respond(&challenge, &paired_key()).unwrap();

    intruder.send(FOB, &response.ack).unwrap();
    assert_eq!(initiator.poll(&mut fob, 10), AuthOutcome::Busy);
}

#[test]
fn test_responder_rejects_tampered_challenge() {
    let mut responder = ChallengeResponder::new(LOCK);
    let mut frame = ChallengeMessage {
        initiator: FOB,
        nonce: [1; 16],
        payload: UNLOCK.to_vec(),
    }
    .seal(&paired_key())
    .unwrap();
    let payload_start = CHALLENGE_HEADER_SIZE;
    frame[payload_start] ^= 0x01;

    assert!(matches!(
        responder.respond(&Datagram::new(FOB, frame), &paired_key()),
        Err(KeyfobError::UnknownData(_))
    ));
}

#[test]
fn test_responder_rejects_spoofed_initiator() {
    let mut responder = ChallengeResponder::new(LOCK);
    let frame = ChallengeMessage {
        initiator: FOB,
        nonce: [1; 16],
        payload: UNLOCK.to_vec(),
    }
    .seal(&paired_key())
    .unwrap();

    assert!(responder.respond(&Datagram::new(PeerId(7), frame), &paired_key()).is_err());
}

#[test]
fn test_replayed_ack_does_not_authenticate_new_session() {
    let (_air, mut fob, mut lock) = setup();
    let store = paired_store();
    let mut initiator = ChallengeInitiator::new(ChallengeConfig::default());
    let mut responder = ChallengeResponder::new(LOCK);

    initiator.send_message(UNLOCK, LOCK, &store, &mut fob, 0).unwrap();
    let challenge = lock.receive().unwrap();
    let old_ack = responder.respond(&challenge, &paired_key()).unwrap().ack;
    lock.send(FOB, &old_ack).unwrap();
    assert_eq!(initiator.poll(&mut fob, 10), AuthOutcome::InitiatorOk);

    initiator.send_message(UNLOCK, LOCK, &store, &mut fob, 20).unwrap();
    lock.send(FOB, &old_ack).unwrap();
    lock.send(FOB, &old_ack).unwrap();
    assert_eq!(initiator.poll(&mut fob, 30), AuthOutcome::Busy);
    assert_eq!(initiator.state(), ChallengeState::WaitAck);
}

#[test]
fn test_wrong_key_never_succeeds() {
    let (_air, mut fob, mut lock) = setup();
    let store = paired_store();
    let config = ChallengeConfig::default();
    let timeout = config.retry_timeout_ms;
    let mut initiator = ChallengeInitiator::new(config);
    let mut responder = ChallengeResponder::new(LOCK);
    let lock_key = MasterKey::new([0x24; 16]);

    initiator.send_message(UNLOCK, LOCK, &store, &mut fob, 0).unwrap();

    let mut now = 0;
    let outcome = loop {
        assert!(answer(&mut lock, &mut responder, &lock_key).is_empty());
        let outcome = initiator.poll(&mut fob, now);
        if outcome != AuthOutcome::Busy {
            break outcome;
        }
        now += timeout / 3;
    };
    assert_eq!(outcome, AuthOutcome::NoAuthentication);
}
