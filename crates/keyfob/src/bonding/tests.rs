//! Tests for the bonding engine

use super::*;
use crate::error::KeyfobError;
use crate::sim::SimBle;
use crate::store::RfidKey;
use crate::transport::{BleTransport, DatagramTransport};
use crate::types::{AuthOutcome, PeerId};

const CENTRAL: PeerId = PeerId(3);

fn rfid() -> RfidKey {
    RfidKey::new([0xA5; 10])
}

fn module() -> SimBle {
    let mut ble = SimBle::new();
    ble.init().unwrap();
    ble.set_peer_address(CENTRAL);
    ble
}

#[test]
fn test_full_bonding_flow() {
    let mut ble = module();
    let mut engine = BondingEngine::new(BondingConfig::default());

    assert!(engine.start_pairing(&mut ble, 0));
    assert_eq!(engine.state(), BondingState::Advertising);
    assert!(ble.is_advertising());
    assert_eq!(engine.poll(&mut ble, 10), AuthOutcome::Busy);

    ble.connect();
    engine.on_passcode_requested();
    assert_eq!(engine.poll(&mut ble, 20), AuthOutcome::PasscodeRequested);
    assert_eq!(engine.state(), BondingState::PasscodeRequested);
    assert_eq!(engine.poll(&mut ble, 30), AuthOutcome::Busy);

    ble.bond();
    engine.on_bonded();
    assert_eq!(engine.poll(&mut ble, 40), AuthOutcome::Busy);
    assert_eq!(engine.state(), BondingState::Bonded);

    // First poll on a secure link requests the credential
    assert_eq!(engine.poll(&mut ble, 50), AuthOutcome::Busy);
    assert_eq!(ble.take_sent(), vec![(CENTRAL, vec![CREDENTIAL_REQUEST])]);
    assert_eq!(engine.credential(), Err(KeyfobError::InvalidState));

    let response = CredentialResponse { key: rfid() };
    ble.central_send(CENTRAL, &response.serialize());
    assert_eq!(engine.poll(&mut ble, 60), AuthOutcome::Ok);
    assert_eq!(engine.state(), BondingState::CredentialExchanged);
    assert_eq!(engine.credential().unwrap(), rfid());
    assert_eq!(engine.poll(&mut ble, 70), AuthOutcome::Ok);
}

#[test]
fn test_waits_for_encrypted_link() {
    let mut ble = module();
    let mut engine = BondingEngine::new(BondingConfig::default());
    engine.start_pairing(&mut ble, 0);

    ble.connect();
    engine.on_bonded();
    engine.poll(&mut ble, 10);
    assert_eq!(engine.state(), BondingState::Bonded);

    // Link not secured yet
    assert_eq!(engine.poll(&mut ble, 20), AuthOutcome::Busy);
    assert!(ble.take_sent().is_empty());
}

#[test]
fn test_garbage_on_data_channel_is_ignored() {
    let mut ble = module();
    let mut engine = BondingEngine::new(BondingConfig::default());
    engine.start_pairing(&mut ble, 0);
    ble.connect();
    ble.bond();
    engine.on_bonded();
    engine.poll(&mut ble, 10);
    engine.poll(&mut ble, 20);

    ble.central_send(CENTRAL, &[CREDENTIAL_RESPONSE, 1, 2]);
    ble.central_send(CENTRAL, &[0x00]);
    assert_eq!(engine.poll(&mut ble, 30), AuthOutcome::Busy);
    assert_eq!(engine.state(), BondingState::Bonded);
}

#[test]
fn test_advertising_window_expires() {
    let mut ble = module();
    let config = BondingConfig::default();
    let window = config.advertising_window_ms;
    let mut engine = BondingEngine::new(config);
    engine.start_pairing(&mut ble, 0);

    assert_eq!(engine.poll(&mut ble, window), AuthOutcome::Busy);
    assert_eq!(engine.poll(&mut ble, window + 1), AuthOutcome::NoAuthentication);
    assert_eq!(engine.state(), BondingState::Idle);
}

#[test]
fn test_central_never_sends_credential() {
    let mut ble = module();
    let config = BondingConfig::default();
    let timeout = config.credential_timeout_ms;
    let mut engine = BondingEngine::new(config);
    engine.start_pairing(&mut ble, 0);
    ble.connect();
    ble.bond();
    engine.on_bonded();
    engine.poll(&mut ble, 100);

    assert_eq!(engine.poll(&mut ble, 100 + timeout + 1), AuthOutcome::NoAuthentication);
}

#[test]
fn test_link_loss_aborts() {
    let mut ble = module();
    let mut engine = BondingEngine::new(BondingConfig::default());
    engine.start_pairing(&mut ble, 0);
    ble.connect();
    engine.on_passcode_requested();
    engine.poll(&mut ble, 10);

    engine.on_link_down();
    assert_eq!(engine.poll(&mut ble, 20), AuthOutcome::NoAuthentication);
    assert_eq!(engine.state(), BondingState::Idle);
}

#[test]
fn test_advertising_refused() {
    let mut ble = module();
    ble.set_fail_advertising(true);
    let mut engine = BondingEngine::new(BondingConfig::default());

    assert!(!engine.start_pairing(&mut ble, 0));
    assert_eq!(engine.state(), BondingState::Idle);
    assert_eq!(engine.poll(&mut ble, 10), AuthOutcome::NoAuthentication);
}

#[test]
fn test_events_ignored_when_idle() {
    let mut ble = module();
    let mut engine = BondingEngine::new(BondingConfig::default());

    engine.on_bonded();
    engine.on_passcode_requested();
    assert_eq!(engine.poll(&mut ble, 10), AuthOutcome::NoAuthentication);
}
