//! BLE glue tests

mod common;

use ble_bridge::ble::events::{announce_start, forward_app_data, on_gap_state};
use ble_bridge::commands::{CommandError, CMD_ACK_DEVICE_RESET, CMD_ACK_DEVICE_STATE, CMD_REQ_APP_DATA};
use ble_bridge::config::DEFAULT_NAME;
use ble_bridge::state::{BridgeState, GapState};
use common::*;

#[test]
fn test_announce_start() {
    let mut serial: Vec<u8> = Vec::new();
    announce_start(&mut serial).unwrap();
    assert_eq!(serial, frame_bytes(CMD_ACK_DEVICE_RESET, &[]));
}

#[test]
fn test_gap_states_reported_and_tracked() {
    let mut state = BridgeState::new();
    let mut serial: Vec<u8> = Vec::new();

    for gap in [GapState::Started, GapState::Advertising, GapState::Connected] {
        on_gap_state(&mut state, gap, &mut serial).unwrap();
    }
    assert!(state.connected);
    assert_eq!(state.system_state(), GapState::Connected);

    on_gap_state(&mut state, GapState::Waiting, &mut serial).unwrap();
    on_gap_state(&mut state, GapState::Advertising, &mut serial).unwrap();
    assert!(!state.connected);

    let reported: Vec<(u8, Vec<u8>)> = decode_all(&serial);
    assert_eq!(
        reported,
        vec![
            (CMD_ACK_DEVICE_STATE, vec![1]),
            (CMD_ACK_DEVICE_STATE, vec![2]),
            (CMD_ACK_DEVICE_STATE, vec![5]),
            (CMD_ACK_DEVICE_STATE, vec![3]),
            (CMD_ACK_DEVICE_STATE, vec![2]),
        ]
    );
}

#[test]
fn test_started_restores_default_name() {
    let mut state = BridgeState::new();
    state.set_name(b"RENAMED-BRDG1").unwrap();

    let mut serial: Vec<u8> = Vec::new();
    on_gap_state(&mut state, GapState::Started, &mut serial).unwrap();
    assert_eq!(state.name(), &DEFAULT_NAME);
}

#[test]
fn test_gap_state_numbering() {
    for value in 0..8u8 {
        assert_eq!(GapState::from_u8(value).map(GapState::as_u8), Some(value));
    }
    assert_eq!(GapState::from_u8(8), None);
}

#[test]
fn test_app_data_forwarded() {
    let mut serial: Vec<u8> = Vec::new();

    // Length prefix shorter than the written value: the rest is ignored
    forward_app_data(&[3, b'a', b'b', b'c', 0, 0], &mut serial).unwrap();
    assert_eq!(decode_all(&serial), vec![(CMD_REQ_APP_DATA, b"abc".to_vec())]);
}

#[test]
fn test_app_data_length_checked() {
    let mut serial: Vec<u8> = Vec::new();

    assert_eq!(forward_app_data(&[], &mut serial), Err(CommandError::InvalidPayload));
    assert_eq!(forward_app_data(&[5, 1, 2], &mut serial), Err(CommandError::InvalidPayload));
    assert!(serial.is_empty());

    forward_app_data(&[0], &mut serial).unwrap();
    assert_eq!(decode_all(&serial), vec![(CMD_REQ_APP_DATA, vec![])]);
}
