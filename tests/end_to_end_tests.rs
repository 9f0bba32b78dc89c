//! End-to-end bridge tests
//!
//! Host bytes in, through ingestion, dispatch and transmit ticks, to
//! notifications and host acknowledgements out.

mod common;

use ble_bridge::ble::events::{announce_start, forward_app_data, on_gap_state};
use ble_bridge::commands::*;
use ble_bridge::core::memory::Envelope;
use ble_bridge::core::ring_buffer::RingBuffer;
use ble_bridge::serial::SerialIngest;
use ble_bridge::state::{BridgeState, GapState};
use ble_bridge::transmit::TxScheduler;
use common::*;
use heapless::Deque;
use proptest::prelude::*;

/// Everything one bridge instance owns
struct Bridge {
    ingest: SerialIngest,
    queue: Deque<Envelope, 4>,
    state: BridgeState,
    ring: RingBuffer,
    device: MockDevice,
    scheduler: TxScheduler,
    link: RecordingLink,
    to_host: Vec<u8>,
}

impl Bridge {
    fn new() -> Self {
        Self {
            ingest: SerialIngest::new(),
            queue: Deque::new(),
            state: BridgeState::new(),
            ring: RingBuffer::new(),
            device: MockDevice::default(),
            scheduler: TxScheduler::default(),
            link: RecordingLink::default(),
            to_host: Vec::new(),
        }
    }

    /// Host writes bytes; every complete frame is dispatched
    fn host_sends(&mut self, bytes: &[u8]) {
        let mut rx: &[u8] = bytes;
        self.ingest.poll(&mut rx, &mut self.queue).unwrap();
        while let Some(env) = self.queue.pop_front() {
            let _ = process_command(&env, &mut self.state, &mut self.ring, &mut self.device, &mut self.to_host);
        }
    }

    fn gap(&mut self, state: GapState) {
        on_gap_state(&mut self.state, state, &mut self.to_host).unwrap();
    }

    fn tick(&mut self) -> usize {
        self.scheduler
            .on_tick(&mut self.state, &mut self.ring, &mut self.link, &mut self.to_host)
            .bytes_sent
    }

    fn host_receives(&mut self) -> Vec<(u8, Vec<u8>)> {
        let frames = decode_all(&self.to_host);
        self.to_host.clear();
        frames
    }
}

#[test]
fn test_boot_connect_and_stream() {
    let mut bridge = Bridge::new();

    announce_start(&mut bridge.to_host).unwrap();
    bridge.gap(GapState::Started);
    bridge.gap(GapState::Advertising);
    assert_eq!(
        bridge.host_receives(),
        vec![
            (CMD_ACK_DEVICE_RESET, vec![]),
            (CMD_ACK_DEVICE_STATE, vec![1]),
            (CMD_ACK_DEVICE_STATE, vec![2]),
        ]
    );

    // Data queued before a central connects waits in the ring
    let payload: Vec<u8> = (0..30).collect();
    bridge.host_sends(&frame_bytes(0x00, &payload));
    assert_eq!(bridge.tick(), 0);
    assert!(bridge.host_receives().is_empty());

    bridge.gap(GapState::Connected);
    bridge.host_receives();

    assert_eq!(bridge.tick(), 30);
    assert_eq!(bridge.link.delivered(), payload);
    assert_eq!(bridge.host_receives(), vec![(CMD_ACK_SEND_DATA, vec![30])]);

    // Disconnect stops the drain again
    bridge.gap(GapState::Advertising);
    bridge.host_sends(&frame_bytes(0x00, b"later"));
    assert_eq!(bridge.tick(), 0);
    assert_eq!(bridge.ring.len(), 5);
}

#[test]
fn test_noise_between_frames_is_ignored() {
    let mut bridge = Bridge::new();
    bridge.state.set_system_state(GapState::Connected);

    let mut stream = vec![0x00, 0xFF, 0x55];
    stream.extend(frame_bytes(0x00, b"one"));
    stream.extend([0x13, 0x37]);
    let mut corrupt = frame_bytes(0x00, b"bad");
    corrupt[5] ^= 0x40;
    stream.extend(corrupt);
    stream.extend(frame_bytes(0x00, b"two"));

    bridge.host_sends(&stream);
    bridge.tick();

    assert_eq!(bridge.link.delivered(), b"onetwo".to_vec());
    assert_eq!(bridge.ingest.stats().rejected_checksum, 1);
}

#[test]
fn test_credit_flow_over_several_ticks() {
    let mut bridge = Bridge::new();
    bridge.state.set_system_state(GapState::Connected);

    let data: Vec<u8> = (0..200u32).map(|i| (i * 7) as u8).collect();
    for chunk in data.chunks(50) {
        bridge.host_sends(&frame_bytes(0x00, chunk));
    }

    let mut credits = Vec::new();
    while !bridge.ring.is_empty() {
        bridge.tick();
        for (code, payload) in bridge.host_receives() {
            assert_eq!(code, CMD_ACK_SEND_DATA);
            credits.push(payload[0]);
        }
    }

    assert_eq!(credits, vec![80, 80, 40]);
    assert_eq!(bridge.link.delivered(), data);
}

#[test]
fn test_flush_tx_round_trip() {
    let mut bridge = Bridge::new();

    bridge.host_sends(&frame_bytes(0x04, &[]));
    assert!(bridge.host_receives().is_empty());

    bridge.tick();
    assert_eq!(bridge.host_receives(), vec![(CMD_ACK_FLUSH_TX, vec![])]);

    bridge.tick();
    assert!(bridge.host_receives().is_empty());
}

#[test]
fn test_commands_in_one_burst() {
    let mut bridge = Bridge::new();
    bridge.state.set_address(&[0, 0, 0, 0x12, 0x34, 0x56]);

    let mut stream = frame_bytes(0x03, b"BRIDGE-TEST-1");
    stream.extend(frame_bytes(0x07, &[2]));
    stream.extend(frame_bytes(0x06, &[]));
    bridge.host_sends(&stream);

    assert_eq!(
        bridge.host_receives(),
        vec![
            (CMD_ACK_CHANGE_NAME, b"BRIDGE-TEST-1-563412".to_vec()),
            (CMD_ACK_DEVICE_POWER, vec![0]),
            (CMD_ACK_DEVICE_STATE, vec![0]),
        ]
    );
}

#[test]
fn test_central_write_reaches_host() {
    let mut bridge = Bridge::new();
    forward_app_data(&[4, b'p', b'i', b'n', b'g'], &mut bridge.to_host).unwrap();
    assert_eq!(bridge.host_receives(), vec![(CMD_REQ_APP_DATA, b"ping".to_vec())]);
}

proptest! {
    #[test]
    fn test_every_queued_byte_is_delivered_once(
        writes in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..40), 1..10),
        budgets in prop::collection::vec(0usize..5, 1..30)
    ) {
        let mut bridge = Bridge::new();
        bridge.state.set_system_state(GapState::Connected);

        let mut expected = Vec::new();
        for write in &writes {
            bridge.host_sends(&frame_bytes(0x00, write));
            expected.extend_from_slice(write);
        }

        // Flaky link first, then a clean one until drained
        let mut credited = 0usize;
        for budget in budgets {
            bridge.link.accept_limit = Some(bridge.link.sent.len() + budget);
            bridge.tick();
        }
        bridge.link.accept_limit = None;
        while !bridge.ring.is_empty() {
            bridge.tick();
        }

        for (code, payload) in bridge.host_receives() {
            prop_assert_eq!(code, CMD_ACK_SEND_DATA);
            credited += payload[0] as usize;
        }

        prop_assert_eq!(bridge.link.delivered(), expected.clone());
        prop_assert_eq!(credited, expected.len());
    }
}
