//! TX packet pool tests
//!
//! The pool is a process-wide static, so everything that allocates from it
//! lives in this one test binary and runs as a single test.

use ble_bridge::core::memory::{BufferError, TxPacket, BUFFER_SIZE, TX_POOL_SIZE};
use ble_bridge::core::transport::{PacketWriter, TransportError};
use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use embassy_sync::channel::Channel;
use embedded_io::{Error as _, ErrorKind, Write};

#[test]
fn test_pool_and_packet_writer() {
    // Oversized data never touches the pool
    assert!(matches!(
        TxPacket::new(&[0u8; BUFFER_SIZE + 1]),
        Err(BufferError::BufferTooSmall)
    ));

    // Exhaust the pool, then free one buffer
    let mut held = Vec::new();
    for i in 0..TX_POOL_SIZE {
        let packet = TxPacket::new(&[i as u8; 10]).unwrap();
        assert_eq!(packet.len(), 10);
        held.push(packet);
    }
    assert!(matches!(TxPacket::new(&[1]), Err(BufferError::PoolExhausted)));

    held.pop();
    let packet = TxPacket::new(&[9, 8, 7]).unwrap();
    assert_eq!(packet.as_slice(), &[9, 8, 7]);
    drop(packet);
    drop(held);

    // Each write becomes one packet on the channel
    let channel: Channel<NoopRawMutex, TxPacket, 2> = Channel::new();
    let mut writer = PacketWriter::new(channel.sender());

    writer.write_all(&[0xAB, 0x55, 0x06, 0x00, 0xF8]).unwrap();
    writer.write_all(b"second").unwrap();
    assert_eq!(writer.write(&[]), Ok(0));

    let err = writer.write_all(b"third").unwrap_err();
    assert_eq!(err, TransportError::ChannelFull);
    assert_eq!(err.kind(), ErrorKind::Other);

    assert_eq!(channel.try_receive().unwrap().as_slice(), &[0xAB, 0x55, 0x06, 0x00, 0xF8]);
    assert_eq!(channel.try_receive().unwrap().as_slice(), b"second");
    assert!(channel.try_receive().is_err());

    // The failed write returned its buffer to the pool
    let all: Vec<TxPacket> = (0..TX_POOL_SIZE).map(|_| TxPacket::new(&[0]).unwrap()).collect();
    let err = writer.write(&[1]).unwrap_err();
    assert_eq!(err, TransportError::BufferError(BufferError::PoolExhausted));
    assert_eq!(err.kind(), ErrorKind::OutOfMemory);
    drop(all);
}
