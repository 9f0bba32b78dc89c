//! Bridge GATT Service
//!
//! One primary service with a write characteristic (central to host) and a
//! notify characteristic (host to central), registered at start-up with
//! `ServiceBuilder`.

use heapless::Vec;
use nrf_softdevice::ble::gatt_server::builder::ServiceBuilder;
use nrf_softdevice::ble::gatt_server::characteristic::{Attribute, Metadata, Properties};
use nrf_softdevice::ble::gatt_server::{self, NotifyValueError, RegisterError, WriteOp};
use nrf_softdevice::ble::{Connection, Uuid};
use nrf_softdevice::{RawError, Softdevice};

use crate::ble::{CHAR_VALUE_LEN, RX_CHAR_UUID16, SERVICE_UUID16, TX_CHAR_UUID16};
use crate::transmit::{RadioLink, TransmitError};

/// Events raised by central writes
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BridgeEvent {
    /// Raw value written to the RX characteristic
    AppData(Vec<u8, CHAR_VALUE_LEN>),
    /// Central toggled TX notifications
    NotificationsEnabled(bool),
}

/// Bridge GATT server
pub struct BridgeServer {
    tx_value_handle: u16,
    tx_cccd_handle: u16,
    rx_value_handle: u16,
}

impl BridgeServer {
    /// Register the bridge service with the SoftDevice
    pub fn new(sd: &mut Softdevice) -> Result<Self, RegisterError> {
        let mut sb = ServiceBuilder::new(sd, Uuid::new_16(SERVICE_UUID16))?;

        let rx = sb
            .add_characteristic(
                Uuid::new_16(RX_CHAR_UUID16),
                Attribute::new([0u8; CHAR_VALUE_LEN]).variable_len(CHAR_VALUE_LEN as u16),
                Metadata::new(Properties::new().write().write_without_response()),
            )?
            .build();

        let tx = sb
            .add_characteristic(
                Uuid::new_16(TX_CHAR_UUID16),
                Attribute::new([0u8; CHAR_VALUE_LEN]).variable_len(CHAR_VALUE_LEN as u16),
                Metadata::new(Properties::new().notify()),
            )?
            .build();

        let _service = sb.build();

        info!(
            "Bridge service registered - rx: {}, tx: {}, cccd: {}",
            rx.value_handle, tx.value_handle, tx.cccd_handle
        );

        Ok(Self {
            tx_value_handle: tx.value_handle,
            tx_cccd_handle: tx.cccd_handle,
            rx_value_handle: rx.value_handle,
        })
    }

    /// Notification link for one connection
    pub fn link<'a>(&self, conn: &'a Connection) -> NotifyLink<'a> {
        NotifyLink {
            conn,
            handle: self.tx_value_handle,
        }
    }
}

impl gatt_server::Server for BridgeServer {
    type Event = BridgeEvent;

    fn on_write(&self, _conn: &Connection, handle: u16, _op: WriteOp, _offset: usize, data: &[u8]) -> Option<Self::Event> {
        if handle == self.rx_value_handle {
            return Vec::from_slice(data).ok().map(BridgeEvent::AppData);
        }

        if handle == self.tx_cccd_handle {
            let enabled = data.first().is_some_and(|b| b & 0x01 != 0);
            debug!("CCCD: notifications={}", enabled);
            return Some(BridgeEvent::NotificationsEnabled(enabled));
        }

        debug!("Write to unknown handle {}", handle);
        None
    }
}

/// Notifies the TX characteristic value on one connection
pub struct NotifyLink<'a> {
    conn: &'a Connection,
    handle: u16,
}

impl RadioLink for NotifyLink<'_> {
    fn notify(&mut self, chunk: &[u8]) -> Result<(), TransmitError> {
        gatt_server::notify_value(self.conn, self.handle, chunk).map_err(|e| match e {
            NotifyValueError::Disconnected => TransmitError::NotConnected,
            NotifyValueError::Raw(RawError::Resources) => TransmitError::Busy,
            NotifyValueError::Raw(_) => TransmitError::Radio,
        })
    }
}
