#![no_std]
#![no_main]

use core::cell::RefCell;
use core::sync::atomic::{AtomicU16, Ordering};

use ble_bridge::ble::events::{announce_start, forward_app_data, on_gap_state};
use ble_bridge::ble::server::{BridgeEvent, BridgeServer};
use ble_bridge::commands::{process_command, CommandError, Device};
use ble_bridge::config::{ENVELOPE_QUEUE_DEPTH, TICK_PERIOD_MS, UART_BAUDRATE};
use ble_bridge::core::memory::{Envelope, RxBuffer, TxPacket, TX_POOL_SIZE};
use ble_bridge::core::ring_buffer::RingBuffer;
use ble_bridge::core::transport::PacketWriter;
use ble_bridge::serial::SerialIngest;
use ble_bridge::state::{BridgeState, GapState, FULL_NAME_LEN};
use ble_bridge::transmit::{NoLink, RadioLink, TxScheduler};
use defmt::*;
use defmt_rtt as _;
use embassy_executor::Spawner;
use embassy_futures::select::{select, select3, Either3};
use embassy_nrf::interrupt::{self, InterruptExt};
use embassy_nrf::uarte::{self, UarteRxWithIdle, UarteTx};
use embassy_nrf::{bind_interrupts, peripherals};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::channel::Channel;
use embassy_sync::signal::Signal;
use embassy_time::{Duration, Ticker, Timer};
use nrf_softdevice::ble::advertisement_builder::{
    AdvertisementDataType, Flag, LegacyAdvertisementBuilder, LegacyAdvertisementPayload, ServiceList,
    ServiceUuid16,
};
use nrf_softdevice::ble::{gatt_server, peripheral, TxPower};
use nrf_softdevice::{raw, Config as SdConfig, Softdevice};
use panic_probe as _;

bind_interrupts!(struct Irqs {
    UARTE0_UART0 => uarte::InterruptHandler<peripherals::UARTE0>;
});

/// Ring and state shared by the dispatcher, the BLE task and the tick loop
struct Bridge {
    state: BridgeState,
    ring: RingBuffer,
}

static BRIDGE: Mutex<CriticalSectionRawMutex, RefCell<Bridge>> = Mutex::new(RefCell::new(Bridge {
    state: BridgeState::new(),
    ring: RingBuffer::new(),
}));

/// Decoded host frames awaiting dispatch
static RX_CHANNEL: Channel<CriticalSectionRawMutex, Envelope, ENVELOPE_QUEUE_DEPTH> = Channel::new();

/// Encoded frames awaiting the UART
static TX_CHANNEL: Channel<CriticalSectionRawMutex, TxPacket, TX_POOL_SIZE> = Channel::new();

/// Raised when advertising data must be rebuilt
static NAME_CHANGED: Signal<CriticalSectionRawMutex, ()> = Signal::new();

/// Handle of the current connection, `BLE_CONN_HANDLE_INVALID` when idle
static CONN_HANDLE: AtomicU16 = AtomicU16::new(raw::BLE_CONN_HANDLE_INVALID as u16);

const ADV_HANDLE: u16 = 0;

type HostWriter = PacketWriter<'static, CriticalSectionRawMutex, TX_POOL_SIZE>;

fn host_writer() -> HostWriter {
    PacketWriter::new(TX_CHANNEL.sender())
}

/// SoftDevice-backed device control
struct SoftdeviceControl;

impl Device for SoftdeviceControl {
    fn system_reset(&mut self) {
        unsafe {
            raw::sd_nvic_SystemReset();
        }
    }

    fn set_tx_power(&mut self, dbm: i8) -> Result<(), CommandError> {
        let conn = CONN_HANDLE.load(Ordering::Relaxed);
        let (role, handle) = if conn != raw::BLE_CONN_HANDLE_INVALID as u16 {
            (raw::BLE_GAP_TX_POWER_ROLE_CONN, conn)
        } else {
            (raw::BLE_GAP_TX_POWER_ROLE_ADV, ADV_HANDLE)
        };

        let ret = unsafe { raw::sd_ble_gap_tx_power_set(role as u8, handle, dbm) };
        if ret != raw::NRF_SUCCESS {
            warn!("sd_ble_gap_tx_power_set failed: {}", ret);
            return Err(CommandError::SoftDeviceError);
        }
        Ok(())
    }

    fn name_changed(&mut self, _full_name: &[u8; FULL_NAME_LEN]) {
        NAME_CHANGED.signal(());
    }
}

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("Starting nRF52820 BLE bridge");

    // Configure nRF peripherals
    let mut nrf_config = embassy_nrf::config::Config::default();
    // Configure interrupt priorities to avoid SoftDevice reserved levels (0, 1, 4)
    nrf_config.gpiote_interrupt_priority = interrupt::Priority::P2;
    nrf_config.time_interrupt_priority = interrupt::Priority::P2;
    let p = embassy_nrf::init(nrf_config);

    interrupt::UARTE0_UART0.set_priority(interrupt::Priority::P3);

    let mut uart_config = uarte::Config::default();
    uart_config.parity = uarte::Parity::EXCLUDED;
    uart_config.baudrate = match UART_BAUDRATE {
        9_600 => uarte::Baudrate::BAUD9600,
        57_600 => uarte::Baudrate::BAUD57600,
        _ => uarte::Baudrate::BAUD115200,
    };

    let uart = uarte::Uarte::new(p.UARTE0, p.P0_06, p.P0_08, Irqs, uart_config);
    let (tx, rx) = uart.split_with_idle(p.TIMER1, p.PPI_CH0, p.PPI_CH1);

    info!("Embassy initialized, configuring SoftDevice...");

    let sd_config = SdConfig {
        clock: Some(raw::nrf_clock_lf_cfg_t {
            source: raw::NRF_CLOCK_LF_SRC_RC as u8,
            rc_ctiv: 16,
            rc_temp_ctiv: 2,
            accuracy: raw::NRF_CLOCK_LF_ACCURACY_500_PPM as u8,
        }),
        conn_gap: Some(raw::ble_gap_conn_cfg_t {
            conn_count: 1,
            event_length: 24,
        }),
        conn_gatt: Some(raw::ble_gatt_conn_cfg_t { att_mtu: 23 }),
        gatts_attr_tab_size: Some(raw::ble_gatts_cfg_attr_tab_size_t {
            attr_tab_size: raw::BLE_GATTS_ATTR_TAB_SIZE_DEFAULT,
        }),
        gap_role_count: Some(raw::ble_gap_cfg_role_count_t {
            adv_set_count: 1,
            periph_role_count: 1,
            central_role_count: 0,
            central_sec_count: 0,
            _bitfield_1: Default::default(),
        }),
        ..Default::default()
    };

    let sd = Softdevice::enable(&sd_config);
    let server = unwrap!(BridgeServer::new(sd));
    info!("SoftDevice enabled, bridge service registered");

    unwrap!(spawner.spawn(softdevice_task(sd)));
    unwrap!(spawner.spawn(uart_tx_task(tx)));
    unwrap!(spawner.spawn(uart_rx_task(rx)));
    unwrap!(spawner.spawn(dispatch_task()));

    let address = nrf_softdevice::ble::get_address(sd).bytes();
    BRIDGE.lock(|bridge| {
        let mut bridge = bridge.borrow_mut();
        bridge.state.set_address(&address);

        let mut writer = host_writer();
        if let Err(e) = announce_start(&mut writer) {
            warn!("Start announcement not sent: {:?}", e);
        }
        report_gap_state(&mut bridge.state, GapState::Started);
    });

    unwrap!(spawner.spawn(ble_task(sd, server)));
}

fn report_gap_state(state: &mut BridgeState, new_state: GapState) {
    let mut writer = host_writer();
    if let Err(e) = on_gap_state(state, new_state, &mut writer) {
        warn!("GAP state {:?} not reported: {:?}", new_state, e);
    }
}

fn set_gap_state(new_state: GapState) {
    BRIDGE.lock(|bridge| report_gap_state(&mut bridge.borrow_mut().state, new_state));
}

#[embassy_executor::task]
async fn softdevice_task(sd: &'static Softdevice) -> ! {
    sd.run().await
}

/// Host UART receive: decode frames and queue them for dispatch
#[embassy_executor::task]
async fn uart_rx_task(mut rx: UarteRxWithIdle<'static, peripherals::UARTE0, peripherals::TIMER1>) {
    let mut ingest = SerialIngest::new();
    let mut buffer = RxBuffer::new();
    let mut queue = RX_CHANNEL.sender();

    loop {
        let n = match rx.read_until_idle(buffer.as_mut_slice()).await {
            Ok(n) => n,
            Err(e) => {
                warn!("UART read failed: {:?}", e);
                continue;
            }
        };
        if buffer.set_len(n).is_err() {
            continue;
        }

        let mut bytes = buffer.as_slice();
        if let Err(e) = ingest.poll(&mut bytes, &mut queue) {
            warn!("Ingest failed: {:?}", e);
        }
        trace!("Ingest stats: {:?}", ingest.stats());
        buffer.clear();
    }
}

/// Host UART transmit: drain pooled packets
#[embassy_executor::task]
async fn uart_tx_task(mut tx: UarteTx<'static, peripherals::UARTE0>) {
    loop {
        let packet = TX_CHANNEL.receive().await;
        if let Err(e) = tx.write(packet.as_slice()).await {
            warn!("UART write failed: {:?}", e);
        }
    }
}

/// Run host commands against the shared bridge state
#[embassy_executor::task]
async fn dispatch_task() {
    let mut device = SoftdeviceControl;

    loop {
        let envelope = RX_CHANNEL.receive().await;
        let result = BRIDGE.lock(|bridge| {
            let mut bridge = bridge.borrow_mut();
            let Bridge { state, ring } = &mut *bridge;
            let mut writer = host_writer();
            process_command(&envelope, state, ring, &mut device, &mut writer)
        });

        if let Err(e) = result {
            debug!("Command 0x{:02x} failed: {:?}", envelope.frame_type(), e);
        }
    }
}

/// Drain the ring every tick until the returned future is dropped
async fn run_ticks<L: RadioLink>(scheduler: &TxScheduler, link: &mut L) -> ! {
    let mut ticker = Ticker::every(Duration::from_millis(TICK_PERIOD_MS));
    loop {
        ticker.next().await;
        let report = BRIDGE.lock(|bridge| {
            let mut bridge = bridge.borrow_mut();
            let Bridge { state, ring } = &mut *bridge;
            let mut writer = host_writer();
            scheduler.on_tick(state, ring, link, &mut writer)
        });

        if report.bytes_sent > 0 {
            trace!("Tick: {} bytes in {} chunks", report.bytes_sent, report.chunks);
        }
    }
}

fn tx_power_level(dbm: i8) -> TxPower {
    match dbm {
        i8::MIN..=-20 => TxPower::Minus20dBm,
        -19..=-8 => TxPower::Minus8dBm,
        -7..=0 => TxPower::ZerodBm,
        _ => TxPower::Plus4dBm,
    }
}

#[embassy_executor::task]
async fn ble_task(sd: &'static Softdevice, server: BridgeServer) {
    static ADV_DATA: LegacyAdvertisementPayload = LegacyAdvertisementBuilder::new()
        .flags(&[Flag::GeneralDiscovery, Flag::LE_Only])
        .services_16(ServiceList::Complete, &[ServiceUuid16::from_u16(ble_bridge::ble::SERVICE_UUID16)])
        .build();

    let scheduler = TxScheduler::default();

    loop {
        let (full_name, tx_power) = BRIDGE.lock(|bridge| {
            let bridge = bridge.borrow();
            (bridge.state.full_name(), bridge.state.tx_power_dbm())
        });

        let scan_data = LegacyAdvertisementBuilder::new()
            .raw(AdvertisementDataType::FULL_NAME, &full_name)
            .build();

        let config = peripheral::Config {
            tx_power: tx_power_level(tx_power),
            ..Default::default()
        };
        let adv = peripheral::ConnectableAdvertisement::ScannableUndirected {
            adv_data: &ADV_DATA,
            scan_data: &scan_data,
        };

        set_gap_state(GapState::Advertising);
        NAME_CHANGED.reset();

        let conn = match select3(
            peripheral::advertise_connectable(sd, adv, &config),
            run_ticks(&scheduler, &mut NoLink),
            NAME_CHANGED.wait(),
        )
        .await
        {
            Either3::First(Ok(conn)) => conn,
            Either3::First(Err(e)) => {
                error!("BLE advertising failed: {:?}", defmt::Debug2Format(&e));
                Timer::after(Duration::from_secs(1)).await;
                continue;
            }
            Either3::Second(never) => match never {},
            Either3::Third(()) => {
                info!("Name changed, restarting advertising");
                continue;
            }
        };

        if let Some(handle) = conn.handle() {
            CONN_HANDLE.store(handle, Ordering::Relaxed);
        }
        set_gap_state(GapState::Connected);

        let mut link = server.link(&conn);
        let disconnected = select(
            gatt_server::run(&conn, &server, |event| match event {
                BridgeEvent::AppData(write) => {
                    let mut writer = host_writer();
                    if let Err(e) = forward_app_data(&write, &mut writer) {
                        warn!("App data not forwarded: {:?}", e);
                    }
                }
                BridgeEvent::NotificationsEnabled(enabled) => {
                    info!("Notifications enabled: {}", enabled);
                }
            }),
            run_ticks(&scheduler, &mut link),
        )
        .await;

        info!("Connection ended: {:?}", defmt::Debug2Format(&disconnected));
        CONN_HANDLE.store(raw::BLE_CONN_HANDLE_INVALID as u16, Ordering::Relaxed);
        set_gap_state(GapState::Waiting);
    }
}
