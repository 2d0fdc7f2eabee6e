#![no_std]
#![no_main]

use defmt::{debug, error, info, trace, warn};
use defmt_rtt as _;
use embassy_executor::Spawner;
use embassy_futures::select::{select, Either};
use embassy_rp::bind_interrupts;
use embassy_rp::gpio::{Input, Level, Output, Pull};
use embassy_rp::peripherals::{UART1, USB};
use embassy_rp::spi::{Config as SpiConfig, Phase, Polarity, Spi};
use embassy_rp::uart::{Config as UartConfig, Uart};
use embassy_rp::usb::Driver;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_time::{Duration, Instant, Ticker, Timer};
use embassy_usb::class::hid::State;
use embassy_usb::{Builder, Config as UsbConfig};
use reex_firmware::flash_store::ReexFlash;
use reex_firmware::split_uart::{FrameChannel, SPLIT_BAUDRATE};
use reex_firmware::{
    configure_usb_mouse, FlashStore, MotionSensor, MouseReport, Pmw3360, Reex, Role, Side,
    SplitReceiver, UartSplitLink, UsbMouseOutput, REEX_CONFIG,
};
use reex_proto::{FrameKind, MAX_PAYLOAD};
use static_cell::StaticCell;

#[cfg(feature = "dev-panic")]
use panic_probe as _;
#[cfg(feature = "prod-panic")]
use panic_reset as _;

bind_interrupts!(struct Irqs {
    UART1_IRQ => embassy_rp::uart::InterruptHandler<UART1>;
    USBCTRL_IRQ => embassy_rp::usb::InterruptHandler<USB>;
});

/// Sensor and link polling period.
const POLL_INTERVAL: Duration = Duration::from_millis(1);

/// PMW3360 SPI clock (datasheet maximum is 2 MHz).
const SENSOR_SPI_HZ: u32 = 2_000_000;

type ReportChannel = Channel<CriticalSectionRawMutex, MouseReport, 4>;

/// Reports waiting for the host. Full while the host is not reading.
static REPORTS: StaticCell<ReportChannel> = StaticCell::new();

/// Frames from the other half, filled by the split RX task.
static FRAMES: StaticCell<FrameChannel> = StaticCell::new();

/// USB device configuration buffer.
static CONFIG_DESCRIPTOR: StaticCell<[u8; 256]> = StaticCell::new();
static BOS_DESCRIPTOR: StaticCell<[u8; 256]> = StaticCell::new();
static MSOS_DESCRIPTOR: StaticCell<[u8; 256]> = StaticCell::new();
static CONTROL_BUF: StaticCell<[u8; 64]> = StaticCell::new();

/// HID state.
static HID_STATE: StaticCell<State> = StaticCell::new();

#[inline]
fn now_ms() -> u32 {
    Instant::now().as_millis() as u32
}

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("reex starting...");

    let p = embassy_rp::init(embassy_rp::config::Config::default());

    let reports = REPORTS.init(Channel::new());

    // --- Role and side ---
    let vbus = Input::new(p.PIN_24, Pull::None);
    let side_strap = Input::new(p.PIN_28, Pull::Up);
    let role = if vbus.is_high() {
        Role::Primary
    } else {
        Role::Secondary
    };
    let side = if side_strap.is_high() {
        Side::Left
    } else {
        Side::Right
    };

    // --- Split link ---
    let mut uart_config = UartConfig::default();
    uart_config.baudrate = SPLIT_BAUDRATE;

    let uart = Uart::new(
        p.UART1,
        p.PIN_8, // TX
        p.PIN_9, // RX
        Irqs,
        p.DMA_CH0,
        p.DMA_CH1,
        uart_config,
    );
    let frames = FRAMES.init(Channel::new());
    let (tx, rx) = uart.split();
    let mut link = UartSplitLink::new(tx, frames);
    spawner.spawn(split_rx_task(SplitReceiver::new(rx, frames)).unwrap());

    // --- Sensor ---
    let mut spi_config = SpiConfig::default();
    spi_config.frequency = SENSOR_SPI_HZ;
    spi_config.phase = Phase::CaptureOnSecondTransition;
    spi_config.polarity = Polarity::IdleHigh;

    let spi = Spi::new(
        p.SPI0,
        p.PIN_18, // SCK
        p.PIN_19, // MOSI
        p.PIN_16, // MISO
        p.DMA_CH2,
        p.DMA_CH3,
        spi_config,
    );
    let cs = Output::new(p.PIN_17, Level::High);
    let mut sensor = Pmw3360::new(spi, cs, None);
    let have_ball = match sensor.init().await {
        Ok(()) => true,
        Err(e) => {
            warn!("no trackball on this half: {:?}", e);
            false
        }
    };

    // --- Settings ---
    let flash = ReexFlash::new_blocking(p.FLASH);
    let mut store = FlashStore::new(flash);
    store.load().await;

    let mut reex = Reex::new(REEX_CONFIG, role, side);
    reex.init(have_ball, &mut store);
    if let Err(e) = store.flush().await {
        error!("settings not saved: {:?}", e);
    }

    // --- USB Setup ---
    let usb_driver = Driver::new(p.USB, Irqs);

    let mut usb_config = UsbConfig::new(0x1209, 0x0001); // pid.codes test VID/PID
    usb_config.manufacturer = Some("reex");
    usb_config.product = Some("reex trackball");
    usb_config.serial_number = Some("001");
    usb_config.max_power = 100;
    usb_config.max_packet_size_0 = 64;

    let config_descriptor = CONFIG_DESCRIPTOR.init([0; 256]);
    let bos_descriptor = BOS_DESCRIPTOR.init([0; 256]);
    let msos_descriptor = MSOS_DESCRIPTOR.init([0; 256]);
    let control_buf = CONTROL_BUF.init([0; 64]);

    let mut builder = Builder::new(
        usb_driver,
        usb_config,
        config_descriptor,
        bos_descriptor,
        msos_descriptor,
        control_buf,
    );

    let hid_state = HID_STATE.init(State::new());
    let hid_writer = configure_usb_mouse(&mut builder, hid_state);
    let usb_device = builder.build();
    let usb_output = UsbMouseOutput::new(hid_writer);

    spawner.spawn(usb_task(usb_device).unwrap());
    spawner.spawn(output_task(usb_output, reports).unwrap());

    info!("reex initialized");

    match role {
        Role::Primary => primary_loop(&mut reex, &mut sensor, &mut link, &mut store, reports).await,
        Role::Secondary => secondary_loop(&mut reex, &mut sensor, &mut link).await,
    }
}

/// Poll both balls and hand reports to the output task.
///
/// While the queue is full, new motion is folded into one pending report
/// instead of being dropped.
async fn primary_loop<S: MotionSensor>(
    reex: &mut Reex,
    sensor: &mut S,
    link: &mut UartSplitLink<'_>,
    store: &mut FlashStore<'_>,
    reports: &'static ReportChannel,
) -> ! {
    let mut ticker = Ticker::every(POLL_INTERVAL);
    let mut pending = MouseReport::default();
    loop {
        if let Err(e) = reex.poll_sensor(sensor).await {
            debug!("sensor read failed: {:?}", e);
        }
        let now = now_ms();
        reex.housekeeping(link, store, now).await;
        if store.is_dirty() {
            if let Err(e) = store.flush().await {
                error!("settings not saved: {:?}", e);
            }
        }

        let mut report = MouseReport::default();
        if reex.get_report(&mut report, now) {
            pending.coalesce(&mut report);
            if report.has_motion() {
                trace!("pending report saturated, {:?} clipped", report);
            }
        }
        if pending.has_motion() && reports.try_send(pending).is_ok() {
            pending = MouseReport::default();
        }
        ticker.next().await;
    }
}

/// Answer the primary and keep the local accumulator filled in between.
async fn secondary_loop<S: MotionSensor>(
    reex: &mut Reex,
    sensor: &mut S,
    link: &mut UartSplitLink<'_>,
) -> ! {
    let mut response = [0u8; MAX_PAYLOAD];
    loop {
        match select(link.receive_request(), Timer::after(POLL_INTERVAL)).await {
            Either::First((id, frame)) => {
                match reex.handle_request(id, frame.payload(), &mut response) {
                    Ok(len) if frame.kind == FrameKind::Request => {
                        if let Err(e) = link.respond(id, &response[..len]).await {
                            debug!("response to {:?} failed: {:?}", id, e);
                        }
                    }
                    Ok(_) => {}
                    Err(e) => debug!("request {:?} rejected: {:?}", id, e),
                }
            }
            Either::Second(()) => {
                if let Err(e) = reex.poll_sensor(sensor).await {
                    debug!("sensor read failed: {:?}", e);
                }
            }
        }
    }
}

/// Split RX task - turns UART bytes into frames for the link.
#[embassy_executor::task]
async fn split_rx_task(mut receiver: SplitReceiver<'static>) {
    receiver.run().await
}

/// USB device task - runs the USB stack.
#[embassy_executor::task]
async fn usb_task(mut device: embassy_usb::UsbDevice<'static, Driver<'static, USB>>) {
    device.run().await;
}

/// Output task - forwards queued mouse reports to USB HID.
#[embassy_executor::task]
async fn output_task(mut output: UsbMouseOutput<'static>, reports: &'static ReportChannel) {
    output.wait_ready().await;
    info!("USB HID ready, forwarding mouse reports...");

    loop {
        let report = reports.receive().await;
        if let Err(e) = output.send(&report).await {
            error!("Output error: {:?}", e);
        }
    }
}
