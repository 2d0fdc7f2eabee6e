//! USB HID mouse output.

use defmt::Format;
use embassy_rp::peripherals::USB;
use embassy_rp::usb::Driver;
use embassy_usb::class::hid::{HidWriter, State};
use embassy_usb::Builder;
use reex::MouseReport;
use usbd_hid::descriptor::{MouseReport as HidMouseReport, SerializedDescriptor};

pub type UsbDriver<'d> = Driver<'d, USB>;

/// Largest report this interface sends.
pub const MAX_REPORT_SIZE: usize = 8;

/// Failure to hand a report to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Format)]
pub enum OutputError {
    /// Endpoint write failed (e.g. host suspended or unplugged).
    Io,
}

/// Wire layout of the boot-compatible mouse report: buttons, x, y, wheel, pan.
#[must_use]
pub fn to_hid_report(report: &MouseReport) -> HidMouseReport {
    HidMouseReport {
        buttons: report.buttons,
        x: report.x,
        y: report.y,
        wheel: report.v,
        pan: report.h,
    }
}

#[must_use]
pub fn report_bytes(report: &HidMouseReport) -> [u8; 5] {
    [
        report.buttons,
        report.x as u8,
        report.y as u8,
        report.wheel as u8,
        report.pan as u8,
    ]
}

/// Wraps an embassy-usb HID writer to send mouse reports.
pub struct UsbMouseOutput<'d> {
    writer: HidWriter<'d, UsbDriver<'d>, MAX_REPORT_SIZE>,
    ready: bool,
}

impl<'d> UsbMouseOutput<'d> {
    /// Create a new mouse output from a configured HID writer.
    pub fn new(writer: HidWriter<'d, UsbDriver<'d>, MAX_REPORT_SIZE>) -> Self {
        Self {
            writer,
            ready: false,
        }
    }

    /// Wait until the host has configured the device.
    pub async fn wait_ready(&mut self) {
        self.writer.ready().await;
        self.ready = true;
    }

    #[inline]
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// Send one report to the host.
    pub async fn send(&mut self, report: &MouseReport) -> Result<(), OutputError> {
        let hid = to_hid_report(report);
        self.writer
            .write(&report_bytes(&hid))
            .await
            .map_err(|_| OutputError::Io)
    }
}

/// Add the HID mouse interface to the USB builder.
pub fn configure_usb_mouse<'d>(
    builder: &mut Builder<'d, UsbDriver<'d>>,
    state: &'d mut State<'d>,
) -> HidWriter<'d, UsbDriver<'d>, MAX_REPORT_SIZE> {
    let config = embassy_usb::class::hid::Config {
        report_descriptor: HidMouseReport::desc(),
        request_handler: None,
        poll_ms: 1,
        max_packet_size: MAX_REPORT_SIZE as u16,
        hid_subclass: embassy_usb::class::hid::HidSubclass::Boot,
        hid_boot_protocol: embassy_usb::class::hid::HidBootProtocol::Mouse,
    };

    HidWriter::new(builder, state, config)
}
