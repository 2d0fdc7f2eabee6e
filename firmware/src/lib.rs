//! RP2040 firmware for one half of a reex split trackball keyboard.
//!
//! # Overview
//!
//! Each half runs the same image. At power-up it queries its PMW3360 to learn
//! whether it carries a ball, and reads VBUS to learn its role:
//!
//! - **Primary** (USB connected): polls its sensor, pulls motion from the
//!   other half over UART, and sends HID mouse reports to the host.
//! - **Secondary**: polls its sensor and answers the primary's requests.
//!
//! # Hardware Configuration
//!
//! | Function   | GPIO | Description |
//! |------------|------|-------------|
//! | UART1 TX   | 8    | Link to the other half |
//! | UART1 RX   | 9    | Link from the other half |
//! | SPI0 SCK   | 18   | PMW3360 clock |
//! | SPI0 MOSI  | 19   | PMW3360 data in |
//! | SPI0 MISO  | 16   | PMW3360 data out |
//! | SPI0 CS    | 17   | PMW3360 chip select |
//! | Side strap | 28   | High on the left half |
//! | VBUS sense | 24   | High when powered from USB |
//!
//! # Modules
//!
//! - [`split_uart`]: framed request/response link ([`UartSplitLink`], [`SplitReceiver`])
//! - [`usb_output`]: USB HID mouse ([`UsbMouseOutput`])
//! - [`pmw3360`]: optical sensor ([`Pmw3360`])
//! - [`flash_store`]: persisted settings ([`FlashStore`])
//!
//! # Features
//!
//! - **`dev-panic`** (default): Use `panic-probe` for development (prints panic info via RTT)
//! - **`prod-panic`**: Use `panic-reset` for production (silent watchdog reset)
//! - **`auto-mouse`**: Auto mouse layer settings and keys
//! - **`scroll-snap-tension`**: Tension scroll snap instead of the explicit axis lock

#![no_std]

#[cfg(all(feature = "dev-panic", feature = "prod-panic"))]
compile_error!("Cannot enable both `dev-panic` and `prod-panic` features - they both define a panic handler");

pub use reex::{
    Half, Motion, MotionSensor, MouseReport, Reex, ReexConfig, Role, ScrollSnapStrategy, Side,
    SplitTransport, TransportError,
};

pub mod flash_store;
pub mod pmw3360;
pub mod split_uart;
pub mod usb_output;

pub use flash_store::FlashStore;
pub use pmw3360::Pmw3360;
pub use split_uart::{SplitReceiver, UartSplitLink};
pub use usb_output::{configure_usb_mouse, OutputError, UsbMouseOutput};

/// Settings baked into this build.
pub const REEX_CONFIG: ReexConfig = ReexConfig::new()
    .with_auto_mouse(cfg!(feature = "auto-mouse"))
    .with_scroll_snap(if cfg!(feature = "scroll-snap-tension") {
        ScrollSnapStrategy::TENSION
    } else {
        ScrollSnapStrategy::Lock
    });
