//! Trackball motion fusion for split keyboards with one or two balls.
//!
//! This crate holds everything a reex keyboard half does with its pointing
//! device apart from talking to hardware. It can be used both in embedded
//! `no_std` firmware and on the host for testing.
//!
//! # Overview
//!
//! - [`motion`]: lock-free per-half accumulators ([`MotionAccumulator`])
//! - [`snap`]: scroll snapping ([`ScrollSnapFilter`], [`ScrollSnapMode`])
//! - [`negotiation`]: the one-time ball handshake between halves
//! - [`record`]: the bit-packed settings word ([`ConfigRecord`])
//! - [`keycode`]: custom keycodes ([`ReexKeycode`])
//! - [`status`]: fixed-width OLED lines
//! - [`via`]: VIA custom lighting with per-layer saves
//! - [`Reex`]: the per-half context tying it all together
//!
//! Hardware and the host firmware plug in through traits: [`MotionSensor`],
//! [`SplitTransport`], [`ConfigStore`], [`LayoutOptions`], [`Lighting`] and
//! the policy hooks in [`ReexHooks`].
//!
//! # Example
//!
//! ```rust
//! use reex::{Half, MouseReport, Reex, ReexConfig, Role, Side};
//!
//! let mut reex = Reex::new(ReexConfig::new(), Role::Primary, Side::Left);
//! // No local sensor, so motion pulled from the other half moves the pointer.
//! reex.accumulate(Half::That, 10, -4);
//!
//! let mut report = MouseReport::default();
//! assert!(reex.get_report(&mut report, 100));
//! assert_eq!((report.x, report.y), (-10, -4));
//! ```
//!
//! # Features
//!
//! - **`std`**: Enable standard library support (for host testing)
//! - **`defmt`**: Enable defmt formatting and logging (for embedded)
//! - **`log`**: Log through the `log` crate instead

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(feature = "std")]
extern crate std;

// Must come first so the logging macros are visible in every module.
#[macro_use]
mod macros;

pub mod arith;
pub mod auto_mouse;
pub mod config;
pub mod hooks;
pub mod keycode;
pub mod motion;
pub mod negotiation;
pub mod pressing;
pub mod record;
pub mod reex;
pub mod report;
pub mod sensor;
pub mod snap;
pub mod status;
pub mod storage;
pub mod transport;
pub mod via;

pub use auto_mouse::AutoMouse;
pub use config::{ReexConfig, ScrollSnapStrategy};
pub use hooks::{DefaultHooks, LayoutAdjust, ReexHooks};
pub use keycode::{KeyEvent, KeyPos, ReexKeycode, REEX_SAFE_RANGE};
pub use motion::{Half, Motion, MotionAccumulator};
pub use negotiation::NegotiationState;
pub use record::ConfigRecord;
pub use reex::{Reex, Role, Side};
pub use report::MouseReport;
pub use sensor::{MotionSensor, SensorError};
pub use snap::{ScrollSnapFilter, ScrollSnapMode};
pub use status::{StatusLine, STATUS_LINE_WIDTH};
pub use storage::{ConfigStore, LayoutOptions, SettingKey, SettingsCache, StorageError};
pub use transport::{SplitTransport, TransportError};
pub use via::{Lighting, ViaLighting};
