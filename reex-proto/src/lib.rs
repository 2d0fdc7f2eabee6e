//! Wire format spoken between the two halves of a reex keyboard.
//!
//! - [`message`]: transaction IDs and the payloads they carry
//!   ([`BallInfo`], [`MotionDelta`], [`CpiUpdate`])
//! - [`frame`]: CRC-8 protected frames and a streaming [`FrameParser`]
//! - [`crc`]: CRC-8/SMBUS helpers
//!
//! # Example
//!
//! ```
//! use reex_proto::{encode_frame, FrameKind, FrameParser, MotionDelta, TransactionId};
//!
//! let mut buf = [0u8; reex_proto::MAX_FRAME_SIZE];
//! let payload = MotionDelta::new(12, -3).to_bytes();
//! let len = encode_frame(FrameKind::Response, TransactionId::GetMotion.raw(), &payload, &mut buf)
//!     .unwrap();
//!
//! let mut parser = FrameParser::new();
//! let mut received = None;
//! for &b in &buf[..len] {
//!     if let Ok(Some(frame)) = parser.push_byte(b) {
//!         received = Some(frame);
//!     }
//! }
//! let frame = received.unwrap();
//! assert_eq!(MotionDelta::from_bytes(frame.payload()), Ok(MotionDelta::new(12, -3)));
//! ```
//!
//! # Features
//!
//! - **`std`**: Enable standard library support (for host testing)
//! - **`defmt`**: Enable defmt formatting (for embedded logging)

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(feature = "std")]
extern crate std;

pub mod crc;
pub mod frame;
pub mod message;

pub use crc::{calculate_crc8, Crc8Digest};
pub use frame::{
    encode_frame, Frame, FrameError, FrameKind, FrameParser, FRAME_OVERHEAD, FRAME_SYNC,
    MAX_FRAME_SIZE, MAX_PAYLOAD,
};
pub use message::{BallInfo, CpiUpdate, DecodeError, MotionDelta, TransactionId};
