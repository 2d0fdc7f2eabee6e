//! Byte framing for the inter-half serial link.
//!
//! ```text
//! 0xA5 <kind> <id> <len> <payload[len]> <crc8>
//! ```
//!
//! The CRC-8/SMBUS covers `kind`, `id`, `len` and the payload. `kind` tells
//! the receiver whether an answer is expected (`Request`), not expected
//! (`Notify`), or whether this frame is the answer (`Response`).

use crate::crc::Crc8Digest;

/// Frame start marker.
pub const FRAME_SYNC: u8 = 0xA5;

/// Largest payload carried by a single frame.
pub const MAX_PAYLOAD: usize = 8;

/// Sync + kind + id + len + crc.
pub const FRAME_OVERHEAD: usize = 5;

/// Largest encoded frame.
pub const MAX_FRAME_SIZE: usize = MAX_PAYLOAD + FRAME_OVERHEAD;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum FrameKind {
    /// Caller waits for a `Response` with the same id.
    Request = 0x01,
    /// One-way message; no answer is sent.
    Notify = 0x02,
    /// Answer to a `Request`.
    Response = 0x03,
}

impl FrameKind {
    fn from_raw(raw: u8) -> Option<Self> {
        match raw {
            0x01 => Some(Self::Request),
            0x02 => Some(Self::Notify),
            0x03 => Some(Self::Response),
            _ => None,
        }
    }
}

/// Framing failure, either while encoding or while parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FrameError {
    /// Output buffer cannot hold the frame.
    BufferTooSmall,
    /// Payload longer than [`MAX_PAYLOAD`].
    PayloadTooLarge,
    /// Unknown frame kind byte.
    InvalidKind,
    /// Checksum mismatch.
    Crc,
}

/// A decoded frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Frame {
    pub kind: FrameKind,
    pub id: u8,
    len: u8,
    data: [u8; MAX_PAYLOAD],
}

impl Frame {
    /// Build a frame; fails if the payload does not fit.
    pub fn new(kind: FrameKind, id: u8, payload: &[u8]) -> Result<Self, FrameError> {
        if payload.len() > MAX_PAYLOAD {
            return Err(FrameError::PayloadTooLarge);
        }
        let mut data = [0u8; MAX_PAYLOAD];
        data[..payload.len()].copy_from_slice(payload);
        Ok(Self {
            kind,
            id,
            len: payload.len() as u8,
            data,
        })
    }

    #[inline]
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.data[..self.len as usize]
    }

    /// Encode into `buf`, returning the number of bytes written.
    pub fn encode(&self, buf: &mut [u8]) -> Result<usize, FrameError> {
        encode_frame(self.kind, self.id, self.payload(), buf)
    }
}

/// Encode a frame into `buf`, returning the number of bytes written.
pub fn encode_frame(
    kind: FrameKind,
    id: u8,
    payload: &[u8],
    buf: &mut [u8],
) -> Result<usize, FrameError> {
    if payload.len() > MAX_PAYLOAD {
        return Err(FrameError::PayloadTooLarge);
    }
    let total = payload.len() + FRAME_OVERHEAD;
    if buf.len() < total {
        return Err(FrameError::BufferTooSmall);
    }

    let header = [kind as u8, id, payload.len() as u8];
    let mut crc = Crc8Digest::new();
    crc.update_slice(&header);
    crc.update_slice(payload);

    buf[0] = FRAME_SYNC;
    buf[1..4].copy_from_slice(&header);
    buf[4..4 + payload.len()].copy_from_slice(payload);
    buf[total - 1] = crc.finalize();
    Ok(total)
}

#[derive(Clone, Copy)]
enum ParserState {
    WaitingForSync,
    Kind,
    Id,
    Len,
    Payload,
    Crc,
}

/// Streaming frame parser fed one byte at a time.
///
/// After an error the parser is already back to hunting for the next sync
/// byte, so callers can keep feeding bytes.
pub struct FrameParser {
    state: ParserState,
    kind: FrameKind,
    id: u8,
    len: usize,
    pos: usize,
    data: [u8; MAX_PAYLOAD],
    crc: Crc8Digest,
}

impl FrameParser {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: ParserState::WaitingForSync,
            kind: FrameKind::Request,
            id: 0,
            len: 0,
            pos: 0,
            data: [0u8; MAX_PAYLOAD],
            crc: Crc8Digest::new(),
        }
    }

    /// Drop any partially received frame.
    pub fn reset(&mut self) {
        self.state = ParserState::WaitingForSync;
        self.pos = 0;
        self.len = 0;
        self.crc = Crc8Digest::new();
    }

    /// Feed a byte. Returns `Some(frame)` once a complete, valid frame is in.
    pub fn push_byte(&mut self, byte: u8) -> Result<Option<Frame>, FrameError> {
        match self.state {
            ParserState::WaitingForSync => {
                if byte == FRAME_SYNC {
                    self.reset();
                    self.state = ParserState::Kind;
                }
                Ok(None)
            }
            ParserState::Kind => match FrameKind::from_raw(byte) {
                Some(kind) => {
                    self.kind = kind;
                    self.crc.update(byte);
                    self.state = ParserState::Id;
                    Ok(None)
                }
                None => {
                    self.reset();
                    Err(FrameError::InvalidKind)
                }
            },
            ParserState::Id => {
                self.id = byte;
                self.crc.update(byte);
                self.state = ParserState::Len;
                Ok(None)
            }
            ParserState::Len => {
                let len = byte as usize;
                if len > MAX_PAYLOAD {
                    self.reset();
                    return Err(FrameError::PayloadTooLarge);
                }
                self.len = len;
                self.crc.update(byte);
                self.state = if len == 0 {
                    ParserState::Crc
                } else {
                    ParserState::Payload
                };
                Ok(None)
            }
            ParserState::Payload => {
                self.data[self.pos] = byte;
                self.pos += 1;
                self.crc.update(byte);
                if self.pos == self.len {
                    self.state = ParserState::Crc;
                }
                Ok(None)
            }
            ParserState::Crc => {
                let digest = core::mem::take(&mut self.crc);
                let expected = digest.finalize();
                let frame = Frame {
                    kind: self.kind,
                    id: self.id,
                    len: self.len as u8,
                    data: self.data,
                };
                self.reset();
                if byte == expected {
                    Ok(Some(frame))
                } else {
                    Err(FrameError::Crc)
                }
            }
        }
    }
}

impl Default for FrameParser {
    fn default() -> Self {
        Self::new()
    }
}
